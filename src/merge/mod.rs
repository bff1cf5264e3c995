//! Merge engine - layers JSON payloads onto a typed config.
//!
//! A payload only overrides the fields it mentions: objects are merged
//! key by key, arrays and scalars replace the existing value. The merged
//! result is decoded into a fresh config, and any field the config's
//! schema does not know fails the merge, whether or not the config type
//! denies unknown fields itself.
//!
//! A nested `null` clears fields that can hold it (`Option`s). When that
//! does not decode, the merge is retried with `null`s left out, so a
//! `null` on a plain field keeps the current value.
//!
//! A merge either fully succeeds or leaves the target untouched.

use serde::de::Error as _;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::system::SystemConfig;

/// Why a payload could not be merged.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("payload does not match the config schema: {0}")]
    SchemaMismatch(#[source] serde_json::Error),

    #[error("config could not be snapshotted for merging: {0}")]
    Snapshot(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nulls {
    Replace,
    Skip,
}

/// Merge `payload` onto `target`, failing on any field the config does not know.
pub fn apply_strict<C: SystemConfig>(target: &mut C, payload: &str) -> Result<(), MergeError> {
    let patch: Value = serde_json::from_str(payload).map_err(MergeError::InvalidJson)?;
    if patch.is_null() {
        return Ok(());
    }

    let snapshot = serde_json::to_value(&*target).map_err(MergeError::Snapshot)?;

    let updated = match merge_and_decode::<C>(snapshot.clone(), patch.clone(), Nulls::Replace) {
        Ok(updated) => updated,
        Err(MergeError::SchemaMismatch(_)) if contains_null(&patch) => {
            merge_and_decode(snapshot, patch, Nulls::Skip)?
        }
        Err(e) => return Err(e),
    };

    *target = updated;
    Ok(())
}

/// Like [`apply_strict`], but a payload that does not fit is skipped.
///
/// Returns whether the payload was applied.
pub fn apply_lenient<C: SystemConfig>(target: &mut C, payload: &str) -> bool {
    match apply_strict(target, payload) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Skipping payload that does not fit config");
            false
        }
    }
}

fn merge_and_decode<C: SystemConfig>(
    mut merged: Value,
    patch: Value,
    nulls: Nulls,
) -> Result<C, MergeError> {
    merge_values(&mut merged, patch, nulls);

    let mut unknown = Vec::new();
    let decoded: C = serde_ignored::deserialize(merged, |path| unknown.push(path.to_string()))
        .map_err(MergeError::SchemaMismatch)?;

    if !unknown.is_empty() {
        let message = format!("unknown field(s): {}", unknown.join(", "));
        return Err(MergeError::SchemaMismatch(serde_json::Error::custom(message)));
    }
    Ok(decoded)
}

fn merge_values(base: &mut Value, patch: Value, nulls: Nulls) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value, nulls),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) if nulls == Nulls::Skip => {}
        (base, patch) => *base = patch,
    }
}

fn contains_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().any(contains_null),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields, rename_all = "camelCase")]
    struct Rewards {
        reward_multiplier: u32,
        bonus: Bonus,
        tags: Vec<String>,
        limits: HashMap<String, u32>,
        note: Option<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Bonus {
        coins: u32,
        gems: u32,
    }

    fn base() -> Rewards {
        Rewards {
            reward_multiplier: 1,
            bonus: Bonus { coins: 10, gems: 1 },
            tags: vec!["default".into()],
            limits: HashMap::from([("daily".to_string(), 5)]),
            note: None,
        }
    }

    #[test]
    fn test_only_mentioned_fields_change() {
        let mut config = base();
        apply_strict(&mut config, r#"{"rewardMultiplier": 2, "bonus": {"gems": 3}}"#).unwrap();

        assert_eq!(config.reward_multiplier, 2);
        assert_eq!(config.bonus, Bonus { coins: 10, gems: 3 });
        assert_eq!(config.tags, vec!["default".to_string()]);
    }

    #[test]
    fn test_arrays_are_replaced() {
        let mut config = base();
        apply_strict(&mut config, r#"{"tags": ["a", "b"]}"#).unwrap();
        assert_eq!(config.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_map_fields_accept_new_keys() {
        let mut config = base();
        apply_strict(&mut config, r#"{"limits": {"weekly": 20}}"#).unwrap();
        assert_eq!(config.limits.get("daily"), Some(&5));
        assert_eq!(config.limits.get("weekly"), Some(&20));
    }

    #[test]
    fn test_null_clears_optional_field() {
        let mut config = base();
        config.note = Some("hello".into());
        apply_strict(&mut config, r#"{"note": null}"#).unwrap();
        assert_eq!(config.note, None);
    }

    #[test]
    fn test_null_keeps_plain_field() {
        let mut config = base();
        apply_strict(
            &mut config,
            r#"{"rewardMultiplier": null, "bonus": {"coins": null, "gems": 4}, "tags": ["x"]}"#,
        )
        .unwrap();

        assert_eq!(config.reward_multiplier, 1);
        assert_eq!(config.bonus, Bonus { coins: 10, gems: 4 });
        assert_eq!(config.tags, vec!["x".to_string()]);
    }

    #[test]
    fn test_null_does_not_hide_unknown_field() {
        let mut config = base();
        let err = apply_strict(&mut config, r#"{"rewardMultiplier": null, "energy": 4}"#).unwrap_err();

        assert!(matches!(err, MergeError::SchemaMismatch(_)));
        assert_eq!(config, base());
    }

    #[test]
    fn test_unknown_field_is_rejected_without_mutation() {
        let mut config = base();
        let err = apply_strict(&mut config, r#"{"rewardMultiplier": 9, "energy": 4}"#).unwrap_err();

        assert!(matches!(err, MergeError::SchemaMismatch(_)));
        assert_eq!(config, base());
    }

    #[test]
    fn test_unknown_nested_field_is_rejected() {
        let mut config = base();
        let err = apply_strict(&mut config, r#"{"bonus": {"stars": 1}}"#).unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch(_)));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut config = base();
        let err = apply_strict(&mut config, r#"{"rewardMultiplier": "lots"}"#).unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch(_)));
        assert_eq!(config, base());
    }

    #[test]
    fn test_invalid_json() {
        let mut config = base();
        let err = apply_strict(&mut config, "{not json").unwrap_err();
        assert!(matches!(err, MergeError::InvalidJson(_)));
    }

    #[test]
    fn test_null_payload_is_a_no_op() {
        let mut config = base();
        apply_strict(&mut config, "null").unwrap();
        assert_eq!(config, base());
    }

    #[test]
    fn test_later_payloads_win() {
        let mut config = base();
        apply_strict(&mut config, r#"{"rewardMultiplier": 2, "bonus": {"coins": 50}}"#).unwrap();
        apply_strict(&mut config, r#"{"rewardMultiplier": 3}"#).unwrap();

        assert_eq!(config.reward_multiplier, 3);
        assert_eq!(config.bonus.coins, 50);
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Loose {
        reward_multiplier: u32,
        bonus: LooseBonus,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct LooseBonus {
        coins: u32,
    }

    #[test]
    fn test_unknown_field_is_rejected_for_permissive_config() {
        let mut config = Loose::default();

        let err = apply_strict(&mut config, r#"{"rewardMultiplier": 2, "bogus": true}"#).unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch(_)));
        assert!(err.to_string().contains("bogus"));

        let err = apply_strict(&mut config, r#"{"bonus": {"stars": 1}}"#).unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch(_)));
        assert!(err.to_string().contains("bonus.stars"));

        assert_eq!(config, Loose::default());
    }

    #[test]
    fn test_permissive_config_still_merges_known_fields() {
        let mut config = Loose::default();
        apply_strict(&mut config, r#"{"bonus": {"coins": 3}}"#).unwrap();
        assert_eq!(config.bonus.coins, 3);
        assert!(!apply_lenient(&mut config, r#"{"startingCoins": 1}"#));
    }

    #[test]
    fn test_lenient_skips_mismatch() {
        let mut config = base();
        assert!(!apply_lenient(&mut config, r#"{"someOtherSystem": true}"#));
        assert_eq!(config, base());
        assert!(apply_lenient(&mut config, r#"{"rewardMultiplier": 4}"#));
        assert_eq!(config.reward_multiplier, 4);
    }
}
