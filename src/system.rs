//! Personalizable systems and the flags that drive them.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Every flag fetched when a scope is cached, in request order.
pub const ALL_FLAG_NAMES: [&str; 13] = [
    "Hiro-Achievements",
    "Hiro-Base",
    "Hiro-Economy",
    "Hiro-Energy",
    "Hiro-Inventory",
    "Hiro-Leaderboards",
    "Hiro-Teams",
    "Hiro-Tutorials",
    "Hiro-Unlockables",
    "Hiro-Stats",
    "Hiro-Event-Leaderboards",
    "Hiro-Progression",
    "Hiro-Incentives",
];

/// Kind of game system a config belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemType {
    Achievements,
    Base,
    Economy,
    Energy,
    Inventory,
    Leaderboards,
    Teams,
    Tutorials,
    Unlockables,
    Stats,
    EventLeaderboards,
    Progression,
    Incentives,
    /// A host-defined system with no personalization flag.
    Other(String),
}

impl SystemType {
    /// Name of the remote flag carrying this system's overrides.
    pub fn flag_name(&self) -> Option<&'static str> {
        let name = match self {
            Self::Achievements => "Hiro-Achievements",
            Self::Base => "Hiro-Base",
            Self::Economy => "Hiro-Economy",
            Self::Energy => "Hiro-Energy",
            Self::Inventory => "Hiro-Inventory",
            Self::Leaderboards => "Hiro-Leaderboards",
            Self::Teams => "Hiro-Teams",
            Self::Tutorials => "Hiro-Tutorials",
            Self::Unlockables => "Hiro-Unlockables",
            Self::Stats => "Hiro-Stats",
            Self::EventLeaderboards => "Hiro-Event-Leaderboards",
            Self::Progression => "Hiro-Progression",
            Self::Incentives => "Hiro-Incentives",
            Self::Other(_) => return None,
        };
        Some(name)
    }

    /// Whether live events are layered on top of the flag for this system.
    pub fn requires_live_events(&self) -> bool {
        matches!(self, Self::Achievements | Self::EventLeaderboards)
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(name) => write!(f, "{name}"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// A personalizable configuration object.
///
/// Payloads are merged onto it field by field through its serde impls.
/// Fields the config does not declare are rejected by the merge engine.
pub trait SystemConfig: Serialize + DeserializeOwned + Send + 'static {}

impl<T> SystemConfig for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// A game system whose default config can be personalized.
pub trait System: Send + Sync {
    type Config: SystemConfig;

    fn system_type(&self) -> SystemType;

    /// A fresh copy of the system's default config.
    fn default_config(&self) -> Self::Config;
}

/// A [`System`] built from a fixed default config.
#[derive(Debug, Clone)]
pub struct ConfiguredSystem<C> {
    system_type: SystemType,
    default: C,
}

impl<C> ConfiguredSystem<C>
where
    C: SystemConfig + Clone + Sync,
{
    pub fn new(system_type: SystemType, default: C) -> Self {
        Self {
            system_type,
            default,
        }
    }
}

impl<C> System for ConfiguredSystem<C>
where
    C: SystemConfig + Clone + Sync,
{
    type Config = C;

    fn system_type(&self) -> SystemType {
        self.system_type.clone()
    }

    fn default_config(&self) -> C {
        self.default.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: [SystemType; 13] = [
        SystemType::Achievements,
        SystemType::Base,
        SystemType::Economy,
        SystemType::Energy,
        SystemType::Inventory,
        SystemType::Leaderboards,
        SystemType::Teams,
        SystemType::Tutorials,
        SystemType::Unlockables,
        SystemType::Stats,
        SystemType::EventLeaderboards,
        SystemType::Progression,
        SystemType::Incentives,
    ];

    #[test]
    fn test_every_known_system_has_a_batched_flag() {
        for system in KNOWN {
            let flag = system.flag_name().unwrap();
            assert!(ALL_FLAG_NAMES.contains(&flag), "{flag} missing");
        }
    }

    #[test]
    fn test_other_has_no_flag() {
        assert_eq!(SystemType::Other("Auctions".into()).flag_name(), None);
    }

    #[test]
    fn test_live_event_systems() {
        let known = KNOWN;
        let live: Vec<_> = known.iter().filter(|s| s.requires_live_events()).collect();
        assert_eq!(live, [&SystemType::Achievements, &SystemType::EventLeaderboards]);
    }

    #[test]
    fn test_display() {
        assert_eq!(SystemType::EventLeaderboards.to_string(), "EventLeaderboards");
        assert_eq!(SystemType::Other("Auctions".into()).to_string(), "Auctions");
    }
}
