use std::collections::BTreeSet;

use serde::Deserialize;

use crate::topology::oids::OPER_STATUS_UP;

/// ifType 6, ethernetCsmacd
pub const IF_TYPE_ETHERNET: i64 = 6;
/// ifType 56, fibreChannel
pub const IF_TYPE_FIBRE_CHANNEL: i64 = 56;

/// Which interface types may become ports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TypeSelection {
    /// `"*"` in configuration
    Any(Wildcard),
    Only(BTreeSet<i64>),
}

/// The literal `"*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wildcard;

impl<'de> Deserialize<'de> for Wildcard {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "*" {
            Ok(Wildcard)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected \"*\" or a list of interface types, got \"{}\"",
                s
            )))
        }
    }
}

impl TypeSelection {
    pub fn any() -> Self {
        TypeSelection::Any(Wildcard)
    }

    pub fn only(types: impl IntoIterator<Item = i64>) -> Self {
        TypeSelection::Only(types.into_iter().collect())
    }

    pub fn contains(&self, if_type: i64) -> bool {
        match self {
            TypeSelection::Any(_) => true,
            TypeSelection::Only(types) => types.contains(&if_type),
        }
    }
}

/// Rules deciding which interfaces become ports.
///
/// `filtered` wins over `allowed`. A check whose input could not be read is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfacePolicy {
    pub allowed: TypeSelection,
    pub filtered: BTreeSet<i64>,
    pub require_oper_up: bool,
}

impl Default for InterfacePolicy {
    fn default() -> Self {
        Self {
            allowed: TypeSelection::only([IF_TYPE_ETHERNET, IF_TYPE_FIBRE_CHANNEL]),
            filtered: BTreeSet::new(),
            require_oper_up: true,
        }
    }
}

impl InterfacePolicy {
    pub fn admits_type(&self, if_type: Option<i64>) -> bool {
        match if_type {
            Some(t) => self.allowed.contains(t) && !self.filtered.contains(&t),
            None => true,
        }
    }

    pub fn admits_status(&self, oper_status: Option<i64>) -> bool {
        match oper_status {
            Some(status) if self.require_oper_up => status == OPER_STATUS_UP,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_types() {
        let policy = InterfacePolicy {
            allowed: TypeSelection::only([6, 56]),
            ..Default::default()
        };
        assert!(policy.admits_type(Some(6)));
        assert!(policy.admits_type(Some(56)));
        assert!(!policy.admits_type(Some(24)));
        // Unknown type skips the check
        assert!(policy.admits_type(None));
    }

    #[test]
    fn test_filtered_wins() {
        let policy = InterfacePolicy {
            allowed: TypeSelection::any(),
            filtered: BTreeSet::from([161]),
            require_oper_up: false,
        };
        assert!(!policy.admits_type(Some(161)));
        assert!(policy.admits_type(Some(24)));

        let both = InterfacePolicy {
            allowed: TypeSelection::only([6, 161]),
            filtered: BTreeSet::from([161]),
            require_oper_up: true,
        };
        assert!(!both.admits_type(Some(161)));
    }

    #[test]
    fn test_oper_status() {
        let policy = InterfacePolicy::default();
        assert!(policy.admits_status(Some(1)));
        assert!(!policy.admits_status(Some(2)));
        assert!(policy.admits_status(None));

        let lenient = InterfacePolicy {
            require_oper_up: false,
            ..Default::default()
        };
        assert!(lenient.admits_status(Some(2)));
    }

    #[test]
    fn test_type_selection_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            types: TypeSelection,
        }
        let any: Wrapper = toml::from_str(r#"types = "*""#).unwrap();
        assert_eq!(any.types, TypeSelection::any());
        let only: Wrapper = toml::from_str("types = [6, 117]").unwrap();
        assert_eq!(only.types, TypeSelection::only([6, 117]));
        assert!(toml::from_str::<Wrapper>(r#"types = "ethernet""#).is_err());
    }
}
