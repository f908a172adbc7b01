//! Property dictionaries.
//!
//! Services describe themselves (`properties`) and the provider they want
//! (`personality`) with string-keyed dictionaries of tagged scalar values.
//! The key spellings in [`keys`] are the contract between a service and the
//! publish step and must not change.

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

/// A tagged property value.
///
/// Serialized untagged, so a JSON number, boolean or string maps straight to
/// the matching variant. Equality compares tag and payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(u64),
    Bool(bool),
    String(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::Number(v as u64)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(String::from(v))
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// String-keyed property map. Ordered, so dumps are stable.
pub type PropertyDictionary = BTreeMap<String, PropertyValue>;

/// Well-known property keys.
pub mod keys {
    /// Class name of a service
    pub const IO_CLASS: &str = "IOClass";
    /// Personality key matched against a candidate's `IOClass`
    pub const IO_PROVIDER_CLASS: &str = "IOProviderClass";
    /// Device node name to publish under
    pub const IO_BSD_NAME: &str = "IOBSDName";
    /// `"character"` or `"block"`
    pub const IO_BSD_TYPE: &str = "IOBSDType";
    /// Major number override (defaults to the service ID)
    pub const IO_BSD_MAJOR: &str = "IOBSDMajor";
    /// Minor number override (defaults to 0)
    pub const IO_BSD_MINOR: &str = "IOBSDMinor";

    pub const BSD_TYPE_CHARACTER: &str = "character";
    pub const BSD_TYPE_BLOCK: &str = "block";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_compares_tag() {
        assert_eq!(PropertyValue::from(1u64), PropertyValue::Number(1));
        assert_ne!(PropertyValue::from(1u64), PropertyValue::from(true));
        assert_ne!(PropertyValue::from("1"), PropertyValue::from(1u64));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(PropertyValue::from("IOSerial").as_str(), Some("IOSerial"));
        assert_eq!(PropertyValue::from(3u32).as_u64(), Some(3));
        assert_eq!(PropertyValue::from(false).as_bool(), Some(false));
        assert_eq!(PropertyValue::from(3u32).as_str(), None);
    }

    #[test]
    fn test_untagged_json() {
        let dict: PropertyDictionary = serde_json::from_str(
            r#"{"IOClass":"IOSerial","IOBSDMajor":7,"Enabled":true}"#,
        )
        .unwrap();
        assert_eq!(dict.get(keys::IO_CLASS), Some(&PropertyValue::from("IOSerial")));
        assert_eq!(dict.get(keys::IO_BSD_MAJOR), Some(&PropertyValue::Number(7)));
        assert_eq!(dict.get("Enabled"), Some(&PropertyValue::Bool(true)));

        let json = serde_json::to_string(&PropertyValue::from("x")).unwrap();
        assert_eq!(json, "\"x\"");
    }

    #[test]
    fn test_display() {
        assert_eq!(alloc::format!("{}", PropertyValue::from("a")), "\"a\"");
        assert_eq!(alloc::format!("{}", PropertyValue::from(4u64)), "4");
    }
}
