//! Provider resource tags
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A provider resource tag
///
/// Serialized with the provider's capitalized `Key`/`Value` field names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a `key=value` pair. The value may be empty, the key may not.
    pub fn parse(pair: &str) -> Option<Self> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, value.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_provider_field_names() {
        let tag = Tag::new("Name", "prod");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json, serde_json::json!({"Key": "Name", "Value": "prod"}));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Tag::parse("Env=dev"), Some(Tag::new("Env", "dev")));
        assert_eq!(Tag::parse("Owner="), Some(Tag::new("Owner", "")));
        assert_eq!(Tag::parse("=dev"), None);
        assert_eq!(Tag::parse("nodelimiter"), None);
    }
}
