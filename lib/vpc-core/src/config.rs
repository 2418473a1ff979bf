//! Manager configuration

use std::time::Duration;

use crate::error::{Result, VpcError};
use crate::retry::RetryPolicy;

/// Configuration for the VPC manager and its backing systems
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerConfig {
    /// Metadata table name
    pub table_name: String,
    /// Region hosting the metadata table
    pub db_region: String,
    /// Region used when a caller does not name one
    pub default_region: String,
    /// Retry policy for throttled provider calls
    pub retry: RetryPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            table_name: "VpcTable".to_string(),
            db_region: "us-east-1".to_string(),
            default_region: "us-east-1".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Read configuration from the process environment
    ///
    /// `TABLE_NAME`, `DB_REGION`, `AWS_REGION`, `VPC_MAX_RETRIES` and
    /// `VPC_RETRY_BACKOFF_MS` override the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(table) = lookup("TABLE_NAME") {
            config.table_name = table;
        }
        if let Some(region) = lookup("DB_REGION") {
            config.db_region = region.clone();
            config.default_region = region;
        }
        if let Some(region) = lookup("AWS_REGION") {
            config.default_region = region;
        }
        if let Some(retries) = lookup("VPC_MAX_RETRIES") {
            config.retry.max_retries = parse_number("VPC_MAX_RETRIES", &retries)?;
        }
        if let Some(backoff) = lookup("VPC_RETRY_BACKOFF_MS") {
            let ms: u64 = parse_number("VPC_RETRY_BACKOFF_MS", &backoff)?;
            config.retry.initial_backoff = Duration::from_millis(ms);
        }

        if config.table_name.trim().is_empty() {
            return Err(VpcError::Configuration("TABLE_NAME must not be empty".to_string()));
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| VpcError::Configuration(format!("{} must be a number, got {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert_eq!(config.table_name, "VpcTable");
    }

    #[test]
    fn test_overrides() {
        let config = ManagerConfig::from_lookup(lookup(&[
            ("TABLE_NAME", "TestVpcTable"),
            ("DB_REGION", "ap-south-1"),
            ("VPC_MAX_RETRIES", "5"),
            ("VPC_RETRY_BACKOFF_MS", "20"),
        ]))
        .unwrap();
        assert_eq!(config.table_name, "TestVpcTable");
        assert_eq!(config.db_region, "ap-south-1");
        assert_eq!(config.default_region, "ap-south-1");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(20));
    }

    #[test]
    fn test_aws_region_wins_for_default_region() {
        let config = ManagerConfig::from_lookup(lookup(&[
            ("DB_REGION", "us-east-1"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert_eq!(config.db_region, "us-east-1");
        assert_eq!(config.default_region, "eu-west-1");
    }

    #[test]
    fn test_invalid_numbers() {
        let err = ManagerConfig::from_lookup(lookup(&[("VPC_MAX_RETRIES", "lots")])).unwrap_err();
        assert!(matches!(err, VpcError::Configuration(_)));
        assert!(ManagerConfig::from_lookup(lookup(&[("TABLE_NAME", " ")])).is_err());
    }
}
