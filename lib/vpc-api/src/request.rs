//! Request payloads accepted by the VPC manager
//!
//! Validation here is field-level only (presence, ranges, tag keys). CIDR
//! arithmetic belongs to the subnet partitioner in `vpc-core`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Tag, ValidationError};

/// Request to create a VPC with subnets, gateway and route tables
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreateVpcRequest {
    /// CIDR block for the VPC, e.g. 10.0.0.0/16
    pub vpc_cidr: String,

    /// Total number of subnets to create
    pub subnet_count: i64,

    /// Number of subnets to make public (defaults to half, rounded down)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_subnet_count: Option<i64>,

    /// Tags for the VPC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_tags: Option<Vec<Tag>>,

    /// Tags for the subnets; entry `i` is applied to subnet `i`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_tags: Option<Vec<Tag>>,

    /// Region, e.g. ap-south-1
    pub region: String,
}

impl CreateVpcRequest {
    pub fn new(vpc_cidr: impl Into<String>, subnet_count: i64, region: impl Into<String>) -> Self {
        Self {
            vpc_cidr: vpc_cidr.into(),
            subnet_count,
            public_subnet_count: None,
            vpc_tags: None,
            subnet_tags: None,
            region: region.into(),
        }
    }

    pub fn with_public_subnet_count(mut self, count: i64) -> Self {
        self.public_subnet_count = Some(count);
        self
    }

    pub fn with_vpc_tags(mut self, tags: Vec<Tag>) -> Self {
        self.vpc_tags = Some(tags);
        self
    }

    pub fn with_subnet_tags(mut self, tags: Vec<Tag>) -> Self {
        self.subnet_tags = Some(tags);
        self
    }

    /// Public subnet count after applying the default of `subnet_count / 2`
    pub fn resolved_public_subnet_count(&self) -> i64 {
        self.public_subnet_count.unwrap_or(self.subnet_count / 2)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vpc_cidr.trim().is_empty() {
            return Err(ValidationError::MissingField("vpc_cidr"));
        }
        if self.region.trim().is_empty() {
            return Err(ValidationError::MissingField("region"));
        }
        if self.subnet_count <= 0 {
            return Err(ValidationError::invalid(
                "subnet_count",
                format!("must be positive, got {}", self.subnet_count),
            ));
        }

        let public = self.resolved_public_subnet_count();
        if public < 0 || public > self.subnet_count {
            return Err(ValidationError::invalid(
                "public_subnet_count",
                format!("must be between 0 and {}, got {}", self.subnet_count, public),
            ));
        }

        validate_tags("vpc_tags", self.vpc_tags.as_deref())?;
        validate_tags("subnet_tags", self.subnet_tags.as_deref())?;
        Ok(())
    }
}

/// Request to replace the tags of an existing VPC
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateVpcTagsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_tags: Option<Vec<Tag>>,

    pub region: String,
}

impl UpdateVpcTagsRequest {
    /// The new tag set; an absent list clears nothing and applies nothing
    pub fn tags(&self) -> Vec<Tag> {
        self.vpc_tags.clone().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.region.trim().is_empty() {
            return Err(ValidationError::MissingField("region"));
        }
        validate_tags("vpc_tags", self.vpc_tags.as_deref())
    }
}

fn validate_tags(field: &'static str, tags: Option<&[Tag]>) -> Result<(), ValidationError> {
    for tag in tags.unwrap_or_default() {
        if tag.key.trim().is_empty() {
            return Err(ValidationError::invalid(field, "tag keys must not be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_count_defaults_to_half() {
        assert_eq!(CreateVpcRequest::new("10.0.0.0/16", 5, "us-east-1").resolved_public_subnet_count(), 2);
        assert_eq!(CreateVpcRequest::new("10.0.0.0/16", 1, "us-east-1").resolved_public_subnet_count(), 0);
        let explicit = CreateVpcRequest::new("10.0.0.0/16", 4, "us-east-1").with_public_subnet_count(4);
        assert_eq!(explicit.resolved_public_subnet_count(), 4);
    }

    #[test]
    fn test_validate_rejects_non_positive_count() {
        let err = CreateVpcRequest::new("10.0.0.0/16", 0, "us-east-1").validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "subnet_count", .. }));
        assert!(CreateVpcRequest::new("10.0.0.0/16", -3, "us-east-1").validate().is_err());
    }

    #[test]
    fn test_validate_public_count_range() {
        let too_many = CreateVpcRequest::new("10.0.0.0/16", 2, "us-east-1").with_public_subnet_count(3);
        assert!(too_many.validate().is_err());
        let negative = CreateVpcRequest::new("10.0.0.0/16", 2, "us-east-1").with_public_subnet_count(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_validate_required_fields() {
        assert_eq!(
            CreateVpcRequest::new("", 2, "us-east-1").validate(),
            Err(ValidationError::MissingField("vpc_cidr"))
        );
        assert_eq!(
            CreateVpcRequest::new("10.0.0.0/16", 2, " ").validate(),
            Err(ValidationError::MissingField("region"))
        );
    }

    #[test]
    fn test_validate_tag_keys() {
        let request = CreateVpcRequest::new("10.0.0.0/16", 2, "us-east-1")
            .with_subnet_tags(vec![Tag::new("", "x")]);
        assert!(request.validate().is_err());

        let update = UpdateVpcTagsRequest {
            vpc_tags: Some(vec![Tag::new("Env", "dev")]),
            region: "us-east-1".to_string(),
        };
        assert!(update.validate().is_ok());
        assert_eq!(update.tags(), vec![Tag::new("Env", "dev")]);
    }

    #[test]
    fn test_deserialize_minimal_payload() {
        let request: CreateVpcRequest = serde_json::from_str(
            r#"{"vpc_cidr": "10.1.0.0/16", "subnet_count": 2, "region": "ap-south-1",
                "vpc_tags": [{"Key": "Name", "Value": "TestVPC"}]}"#,
        )
        .unwrap();
        assert_eq!(request.public_subnet_count, None);
        assert_eq!(request.vpc_tags, Some(vec![Tag::new("Name", "TestVPC")]));
        assert!(request.validate().is_ok());
    }
}
