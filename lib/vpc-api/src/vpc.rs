use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Tag;

/// Route table ids created for a VPC
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteTables {
    /// Route table with a default route to the internet gateway
    pub public: String,
    /// Route table without public egress
    pub private: String,
}

/// A subnet carved out of the VPC block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubnetRecord {
    pub subnet_id: String,
    pub cidr: String,
    /// Whether the subnet is associated with the public route table
    pub public: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Persisted metadata for a provisioned VPC, keyed by `vpc_id`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VpcRecord {
    /// Provider-assigned VPC id
    pub vpc_id: String,

    /// VPC address block
    pub cidr: String,

    /// Region the VPC lives in
    pub region: String,

    /// Subnets in partition order (lowest address first)
    pub subnets: Vec<SubnetRecord>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Internet gateway id
    pub igw: String,

    pub route_tables: RouteTables,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VpcRecord {
    /// Subnet ids in partition order
    pub fn subnet_ids(&self) -> Vec<String> {
        self.subnets.iter().map(|s| s.subnet_id.clone()).collect()
    }

    /// Number of subnets routed through the internet gateway
    pub fn public_subnet_count(&self) -> usize {
        self.subnets.iter().filter(|s| s.public).count()
    }
}

/// Caller-facing view of a VPC
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VpcResponse {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    pub region: String,
    pub igw: String,
    pub route_tables: RouteTables,
}

impl From<&VpcRecord> for VpcResponse {
    fn from(record: &VpcRecord) -> Self {
        Self {
            vpc_id: record.vpc_id.clone(),
            subnet_ids: record.subnet_ids(),
            tags: if record.tags.is_empty() {
                None
            } else {
                Some(record.tags.clone())
            },
            region: record.region.clone(),
            igw: record.igw.clone(),
            route_tables: record.route_tables.clone(),
        }
    }
}

/// Result of a tag update
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTagsResponse {
    pub vpc_id: String,
    pub updated_tags: Vec<Tag>,
}

/// Result of a delete
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeleteVpcResponse {
    pub vpc_id: String,
    pub message: String,
}

impl DeleteVpcResponse {
    pub fn deleted(vpc_id: &str) -> Self {
        Self {
            vpc_id: vpc_id.to_string(),
            message: format!("VPC {} and its resources deleted", vpc_id),
        }
    }
}
