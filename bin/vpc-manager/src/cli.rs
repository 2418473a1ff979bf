//! Command-line surface over the VPC manager operations

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use vpc_api::{CreateVpcRequest, Tag, UpdateTagsResponse, UpdateVpcTagsRequest, VpcResponse};
use vpc_core::{ManagerConfig, VpcError, VpcManager};

#[derive(Parser, Debug)]
#[command(name = "vpc-manager", version, about = "Create, inspect and delete VPCs")]
pub struct Cli {
    /// Directory holding the metadata table and simulator state
    #[arg(long, env = "VPC_STATE_DIR", default_value = ".vpc-manager")]
    pub state_dir: PathBuf,

    /// Emit logs as JSON
    #[arg(long, env = "VPC_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a VPC with subnets, an internet gateway and route tables
    Create {
        /// VPC block, e.g. 10.0.0.0/16
        cidr: String,

        /// Number of subnets
        #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
        subnets: i64,

        /// Number of public subnets (defaults to half)
        #[arg(long, allow_negative_numbers = true)]
        public: Option<i64>,

        /// VPC tag as key=value (repeatable)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<Tag>,

        /// Subnet tag as key=value; the nth flag tags the nth subnet
        #[arg(long = "subnet-tag", value_parser = parse_tag)]
        subnet_tags: Vec<Tag>,

        #[arg(long)]
        region: Option<String>,
    },

    /// Show one VPC
    Get { vpc_id: String },

    /// List all VPCs
    List,

    /// Replace the tags of a VPC
    Update {
        vpc_id: String,

        /// Tag as key=value (repeatable); none clears all tags
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<Tag>,

        #[arg(long)]
        region: Option<String>,
    },

    /// Delete a VPC and its resources
    Delete {
        vpc_id: String,

        #[arg(long)]
        region: Option<String>,
    },

    /// Print JSON schemas of the request and response payloads
    Schema,
}

fn parse_tag(value: &str) -> std::result::Result<Tag, String> {
    Tag::parse(value).ok_or_else(|| format!("expected key=value, got {:?}", value))
}

fn non_empty(tags: Vec<Tag>) -> Option<Vec<Tag>> {
    (!tags.is_empty()).then_some(tags)
}

pub async fn run(manager: &VpcManager, config: &ManagerConfig, command: Command) -> Result<Value> {
    let output = match command {
        Command::Create {
            cidr,
            subnets,
            public,
            tags,
            subnet_tags,
            region,
        } => {
            let request = CreateVpcRequest {
                vpc_cidr: cidr,
                subnet_count: subnets,
                public_subnet_count: public,
                vpc_tags: non_empty(tags),
                subnet_tags: non_empty(subnet_tags),
                region: region.unwrap_or_else(|| config.default_region.clone()),
            };
            let record = manager.create(&request).await?;
            serde_json::to_value(VpcResponse::from(&record))?
        }
        Command::Get { vpc_id } => {
            let record = manager
                .get(&vpc_id)
                .await?
                .ok_or(VpcError::NotFound(vpc_id))?;
            serde_json::to_value(VpcResponse::from(&record))?
        }
        Command::List => {
            let records = manager.list().await?;
            let responses: Vec<VpcResponse> = records.iter().map(VpcResponse::from).collect();
            serde_json::to_value(responses)?
        }
        Command::Update { vpc_id, tags, region } => {
            let request = UpdateVpcTagsRequest {
                vpc_tags: Some(tags),
                region: region.unwrap_or_else(|| config.default_region.clone()),
            };
            request.validate().map_err(VpcError::from)?;
            let updated_tags = manager
                .update(&vpc_id, request.tags())
                .await?
                .ok_or_else(|| VpcError::NotFound(vpc_id.clone()))?;
            serde_json::to_value(UpdateTagsResponse {
                vpc_id,
                updated_tags,
            })?
        }
        Command::Delete { vpc_id, region } => {
            let region = region.unwrap_or_else(|| config.default_region.clone());
            let response = manager
                .delete(&vpc_id, &region)
                .await?
                .ok_or(VpcError::NotFound(vpc_id))?;
            serde_json::to_value(response)?
        }
        Command::Schema => json!({
            "create_request": schemars::schema_for!(CreateVpcRequest),
            "update_request": schemars::schema_for!(UpdateVpcTagsRequest),
            "vpc_response": schemars::schema_for!(VpcResponse),
        }),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpc_core::InMemoryMetadataStore;
    use vpc_simulator::SimulatedCloud;

    fn manager() -> VpcManager {
        VpcManager::new(
            Arc::new(SimulatedCloud::new()),
            Arc::new(InMemoryMetadataStore::new()),
        )
    }

    fn assert_not_found(result: Result<Value>, vpc_id: &str) {
        let err = result.unwrap_err();
        match err.downcast_ref::<VpcError>() {
            Some(VpcError::NotFound(id)) => assert_eq!(id, vpc_id),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let manager = manager();
        let config = ManagerConfig::default();

        let get = Command::Get {
            vpc_id: "vpc-missing".to_string(),
        };
        assert_not_found(run(&manager, &config, get).await, "vpc-missing");

        let update = Command::Update {
            vpc_id: "vpc-missing".to_string(),
            tags: vec![Tag::new("Env", "dev")],
            region: None,
        };
        assert_not_found(run(&manager, &config, update).await, "vpc-missing");

        let delete = Command::Delete {
            vpc_id: "vpc-missing".to_string(),
            region: Some("ap-south-1".to_string()),
        };
        assert_not_found(run(&manager, &config, delete).await, "vpc-missing");
    }

    #[tokio::test]
    async fn test_create_then_list_outputs_responses() {
        let manager = manager();
        let config = ManagerConfig::default();

        let create = Command::Create {
            cidr: "10.0.0.0/16".to_string(),
            subnets: 2,
            public: None,
            tags: vec![Tag::new("Name", "demo")],
            subnet_tags: vec![],
            region: None,
        };
        let created = run(&manager, &config, create).await.unwrap();
        assert_eq!(created["region"], "us-east-1");
        assert_eq!(created["tags"], serde_json::json!([{"Key": "Name", "Value": "demo"}]));

        let listed = run(&manager, &config, Command::List).await.unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["vpc_id"], created["vpc_id"]);
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "vpc-manager",
            "create",
            "10.0.0.0/16",
            "--subnets",
            "4",
            "--tag",
            "Name=demo",
            "--subnet-tag",
            "Tier=Public",
            "--region",
            "ap-south-1",
        ])
        .unwrap();

        match cli.command {
            Command::Create {
                cidr,
                subnets,
                public,
                tags,
                subnet_tags,
                region,
            } => {
                assert_eq!(cidr, "10.0.0.0/16");
                assert_eq!(subnets, 4);
                assert_eq!(public, None);
                assert_eq!(tags, vec![Tag::new("Name", "demo")]);
                assert_eq!(subnet_tags, vec![Tag::new("Tier", "Public")]);
                assert_eq!(region.as_deref(), Some("ap-south-1"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_tag() {
        assert!(Cli::try_parse_from(["vpc-manager", "update", "vpc-1", "--tag", "novalue"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["vpc-manager", "list"]).unwrap();
        assert!(!cli.json_logs);
        assert!(matches!(cli.command, Command::List));
    }
}
