//! Core VPC provisioning functionality
//!
//! This library provides:
//! - Subnet partitioning of a VPC block into equal-sized subnets
//! - Provider and metadata store abstractions
//! - VpcManager, which provisions provider resources and keeps metadata in sync

pub mod config;
pub mod error;
pub mod file_store;
pub mod manager;
pub mod partition;
pub mod provider;
pub mod retry;
pub mod store;

pub use config::ManagerConfig;
pub use error::{Result, VpcError};
pub use file_store::JsonFileStore;
pub use manager::VpcManager;
pub use partition::{partition_cidr, PartitionError};
pub use provider::{
    NetworkProvider, Operation, ProviderError, ProviderErrorKind, ProviderFactory, ProviderResult,
};
pub use retry::RetryPolicy;
pub use store::{InMemoryMetadataStore, MetadataStore, StoreError};
