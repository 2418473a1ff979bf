//! Network provisioning API abstraction

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use vpc_api::Tag;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Provider API calls, named as the provider names them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateVpc,
    DeleteVpc,
    CreateInternetGateway,
    AttachInternetGateway,
    DetachInternetGateway,
    DeleteInternetGateway,
    CreateSubnet,
    ModifySubnetAttribute,
    DeleteSubnet,
    CreateRouteTable,
    CreateRoute,
    AssociateRouteTable,
    DisassociateRouteTable,
    DeleteRouteTable,
    CreateTags,
    DeleteTags,
    Connect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure class reported by the provider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The referenced resource does not exist
    NotFound,
    /// Request rate exceeded; safe to retry
    Throttled,
    /// A dependent resource still references this one
    DependencyViolation,
    InvalidParameter,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed ({kind:?}): {message}")]
pub struct ProviderError {
    pub operation: Operation,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(operation: Operation, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(operation: Operation, resource_id: &str) -> Self {
        Self::new(
            operation,
            ProviderErrorKind::NotFound,
            format!("resource {} does not exist", resource_id),
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::Throttled
    }
}

/// Regional network provisioning API
///
/// Every call is a remote request; ids returned by `create_*` are
/// provider-assigned.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn create_vpc(&self, cidr: &str) -> ProviderResult<String>;

    async fn delete_vpc(&self, vpc_id: &str) -> ProviderResult<()>;

    async fn create_internet_gateway(&self) -> ProviderResult<String>;

    async fn attach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> ProviderResult<()>;

    async fn detach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> ProviderResult<()>;

    async fn delete_internet_gateway(&self, igw_id: &str) -> ProviderResult<()>;

    async fn create_subnet(&self, vpc_id: &str, cidr: &str) -> ProviderResult<String>;

    /// Toggle public IP assignment for instances launched into the subnet
    async fn set_map_public_ip_on_launch(&self, subnet_id: &str, enabled: bool) -> ProviderResult<()>;

    /// Deleting a subnet also drops its route table association
    async fn delete_subnet(&self, subnet_id: &str) -> ProviderResult<()>;

    async fn create_route_table(&self, vpc_id: &str) -> ProviderResult<String>;

    async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr: &str,
        gateway_id: &str,
    ) -> ProviderResult<()>;

    /// Returns the association id
    async fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> ProviderResult<String>;

    async fn disassociate_route_table(&self, association_id: &str) -> ProviderResult<()>;

    async fn delete_route_table(&self, route_table_id: &str) -> ProviderResult<()>;

    /// Add or overwrite tags on a resource
    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> ProviderResult<()>;

    /// Remove tags by key
    async fn untag_resource(&self, resource_id: &str, keys: &[String]) -> ProviderResult<()>;
}

/// Hands out a provider client bound to a region
pub trait ProviderFactory: Send + Sync {
    fn provider(&self, region: &str) -> ProviderResult<Arc<dyn NetworkProvider>>;
}
