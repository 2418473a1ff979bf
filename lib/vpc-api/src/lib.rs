//! VPC manager API types
//!
//! This library defines the shapes exchanged with callers of the VPC manager:
//! - Tag: provider resource tag (Key/Value pair)
//! - VpcRecord: persisted metadata for a provisioned VPC
//! - CreateVpcRequest / UpdateVpcTagsRequest: validated request payloads
//! - VpcResponse / UpdateTagsResponse / DeleteVpcResponse: response payloads

pub mod error;
pub mod request;
pub mod tag;
pub mod vpc;

pub use error::ValidationError;
pub use request::{CreateVpcRequest, UpdateVpcTagsRequest};
pub use tag::Tag;
pub use vpc::{
    DeleteVpcResponse, RouteTables, SubnetRecord, UpdateTagsResponse, VpcRecord, VpcResponse,
};
