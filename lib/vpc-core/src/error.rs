use thiserror::Error;
use vpc_api::ValidationError;

use crate::partition::PartitionError;
use crate::provider::ProviderError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, VpcError>;

#[derive(Error, Debug)]
pub enum VpcError {
    /// Bad CIDR, subnet count or request field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("VPC not found: {0}")]
    NotFound(String),

    /// A provider call failed
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProviderError),

    /// A metadata store call failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl VpcError {
    /// HTTP status an API layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            VpcError::InvalidInput(_) => 400,
            VpcError::NotFound(_) => 404,
            VpcError::Provisioning(_) => 502,
            VpcError::Persistence(_) | VpcError::Configuration(_) => 500,
        }
    }
}

impl From<PartitionError> for VpcError {
    fn from(err: PartitionError) -> Self {
        VpcError::InvalidInput(err.to_string())
    }
}

impl From<ValidationError> for VpcError {
    fn from(err: ValidationError) -> Self {
        VpcError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Operation, ProviderErrorKind};

    #[test]
    fn test_status_codes() {
        assert_eq!(VpcError::from(PartitionError::ZeroSubnets).status_code(), 400);
        assert_eq!(VpcError::NotFound("vpc-1".to_string()).status_code(), 404);

        let provider = ProviderError::new(Operation::CreateVpc, ProviderErrorKind::Internal, "boom");
        assert_eq!(VpcError::from(provider).status_code(), 502);

        let store = StoreError::Unavailable("table offline".to_string());
        assert_eq!(VpcError::from(store).status_code(), 500);
    }

    #[test]
    fn test_messages() {
        let err = VpcError::from(ValidationError::MissingField("region"));
        assert_eq!(err.to_string(), "Invalid input: Missing required field: region");
    }
}
