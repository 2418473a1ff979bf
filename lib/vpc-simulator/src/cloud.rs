//! Simulated multi-region cloud implementing the provider traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use vpc_api::Tag;
use vpc_core::provider::{
    NetworkProvider, Operation, ProviderError, ProviderErrorKind, ProviderFactory, ProviderResult,
};

use crate::error::SimulatorError;
use crate::state::RegionState;

#[derive(Clone, Copy, Debug)]
struct Fault {
    /// Calls left until the failing one; 1 means the next call fails
    countdown: u32,
    kind: ProviderErrorKind,
    persistent: bool,
}

#[derive(Default, Serialize, Deserialize)]
struct CloudState {
    regions: BTreeMap<String, RegionState>,
    #[serde(skip)]
    faults: HashMap<Operation, Fault>,
    #[serde(skip)]
    calls: HashMap<Operation, u32>,
}

impl CloudState {
    /// Count the call and apply any armed fault
    fn begin(&mut self, operation: Operation) -> ProviderResult<()> {
        *self.calls.entry(operation).or_insert(0) += 1;

        let Some(fault) = self.faults.get_mut(&operation) else {
            return Ok(());
        };
        if fault.persistent {
            return Err(injected(operation, fault.kind));
        }

        fault.countdown = fault.countdown.saturating_sub(1);
        if fault.countdown > 0 {
            return Ok(());
        }
        let kind = fault.kind;
        self.faults.remove(&operation);
        Err(injected(operation, kind))
    }
}

fn injected(operation: Operation, kind: ProviderErrorKind) -> ProviderError {
    ProviderError::new(operation, kind, "injected fault")
}

/// Shared simulated cloud; clones see the same state
#[derive(Clone, Default)]
pub struct SimulatedCloud {
    state: Arc<Mutex<CloudState>>,
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, starting empty when the file does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SimulatorError> {
        let path = path.as_ref();
        let state = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}, starting empty", path.display());
                CloudState::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Write the resource state (not faults or call counts) to `path`
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SimulatorError> {
        let path = path.as_ref();
        let json = {
            let state = self.state.lock().await;
            serde_json::to_vec_pretty(&*state)?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        info!("Saved simulator snapshot to {}", path.display());
        Ok(())
    }

    /// Make the `nth` upcoming call to `operation` fail once (1 = next call)
    pub async fn fail_on(&self, operation: Operation, nth: u32, kind: ProviderErrorKind) {
        let mut state = self.state.lock().await;
        state.faults.insert(
            operation,
            Fault {
                countdown: nth.max(1),
                kind,
                persistent: false,
            },
        );
    }

    /// Make every call to `operation` fail until faults are cleared
    pub async fn fail_always(&self, operation: Operation, kind: ProviderErrorKind) {
        let mut state = self.state.lock().await;
        state.faults.insert(
            operation,
            Fault {
                countdown: 0,
                kind,
                persistent: true,
            },
        );
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// How many times `operation` has been called, failed calls included
    pub async fn call_count(&self, operation: Operation) -> u32 {
        let state = self.state.lock().await;
        state.calls.get(&operation).copied().unwrap_or(0)
    }

    /// Copy of a region's resources
    pub async fn region_state(&self, region: &str) -> RegionState {
        let state = self.state.lock().await;
        state.regions.get(region).cloned().unwrap_or_default()
    }

    pub async fn resource_count(&self, region: &str) -> usize {
        let state = self.state.lock().await;
        state.regions.get(region).map_or(0, RegionState::resource_count)
    }

    /// Run one provider call against a region
    async fn call<T>(
        &self,
        region: &str,
        operation: Operation,
        apply: impl FnOnce(&mut RegionState) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        let mut state = self.state.lock().await;
        state.begin(operation)?;
        let result = apply(state.regions.entry(region.to_string()).or_default());
        match &result {
            Ok(_) => debug!("[{}] {} ok", region, operation),
            Err(e) => debug!("[{}] {}", region, e),
        }
        result
    }
}

impl ProviderFactory for SimulatedCloud {
    fn provider(&self, region: &str) -> ProviderResult<Arc<dyn NetworkProvider>> {
        let region = region.trim();
        if region.is_empty() {
            return Err(ProviderError::new(
                Operation::Connect,
                ProviderErrorKind::InvalidParameter,
                "region must not be empty",
            ));
        }
        Ok(Arc::new(RegionalProvider {
            region: region.to_string(),
            cloud: self.clone(),
        }))
    }
}

/// Provider client bound to one region of a [`SimulatedCloud`]
pub struct RegionalProvider {
    region: String,
    cloud: SimulatedCloud,
}

#[async_trait]
impl NetworkProvider for RegionalProvider {
    async fn create_vpc(&self, cidr: &str) -> ProviderResult<String> {
        self.cloud
            .call(&self.region, Operation::CreateVpc, |r| r.create_vpc(cidr))
            .await
    }

    async fn delete_vpc(&self, vpc_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DeleteVpc, |r| r.delete_vpc(vpc_id))
            .await
    }

    async fn create_internet_gateway(&self) -> ProviderResult<String> {
        self.cloud
            .call(&self.region, Operation::CreateInternetGateway, |r| {
                Ok(r.create_internet_gateway())
            })
            .await
    }

    async fn attach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::AttachInternetGateway, |r| {
                r.attach_internet_gateway(igw_id, vpc_id)
            })
            .await
    }

    async fn detach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DetachInternetGateway, |r| {
                r.detach_internet_gateway(igw_id, vpc_id)
            })
            .await
    }

    async fn delete_internet_gateway(&self, igw_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DeleteInternetGateway, |r| {
                r.delete_internet_gateway(igw_id)
            })
            .await
    }

    async fn create_subnet(&self, vpc_id: &str, cidr: &str) -> ProviderResult<String> {
        self.cloud
            .call(&self.region, Operation::CreateSubnet, |r| r.create_subnet(vpc_id, cidr))
            .await
    }

    async fn set_map_public_ip_on_launch(&self, subnet_id: &str, enabled: bool) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::ModifySubnetAttribute, |r| {
                r.set_map_public_ip_on_launch(subnet_id, enabled)
            })
            .await
    }

    async fn delete_subnet(&self, subnet_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DeleteSubnet, |r| r.delete_subnet(subnet_id))
            .await
    }

    async fn create_route_table(&self, vpc_id: &str) -> ProviderResult<String> {
        self.cloud
            .call(&self.region, Operation::CreateRouteTable, |r| r.create_route_table(vpc_id))
            .await
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr: &str,
        gateway_id: &str,
    ) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::CreateRoute, |r| {
                r.create_route(route_table_id, destination_cidr, gateway_id)
            })
            .await
    }

    async fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> ProviderResult<String> {
        self.cloud
            .call(&self.region, Operation::AssociateRouteTable, |r| {
                r.associate_route_table(route_table_id, subnet_id)
            })
            .await
    }

    async fn disassociate_route_table(&self, association_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DisassociateRouteTable, |r| {
                r.disassociate_route_table(association_id)
            })
            .await
    }

    async fn delete_route_table(&self, route_table_id: &str) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DeleteRouteTable, |r| {
                r.delete_route_table(route_table_id)
            })
            .await
    }

    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::CreateTags, |r| r.tag_resource(resource_id, tags))
            .await
    }

    async fn untag_resource(&self, resource_id: &str, keys: &[String]) -> ProviderResult<()> {
        self.cloud
            .call(&self.region, Operation::DeleteTags, |r| r.untag_resource(resource_id, keys))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_regions_are_isolated() {
        let cloud = SimulatedCloud::new();
        let east = cloud.provider("us-east-1").unwrap();
        let west = cloud.provider("us-west-2").unwrap();

        let vpc = east.create_vpc("10.0.0.0/16").await.unwrap();
        assert_eq!(cloud.resource_count("us-east-1").await, 1);
        assert_eq!(cloud.resource_count("us-west-2").await, 0);
        assert!(west.delete_vpc(&vpc).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_empty_region_rejected() {
        let cloud = SimulatedCloud::new();
        let err = cloud.provider("  ").err().expect("empty region accepted");
        assert_eq!(err.operation, Operation::Connect);
    }

    #[tokio::test]
    async fn test_fail_on_nth_call() {
        let cloud = SimulatedCloud::new();
        let provider = cloud.provider("us-east-1").unwrap();
        cloud.fail_on(Operation::CreateVpc, 2, ProviderErrorKind::Throttled).await;

        assert!(provider.create_vpc("10.0.0.0/16").await.is_ok());
        let err = provider.create_vpc("10.1.0.0/16").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(provider.create_vpc("10.2.0.0/16").await.is_ok());

        assert_eq!(cloud.call_count(Operation::CreateVpc).await, 3);
        assert_eq!(cloud.resource_count("us-east-1").await, 2);
    }

    #[tokio::test]
    async fn test_fail_always_until_cleared() {
        let cloud = SimulatedCloud::new();
        let provider = cloud.provider("us-east-1").unwrap();
        cloud
            .fail_always(Operation::CreateInternetGateway, ProviderErrorKind::Internal)
            .await;

        assert!(provider.create_internet_gateway().await.is_err());
        assert!(provider.create_internet_gateway().await.is_err());
        cloud.clear_faults().await;
        assert!(provider.create_internet_gateway().await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/cloud.json");

        let cloud = SimulatedCloud::load(&path).await.unwrap();
        let provider = cloud.provider("ap-south-1").unwrap();
        let vpc = provider.create_vpc("10.0.0.0/16").await.unwrap();
        provider.tag_resource(&vpc, &[Tag::new("Name", "snap")]).await.unwrap();
        cloud.save(&path).await.unwrap();

        let restored = SimulatedCloud::load(&path).await.unwrap();
        let region = restored.region_state("ap-south-1").await;
        assert_eq!(region, cloud.region_state("ap-south-1").await);
        assert_eq!(region.tags_of(&vpc), Some(vec![Tag::new("Name", "snap")]));
    }
}
