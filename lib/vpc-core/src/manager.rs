//! VPC orchestration over a network provider and a metadata store
//!
//! `create` provisions in dependency order (VPC, gateway, subnets, route
//! tables, associations, tags) and persists the record last. A provider
//! failure tears down whatever was created so far, newest first, before the
//! error surfaces. `delete` walks the same graph children first and removes
//! the record only once every provider resource is gone.

use chrono::Utc;
use ipnetwork::Ipv4Network;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vpc_api::{
    CreateVpcRequest, DeleteVpcResponse, RouteTables, SubnetRecord, Tag, VpcRecord,
};

use crate::error::{Result, VpcError};
use crate::partition::{parse_ipv4_cidr, partition};
use crate::provider::{NetworkProvider, ProviderFactory, ProviderResult};
use crate::retry::RetryPolicy;
use crate::store::MetadataStore;

/// Destination of the default route in the public route table
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Most subnets a single VPC may hold (the provider's default per-VPC quota)
pub const MAX_SUBNETS: usize = 200;

/// Provider resources created during a `create`, in creation order
#[derive(Clone, Debug, PartialEq, Eq)]
enum Created {
    Vpc(String),
    InternetGateway(String),
    GatewayAttachment { igw_id: String, vpc_id: String },
    Subnet(String),
    RouteTable(String),
    Association(String),
}

/// Validated inputs for a `create`
struct CreatePlan<'a> {
    cidr: String,
    region: &'a str,
    subnets: Vec<Ipv4Network>,
    public_count: usize,
    vpc_tags: &'a [Tag],
    subnet_tags: BTreeMap<usize, Vec<Tag>>,
}

/// Stateless facade for VPC CRUD
///
/// Cloning is cheap; clones share the provider factory and store.
#[derive(Clone)]
pub struct VpcManager {
    providers: Arc<dyn ProviderFactory>,
    store: Arc<dyn MetadataStore>,
    retry: RetryPolicy,
}

impl VpcManager {
    pub fn new(providers: Arc<dyn ProviderFactory>, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            providers,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Provision a VPC with its gateway, subnets and route tables, then persist it
    pub async fn create(&self, request: &CreateVpcRequest) -> Result<VpcRecord> {
        let plan = plan_create(request)?;
        info!(
            "Creating VPC {} with {} subnets ({} public) in {}",
            plan.cidr,
            plan.subnets.len(),
            plan.public_count,
            plan.region
        );

        let provider = self.providers.provider(plan.region)?;
        let mut created = Vec::new();
        let record = match self.provision(provider.as_ref(), &plan, &mut created).await {
            Ok(record) => record,
            Err(e) => {
                error!("Provisioning {} failed: {}", plan.cidr, e);
                self.teardown(provider.as_ref(), created).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.put(&record).await {
            error!(
                "VPC {} provisioned but its record could not be stored, resources left in place: {}",
                record.vpc_id, e
            );
            return Err(e.into());
        }

        info!("Created VPC {}", record.vpc_id);
        Ok(record)
    }

    /// Look up a record; `None` when the id is unknown
    pub async fn get(&self, vpc_id: &str) -> Result<Option<VpcRecord>> {
        let record = self.store.get(vpc_id).await?;
        if record.is_none() {
            debug!("VPC {} not found", vpc_id);
        }
        Ok(record)
    }

    /// All known records
    pub async fn list(&self) -> Result<Vec<VpcRecord>> {
        let records = self.store.scan().await?;
        debug!("Listed {} VPCs", records.len());
        Ok(records)
    }

    /// Replace the VPC's tags with `tags`
    ///
    /// The provider is updated first; the record is rewritten only after the
    /// provider confirms. Returns `None` when the id is unknown.
    pub async fn update(&self, vpc_id: &str, tags: Vec<Tag>) -> Result<Option<Vec<Tag>>> {
        if tags.iter().any(|t| t.key.trim().is_empty()) {
            return Err(VpcError::InvalidInput("tag keys must not be empty".to_string()));
        }

        let Some(mut record) = self.store.get(vpc_id).await? else {
            info!("Update skipped, VPC {} not found", vpc_id);
            return Ok(None);
        };

        let provider = self.providers.provider(&record.region)?;
        let provider = provider.as_ref();

        if !tags.is_empty() {
            let new_tags = tags.as_slice();
            self.retry
                .run(move || provider.tag_resource(vpc_id, new_tags))
                .await?;
        }

        let stale: Vec<String> = record
            .tags
            .iter()
            .filter(|old| !tags.iter().any(|t| t.key == old.key))
            .map(|old| old.key.clone())
            .collect();
        if !stale.is_empty() {
            let stale_keys = stale.as_slice();
            if let Err(e) = self
                .retry
                .run(move || provider.untag_resource(vpc_id, stale_keys))
                .await
            {
                if !tags.is_empty() {
                    warn!(
                        "VPC {} has new tags {:?} applied but stale keys {:?} still present; record left unchanged",
                        vpc_id, tags, stale
                    );
                }
                return Err(e.into());
            }
        }

        record.tags = tags.clone();
        record.updated_at = Utc::now();
        self.store.put(&record).await?;

        info!("Updated tags on VPC {}: {} tags", vpc_id, tags.len());
        Ok(Some(tags))
    }

    /// Delete the VPC's provider resources, then its record
    ///
    /// The record's region is authoritative. On partial failure the record is
    /// kept so the delete can be retried. Returns `None` when the id is unknown.
    pub async fn delete(&self, vpc_id: &str, region: &str) -> Result<Option<DeleteVpcResponse>> {
        let Some(record) = self.store.get(vpc_id).await? else {
            info!("Delete skipped, VPC {} not found", vpc_id);
            return Ok(None);
        };

        if record.region != region {
            warn!(
                "Delete of {} requested for region {}, using recorded region {}",
                vpc_id, region, record.region
            );
        }

        let provider = self.providers.provider(&record.region)?;
        let provider = provider.as_ref();

        for subnet in &record.subnets {
            let subnet_id = subnet.subnet_id.as_str();
            self.remove(move || provider.delete_subnet(subnet_id)).await?;
            debug!("Deleted subnet {}", subnet_id);
        }

        for route_table_id in [
            record.route_tables.public.as_str(),
            record.route_tables.private.as_str(),
        ] {
            self.remove(move || provider.delete_route_table(route_table_id)).await?;
            debug!("Deleted route table {}", route_table_id);
        }

        let igw_id = record.igw.as_str();
        self.remove(move || provider.detach_internet_gateway(igw_id, vpc_id)).await?;
        self.remove(move || provider.delete_internet_gateway(igw_id)).await?;
        debug!("Deleted internet gateway {}", igw_id);

        self.remove(move || provider.delete_vpc(vpc_id)).await?;
        self.store.delete(vpc_id).await?;

        info!("Deleted VPC {}", vpc_id);
        Ok(Some(DeleteVpcResponse::deleted(vpc_id)))
    }

    async fn provision(
        &self,
        provider: &dyn NetworkProvider,
        plan: &CreatePlan<'_>,
        created: &mut Vec<Created>,
    ) -> ProviderResult<VpcRecord> {
        let retry = &self.retry;

        let cidr = plan.cidr.as_str();
        let vpc_id = retry.run(move || provider.create_vpc(cidr)).await?;
        created.push(Created::Vpc(vpc_id.clone()));
        debug!("Created VPC resource {}", vpc_id);
        let vpc = vpc_id.as_str();

        let igw_id = retry.run(move || provider.create_internet_gateway()).await?;
        created.push(Created::InternetGateway(igw_id.clone()));
        let igw = igw_id.as_str();
        retry
            .run(move || provider.attach_internet_gateway(igw, vpc))
            .await?;
        created.push(Created::GatewayAttachment {
            igw_id: igw_id.clone(),
            vpc_id: vpc_id.clone(),
        });
        debug!("Attached internet gateway {} to {}", igw_id, vpc_id);

        let mut subnets = Vec::with_capacity(plan.subnets.len());
        for (index, network) in plan.subnets.iter().enumerate() {
            let subnet_cidr = network.to_string();
            let cidr = subnet_cidr.as_str();
            let subnet_id = retry.run(move || provider.create_subnet(vpc, cidr)).await?;
            created.push(Created::Subnet(subnet_id.clone()));

            let public = index < plan.public_count;
            if public {
                let id = subnet_id.as_str();
                retry
                    .run(move || provider.set_map_public_ip_on_launch(id, true))
                    .await?;
            }
            debug!("Created {} subnet {} ({})", if public { "public" } else { "private" }, subnet_id, subnet_cidr);

            subnets.push(SubnetRecord {
                subnet_id,
                cidr: subnet_cidr,
                public,
                tags: plan.subnet_tags.get(&index).cloned().unwrap_or_default(),
            });
        }

        let public_rt = retry.run(move || provider.create_route_table(vpc)).await?;
        created.push(Created::RouteTable(public_rt.clone()));
        let rt = public_rt.as_str();
        retry
            .run(move || provider.create_route(rt, DEFAULT_ROUTE, igw))
            .await?;

        let private_rt = retry.run(move || provider.create_route_table(vpc)).await?;
        created.push(Created::RouteTable(private_rt.clone()));
        debug!("Created route tables {} (public) and {} (private)", public_rt, private_rt);

        for subnet in &subnets {
            let rt = if subnet.public { public_rt.as_str() } else { private_rt.as_str() };
            let subnet_id = subnet.subnet_id.as_str();
            let association = retry
                .run(move || provider.associate_route_table(rt, subnet_id))
                .await?;
            created.push(Created::Association(association));
        }

        if !plan.vpc_tags.is_empty() {
            let tags = plan.vpc_tags;
            retry.run(move || provider.tag_resource(vpc, tags)).await?;
        }
        for subnet in subnets.iter().filter(|s| !s.tags.is_empty()) {
            let subnet_id = subnet.subnet_id.as_str();
            let tags = subnet.tags.as_slice();
            retry.run(move || provider.tag_resource(subnet_id, tags)).await?;
        }

        let now = Utc::now();
        Ok(VpcRecord {
            vpc_id,
            cidr: plan.cidr.clone(),
            region: plan.region.to_string(),
            subnets,
            tags: plan.vpc_tags.to_vec(),
            igw: igw_id,
            route_tables: RouteTables {
                public: public_rt,
                private: private_rt,
            },
            created_at: now,
            updated_at: now,
        })
    }

    /// Best-effort reverse-order cleanup; failures are logged, not returned
    async fn teardown(&self, provider: &dyn NetworkProvider, created: Vec<Created>) {
        let total = created.len();
        let mut failed = 0;

        for resource in created.into_iter().rev() {
            let result = match &resource {
                Created::Association(id) => {
                    let id = id.as_str();
                    self.retry.run(move || provider.disassociate_route_table(id)).await
                }
                Created::RouteTable(id) => {
                    let id = id.as_str();
                    self.retry.run(move || provider.delete_route_table(id)).await
                }
                Created::Subnet(id) => {
                    let id = id.as_str();
                    self.retry.run(move || provider.delete_subnet(id)).await
                }
                Created::GatewayAttachment { igw_id, vpc_id } => {
                    let (igw, vpc) = (igw_id.as_str(), vpc_id.as_str());
                    self.retry
                        .run(move || provider.detach_internet_gateway(igw, vpc))
                        .await
                }
                Created::InternetGateway(id) => {
                    let id = id.as_str();
                    self.retry.run(move || provider.delete_internet_gateway(id)).await
                }
                Created::Vpc(id) => {
                    let id = id.as_str();
                    self.retry.run(move || provider.delete_vpc(id)).await
                }
            };

            match result {
                Ok(()) => debug!("Cleaned up {:?}", resource),
                Err(e) if e.is_not_found() => debug!("{:?} already gone", resource),
                Err(e) => {
                    failed += 1;
                    warn!("Cleanup of {:?} failed: {}", resource, e);
                }
            }
        }

        if failed > 0 {
            warn!("Cleanup left {} of {} resources behind", failed, total);
        } else {
            info!("Cleaned up {} resources", total);
        }
    }

    /// Run a delete call; a resource that is already gone counts as deleted
    async fn remove<F, Fut>(&self, call: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ProviderResult<()>>,
    {
        match self.retry.run(call).await {
            Err(e) if e.is_not_found() => {
                debug!("{} skipped: {}", e.operation, e.message);
                Ok(())
            }
            result => result.map_err(|e| {
                error!("Delete step failed, record kept for retry: {}", e);
                e.into()
            }),
        }
    }
}

fn plan_create(request: &CreateVpcRequest) -> Result<CreatePlan<'_>> {
    request.validate()?;

    let count = usize::try_from(request.subnet_count)
        .map_err(|_| VpcError::InvalidInput(format!("invalid subnet count {}", request.subnet_count)))?;
    if count > MAX_SUBNETS {
        return Err(VpcError::InvalidInput(format!(
            "subnet count {} exceeds the limit of {} per VPC",
            count, MAX_SUBNETS
        )));
    }
    let base = parse_ipv4_cidr(&request.vpc_cidr)?;
    let subnets = partition(base, count)?;

    let public_count = usize::try_from(request.resolved_public_subnet_count()).map_err(|_| {
        VpcError::InvalidInput("public_subnet_count must not be negative".to_string())
    })?;

    Ok(CreatePlan {
        cidr: base.to_string(),
        region: request.region.trim(),
        subnets,
        public_count,
        vpc_tags: request.vpc_tags.as_deref().unwrap_or_default(),
        subnet_tags: subnet_tag_assignments(request.subnet_tags.as_deref().unwrap_or_default(), count),
    })
}

/// Map positional subnet tags to subnet indexes
///
/// Tag `i` goes to subnet `i`; subnets past the end of the list get none and
/// tags past the last subnet are dropped.
fn subnet_tag_assignments(tags: &[Tag], subnet_count: usize) -> BTreeMap<usize, Vec<Tag>> {
    if tags.len() > subnet_count {
        warn!(
            "{} subnet tags given for {} subnets, ignoring the rest",
            tags.len(),
            subnet_count
        );
    }

    tags.iter()
        .take(subnet_count)
        .enumerate()
        .map(|(index, tag)| (index, vec![tag.clone()]))
        .collect()
}
