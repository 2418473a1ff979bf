//! Resource state of one simulated region
//!
//! Constraints mirror the provider: parents cannot be deleted while children
//! reference them, a gateway attaches to one VPC at a time, and a subnet has at
//! most one route table association.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use vpc_api::Tag;
use vpc_core::provider::{Operation, ProviderError, ProviderErrorKind, ProviderResult};

pub type TagMap = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcResource {
    pub cidr: String,
    #[serde(default)]
    pub tags: TagMap,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResource {
    pub attached_to: Option<String>,
    #[serde(default)]
    pub tags: TagMap,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetResource {
    pub vpc_id: String,
    pub cidr: String,
    #[serde(default)]
    pub map_public_ip_on_launch: bool,
    #[serde(default)]
    pub tags: TagMap,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: String,
    pub gateway_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableResource {
    pub vpc_id: String,
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Association id to subnet id
    #[serde(default)]
    pub associations: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: TagMap,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionState {
    pub vpcs: BTreeMap<String, VpcResource>,
    pub gateways: BTreeMap<String, GatewayResource>,
    pub subnets: BTreeMap<String, SubnetResource>,
    pub route_tables: BTreeMap<String, RouteTableResource>,
}

/// Provider-style id: prefix plus 17 hex digits
fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..17])
}

fn parse_network(operation: Operation, cidr: &str) -> ProviderResult<Ipv4Network> {
    cidr.parse().map_err(|e| {
        ProviderError::new(
            operation,
            ProviderErrorKind::InvalidParameter,
            format!("invalid CIDR {}: {}", cidr, e),
        )
    })
}

fn overlaps(a: Ipv4Network, b: Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

fn dependency(operation: Operation, message: String) -> ProviderError {
    ProviderError::new(operation, ProviderErrorKind::DependencyViolation, message)
}

impl RegionState {
    /// Number of live resources of any kind
    pub fn resource_count(&self) -> usize {
        self.vpcs.len() + self.gateways.len() + self.subnets.len() + self.route_tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_count() == 0
    }

    /// Tags on any resource, sorted by key
    pub fn tags_of(&self, resource_id: &str) -> Option<Vec<Tag>> {
        let tags = self
            .vpcs
            .get(resource_id)
            .map(|r| &r.tags)
            .or_else(|| self.gateways.get(resource_id).map(|r| &r.tags))
            .or_else(|| self.subnets.get(resource_id).map(|r| &r.tags))
            .or_else(|| self.route_tables.get(resource_id).map(|r| &r.tags))?;
        Some(tags.iter().map(|(k, v)| Tag::new(k, v)).collect())
    }

    /// Route table currently associated with a subnet
    pub fn route_table_for(&self, subnet_id: &str) -> Option<&str> {
        self.route_tables
            .iter()
            .find(|(_, rt)| rt.associations.values().any(|s| s == subnet_id))
            .map(|(id, _)| id.as_str())
    }

    fn tags_mut(&mut self, resource_id: &str) -> Option<&mut TagMap> {
        if let Some(r) = self.vpcs.get_mut(resource_id) {
            return Some(&mut r.tags);
        }
        if let Some(r) = self.gateways.get_mut(resource_id) {
            return Some(&mut r.tags);
        }
        if let Some(r) = self.subnets.get_mut(resource_id) {
            return Some(&mut r.tags);
        }
        self.route_tables.get_mut(resource_id).map(|r| &mut r.tags)
    }

    pub fn create_vpc(&mut self, cidr: &str) -> ProviderResult<String> {
        let network = parse_network(Operation::CreateVpc, cidr)?;
        let id = new_id("vpc");
        self.vpcs.insert(
            id.clone(),
            VpcResource {
                cidr: network.to_string(),
                tags: TagMap::new(),
            },
        );
        Ok(id)
    }

    pub fn delete_vpc(&mut self, vpc_id: &str) -> ProviderResult<()> {
        let op = Operation::DeleteVpc;
        if !self.vpcs.contains_key(vpc_id) {
            return Err(ProviderError::not_found(op, vpc_id));
        }
        if self.subnets.values().any(|s| s.vpc_id == vpc_id) {
            return Err(dependency(op, format!("{} still has subnets", vpc_id)));
        }
        if self.route_tables.values().any(|rt| rt.vpc_id == vpc_id) {
            return Err(dependency(op, format!("{} still has route tables", vpc_id)));
        }
        if self
            .gateways
            .values()
            .any(|g| g.attached_to.as_deref() == Some(vpc_id))
        {
            return Err(dependency(op, format!("{} has an attached gateway", vpc_id)));
        }
        self.vpcs.remove(vpc_id);
        Ok(())
    }

    pub fn create_internet_gateway(&mut self) -> String {
        let id = new_id("igw");
        self.gateways.insert(id.clone(), GatewayResource::default());
        id
    }

    pub fn attach_internet_gateway(&mut self, igw_id: &str, vpc_id: &str) -> ProviderResult<()> {
        let op = Operation::AttachInternetGateway;
        if !self.vpcs.contains_key(vpc_id) {
            return Err(ProviderError::not_found(op, vpc_id));
        }
        let already_has_gateway = self
            .gateways
            .values()
            .any(|g| g.attached_to.as_deref() == Some(vpc_id));
        let gateway = self
            .gateways
            .get_mut(igw_id)
            .ok_or_else(|| ProviderError::not_found(op, igw_id))?;
        if let Some(current) = &gateway.attached_to {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::InvalidParameter,
                format!("{} is already attached to {}", igw_id, current),
            ));
        }
        if already_has_gateway {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::InvalidParameter,
                format!("{} already has an internet gateway", vpc_id),
            ));
        }
        gateway.attached_to = Some(vpc_id.to_string());
        Ok(())
    }

    pub fn detach_internet_gateway(&mut self, igw_id: &str, vpc_id: &str) -> ProviderResult<()> {
        let op = Operation::DetachInternetGateway;
        let gateway = self
            .gateways
            .get_mut(igw_id)
            .ok_or_else(|| ProviderError::not_found(op, igw_id))?;
        if gateway.attached_to.as_deref() != Some(vpc_id) {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::NotFound,
                format!("{} is not attached to {}", igw_id, vpc_id),
            ));
        }
        gateway.attached_to = None;
        Ok(())
    }

    pub fn delete_internet_gateway(&mut self, igw_id: &str) -> ProviderResult<()> {
        let op = Operation::DeleteInternetGateway;
        let gateway = self
            .gateways
            .get(igw_id)
            .ok_or_else(|| ProviderError::not_found(op, igw_id))?;
        if let Some(vpc_id) = &gateway.attached_to {
            return Err(dependency(op, format!("{} is attached to {}", igw_id, vpc_id)));
        }
        self.gateways.remove(igw_id);
        Ok(())
    }

    pub fn create_subnet(&mut self, vpc_id: &str, cidr: &str) -> ProviderResult<String> {
        let op = Operation::CreateSubnet;
        let vpc = self
            .vpcs
            .get(vpc_id)
            .ok_or_else(|| ProviderError::not_found(op, vpc_id))?;
        let vpc_network = parse_network(op, &vpc.cidr)?;
        let network = parse_network(op, cidr)?;

        if network.prefix() < vpc_network.prefix() || !vpc_network.contains(network.network()) {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::InvalidParameter,
                format!("{} is outside {} ({})", cidr, vpc_id, vpc.cidr),
            ));
        }

        let conflict = self
            .subnets
            .values()
            .filter(|s| s.vpc_id == vpc_id)
            .filter_map(|s| s.cidr.parse::<Ipv4Network>().ok())
            .find(|existing| overlaps(*existing, network));
        if let Some(existing) = conflict {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::InvalidParameter,
                format!("{} conflicts with existing subnet {}", cidr, existing),
            ));
        }

        let id = new_id("subnet");
        self.subnets.insert(
            id.clone(),
            SubnetResource {
                vpc_id: vpc_id.to_string(),
                cidr: network.to_string(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    pub fn set_map_public_ip_on_launch(&mut self, subnet_id: &str, enabled: bool) -> ProviderResult<()> {
        let subnet = self
            .subnets
            .get_mut(subnet_id)
            .ok_or_else(|| ProviderError::not_found(Operation::ModifySubnetAttribute, subnet_id))?;
        subnet.map_public_ip_on_launch = enabled;
        Ok(())
    }

    pub fn delete_subnet(&mut self, subnet_id: &str) -> ProviderResult<()> {
        if self.subnets.remove(subnet_id).is_none() {
            return Err(ProviderError::not_found(Operation::DeleteSubnet, subnet_id));
        }
        for rt in self.route_tables.values_mut() {
            rt.associations.retain(|_, s| s != subnet_id);
        }
        Ok(())
    }

    pub fn create_route_table(&mut self, vpc_id: &str) -> ProviderResult<String> {
        if !self.vpcs.contains_key(vpc_id) {
            return Err(ProviderError::not_found(Operation::CreateRouteTable, vpc_id));
        }
        let id = new_id("rtb");
        self.route_tables.insert(
            id.clone(),
            RouteTableResource {
                vpc_id: vpc_id.to_string(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    pub fn create_route(
        &mut self,
        route_table_id: &str,
        destination_cidr: &str,
        gateway_id: &str,
    ) -> ProviderResult<()> {
        let op = Operation::CreateRoute;
        parse_network(op, destination_cidr)?;
        if !self.gateways.contains_key(gateway_id) {
            return Err(ProviderError::not_found(op, gateway_id));
        }
        let rt = self
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| ProviderError::not_found(op, route_table_id))?;
        if rt.routes.iter().any(|r| r.destination == destination_cidr) {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::InvalidParameter,
                format!("route to {} already exists in {}", destination_cidr, route_table_id),
            ));
        }
        rt.routes.push(Route {
            destination: destination_cidr.to_string(),
            gateway_id: gateway_id.to_string(),
        });
        Ok(())
    }

    pub fn associate_route_table(&mut self, route_table_id: &str, subnet_id: &str) -> ProviderResult<String> {
        let op = Operation::AssociateRouteTable;
        if !self.subnets.contains_key(subnet_id) {
            return Err(ProviderError::not_found(op, subnet_id));
        }
        if let Some(current) = self.route_table_for(subnet_id) {
            return Err(ProviderError::new(
                op,
                ProviderErrorKind::InvalidParameter,
                format!("{} is already associated with {}", subnet_id, current),
            ));
        }
        let rt = self
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| ProviderError::not_found(op, route_table_id))?;
        let id = new_id("rtbassoc");
        rt.associations.insert(id.clone(), subnet_id.to_string());
        Ok(id)
    }

    pub fn disassociate_route_table(&mut self, association_id: &str) -> ProviderResult<()> {
        let removed = self
            .route_tables
            .values_mut()
            .any(|rt| rt.associations.remove(association_id).is_some());
        if !removed {
            return Err(ProviderError::not_found(
                Operation::DisassociateRouteTable,
                association_id,
            ));
        }
        Ok(())
    }

    pub fn delete_route_table(&mut self, route_table_id: &str) -> ProviderResult<()> {
        let op = Operation::DeleteRouteTable;
        let rt = self
            .route_tables
            .get(route_table_id)
            .ok_or_else(|| ProviderError::not_found(op, route_table_id))?;
        if !rt.associations.is_empty() {
            return Err(dependency(
                op,
                format!("{} has {} associations", route_table_id, rt.associations.len()),
            ));
        }
        self.route_tables.remove(route_table_id);
        Ok(())
    }

    pub fn tag_resource(&mut self, resource_id: &str, tags: &[Tag]) -> ProviderResult<()> {
        let existing = self
            .tags_mut(resource_id)
            .ok_or_else(|| ProviderError::not_found(Operation::CreateTags, resource_id))?;
        for tag in tags {
            existing.insert(tag.key.clone(), tag.value.clone());
        }
        Ok(())
    }

    pub fn untag_resource(&mut self, resource_id: &str, keys: &[String]) -> ProviderResult<()> {
        let existing = self
            .tags_mut(resource_id)
            .ok_or_else(|| ProviderError::not_found(Operation::DeleteTags, resource_id))?;
        for key in keys {
            existing.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind<T: std::fmt::Debug>(result: ProviderResult<T>) -> ProviderErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn test_ids_look_like_provider_ids() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        assert!(vpc.starts_with("vpc-"));
        assert_eq!(vpc.len(), "vpc-".len() + 17);
        assert!(region.create_internet_gateway().starts_with("igw-"));
    }

    #[test]
    fn test_vpc_delete_blocked_by_children() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        let subnet = region.create_subnet(&vpc, "10.0.0.0/24").unwrap();
        let rt = region.create_route_table(&vpc).unwrap();
        let igw = region.create_internet_gateway();
        region.attach_internet_gateway(&igw, &vpc).unwrap();

        assert_eq!(kind(region.delete_vpc(&vpc)), ProviderErrorKind::DependencyViolation);
        region.delete_subnet(&subnet).unwrap();
        assert_eq!(kind(region.delete_vpc(&vpc)), ProviderErrorKind::DependencyViolation);
        region.delete_route_table(&rt).unwrap();
        assert_eq!(kind(region.delete_vpc(&vpc)), ProviderErrorKind::DependencyViolation);
        assert_eq!(
            kind(region.delete_internet_gateway(&igw)),
            ProviderErrorKind::DependencyViolation
        );
        region.detach_internet_gateway(&igw, &vpc).unwrap();
        region.delete_internet_gateway(&igw).unwrap();
        region.delete_vpc(&vpc).unwrap();
        assert!(region.is_empty());
        assert_eq!(kind(region.delete_vpc(&vpc)), ProviderErrorKind::NotFound);
    }

    #[test]
    fn test_subnet_must_fit_and_not_overlap() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        region.create_subnet(&vpc, "10.0.0.0/17").unwrap();

        assert_eq!(
            kind(region.create_subnet(&vpc, "10.0.64.0/18")),
            ProviderErrorKind::InvalidParameter
        );
        assert_eq!(
            kind(region.create_subnet(&vpc, "10.1.0.0/24")),
            ProviderErrorKind::InvalidParameter
        );
        assert_eq!(
            kind(region.create_subnet(&vpc, "10.0.0.0/8")),
            ProviderErrorKind::InvalidParameter
        );
        assert!(region.create_subnet(&vpc, "10.0.128.0/17").is_ok());
    }

    #[test]
    fn test_route_table_associations() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        let subnet = region.create_subnet(&vpc, "10.0.0.0/24").unwrap();
        let public = region.create_route_table(&vpc).unwrap();
        let private = region.create_route_table(&vpc).unwrap();

        let assoc = region.associate_route_table(&public, &subnet).unwrap();
        assert!(assoc.starts_with("rtbassoc-"));
        assert_eq!(region.route_table_for(&subnet), Some(public.as_str()));
        assert_eq!(
            kind(region.associate_route_table(&private, &subnet)),
            ProviderErrorKind::InvalidParameter
        );
        assert_eq!(
            kind(region.delete_route_table(&public)),
            ProviderErrorKind::DependencyViolation
        );

        region.disassociate_route_table(&assoc).unwrap();
        assert_eq!(kind(region.disassociate_route_table(&assoc)), ProviderErrorKind::NotFound);
        region.delete_route_table(&public).unwrap();
    }

    #[test]
    fn test_subnet_delete_drops_association() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        let subnet = region.create_subnet(&vpc, "10.0.0.0/24").unwrap();
        let rt = region.create_route_table(&vpc).unwrap();
        region.associate_route_table(&rt, &subnet).unwrap();

        region.delete_subnet(&subnet).unwrap();
        assert!(region.route_tables[&rt].associations.is_empty());
        region.delete_route_table(&rt).unwrap();
    }

    #[test]
    fn test_tags_overwrite_and_remove() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        region
            .tag_resource(&vpc, &[Tag::new("Name", "a"), Tag::new("Env", "dev")])
            .unwrap();
        region.tag_resource(&vpc, &[Tag::new("Name", "b")]).unwrap();
        region.untag_resource(&vpc, &["Env".to_string()]).unwrap();

        assert_eq!(region.tags_of(&vpc), Some(vec![Tag::new("Name", "b")]));
        assert_eq!(
            kind(region.tag_resource("vpc-missing", &[Tag::new("a", "b")])),
            ProviderErrorKind::NotFound
        );
    }

    #[test]
    fn test_gateway_attachment_rules() {
        let mut region = RegionState::default();
        let vpc = region.create_vpc("10.0.0.0/16").unwrap();
        let igw = region.create_internet_gateway();
        let second = region.create_internet_gateway();

        region.attach_internet_gateway(&igw, &vpc).unwrap();
        assert_eq!(
            kind(region.attach_internet_gateway(&igw, &vpc)),
            ProviderErrorKind::InvalidParameter
        );
        assert_eq!(
            kind(region.attach_internet_gateway(&second, &vpc)),
            ProviderErrorKind::InvalidParameter
        );
        assert_eq!(
            kind(region.detach_internet_gateway(&second, &vpc)),
            ProviderErrorKind::NotFound
        );
    }
}
