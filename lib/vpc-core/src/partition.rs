//! Splitting a VPC block into equal-sized subnets
//!
//! For `n` subnets the prefix grows by the smallest `k` with `2^k >= n`, and
//! the first `n` blocks of that size are taken in increasing address order.
//! The remaining `2^k - n` blocks are left unallocated.

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Longest IPv4 prefix
pub const MAX_PREFIX: u8 = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Invalid CIDR {cidr}: {reason}")]
    Malformed { cidr: String, reason: String },

    #[error("Invalid CIDR {cidr}: host bits are set, expected {network}")]
    HostBitsSet { cidr: String, network: String },

    #[error("Subnet count must be positive")]
    ZeroSubnets,

    #[error("No room for {count} subnets in {cidr}")]
    NoRoom { cidr: String, count: usize },
}

/// Parse an IPv4 block in `address/prefix` notation.
///
/// The prefix is required and the address must be the network address.
pub fn parse_ipv4_cidr(cidr: &str) -> Result<Ipv4Network, PartitionError> {
    let cidr = cidr.trim();
    if !cidr.contains('/') {
        return Err(PartitionError::Malformed {
            cidr: cidr.to_string(),
            reason: "missing prefix length".to_string(),
        });
    }

    let network: Ipv4Network = cidr.parse().map_err(|e| PartitionError::Malformed {
        cidr: cidr.to_string(),
        reason: format!("{}", e),
    })?;

    if network.ip() != network.network() {
        return Err(PartitionError::HostBitsSet {
            cidr: cidr.to_string(),
            network: format!("{}/{}", network.network(), network.prefix()),
        });
    }

    Ok(network)
}

/// Prefix length of each subnet when splitting a `/base_prefix` block `count` ways
pub fn subnet_prefix(base_prefix: u8, count: usize) -> Result<u8, PartitionError> {
    if count == 0 {
        return Err(PartitionError::ZeroSubnets);
    }

    let no_room = || PartitionError::NoRoom {
        cidr: format!("/{}", base_prefix),
        count,
    };

    let extra_bits = count
        .checked_next_power_of_two()
        .ok_or_else(no_room)?
        .trailing_zeros();
    let prefix = u32::from(base_prefix) + extra_bits;
    if prefix > u32::from(MAX_PREFIX) {
        return Err(no_room());
    }

    Ok(prefix as u8)
}

/// Split `base` into `count` contiguous subnets of equal size
pub fn partition(base: Ipv4Network, count: usize) -> Result<Vec<Ipv4Network>, PartitionError> {
    let prefix = subnet_prefix(base.prefix(), count).map_err(|e| match e {
        PartitionError::NoRoom { count, .. } => PartitionError::NoRoom {
            cidr: base.to_string(),
            count,
        },
        other => other,
    })?;

    let start = u64::from(u32::from(base.network()));
    let step = 1u64 << (MAX_PREFIX - prefix);

    (0..count as u64)
        .map(|i| {
            let addr = Ipv4Addr::from((start + i * step) as u32);
            Ipv4Network::new(addr, prefix).map_err(|e| PartitionError::Malformed {
                cidr: format!("{}/{}", addr, prefix),
                reason: format!("{}", e),
            })
        })
        .collect()
}

/// Parse `cidr` and split it into `count` subnets
pub fn partition_cidr(cidr: &str, count: usize) -> Result<Vec<Ipv4Network>, PartitionError> {
    let base = parse_ipv4_cidr(cidr)?;
    partition(base, count)
}
