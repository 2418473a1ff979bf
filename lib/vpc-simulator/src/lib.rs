//! In-process network provider
//!
//! Simulates a regional network provisioning API for tests and offline use:
//! - Resource maps per region with the provider's referential constraints
//! - Fault injection per provider operation
//! - JSON snapshots so state survives between processes
pub mod cloud;
pub mod error;
pub mod state;

pub use cloud::{RegionalProvider, SimulatedCloud};
pub use error::SimulatorError;
pub use state::RegionState;
