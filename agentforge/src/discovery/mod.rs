//! Fault-tolerant discovery of optional external configuration.
//!
//! Nothing in this module returns an error: read, parse and schema problems
//! are collected on the result and the probe moves on.

mod probe;
mod workspace;

pub use probe::{
    default_locations, discover, DiscoveredItem, DiscoveryError, DiscoveryErrorKind,
    DiscoveryProbe, DiscoveryResult, FsReader, Location, LocationReader, REGISTRY_KEYS,
};
pub use workspace::{probe_workspace, WorkspaceContext};
