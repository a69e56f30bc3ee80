//! Network topology: endpoints, the shared routing registry, and the
//! refresher that reconciles it against an authoritative mirror source.

pub mod endpoint;
pub mod registry;
pub mod topology;

pub use endpoint::{Endpoint, HostAddr, NodeRecord};
pub use registry::{EndpointRegistry, RoutingTable};
pub use topology::{MirrorError, MirrorSource, RefreshResult, TopologyRefresher};
