//! nova26: the distributed P2P data and agent-coordination core. Re-exports
//! the [`nova_facade::Facade`] as the single entry point an embedding host
//! needs; the individual `nova-hypercore`/`nova-a2a`/`nova-config` crates
//! remain usable directly for callers who want finer-grained control.

pub use nova_a2a as a2a;
pub use nova_config as config;
pub use nova_facade::{A2ALayer, Facade, NovaCore};
pub use nova_hypercore as hypercore;
