//! Snooping cache-coherence protocol engine: per-block MSI / MESI / MOSI /
//! MOESI controllers sharing one calling convention, plus the in-order bus
//! harness that drives them.

pub mod bus;
pub mod cache;
pub mod commons;
pub mod error;
pub mod protocol;
pub mod sim;
pub mod stats;

pub use bus::{BusOps, SystemBus};
pub use cache::CacheModule;
pub use commons::{Addr, BusSignal, CacheId, ProcSignal, ProtocolKind, SystemSpec};
pub use error::{ProtocolError, Result};
pub use protocol::Protocol;
pub use sim::System;
pub use stats::Stats;
