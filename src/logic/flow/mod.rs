//! Flow Module
//!
//! Server-side flow tracking.
//!
//! ## Structure
//! - `key`: canonical, direction-agnostic FlowKey
//! - `packet`: packet descriptors and TCP flags
//! - `aggregator`: flow table and per-update feature derivation
//! - `eviction`: idle-flow sweep task

pub mod key;
pub mod packet;
pub mod aggregator;
pub mod eviction;


pub use key::{Endpoint, FlowKey, FlowKeyParseError};
pub use packet::{PacketDescriptor, TcpFlag, TcpFlags};
pub use aggregator::{FlowAggregator, FlowRecord, MIN_FLOW_DURATION};
pub use eviction::spawn_sweeper;
