//! Factories and reference implementations of the block service modules.

pub mod core_edge;
pub use core_edge::{CoreEdgeFactory, EdgeClient, JsonRpcScheduler};

mod mem_block_store;
pub use mem_block_store::*;

mod mem_edge;
pub use mem_edge::*;

mod mem_exchange;
pub use mem_exchange::*;
