#![deny(missing_docs)]
//! Tiered block service API: the block type and the traits of the tiers a
//! block can be retrieved from (local store, edge network, exchange
//! network) along with the basic types required to define them.
//!
//! If you want to use the block service itself, please see the tbs_core
//! crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub use tokio_util::sync::CancellationToken;

mod block;
pub use block::*;

pub mod builder;
pub use builder::Builder;

pub mod config;
pub use config::*;

pub mod edge;
pub use edge::*;

mod error;
pub use error::*;

pub mod exchange;
pub use exchange::*;

pub mod policy;
pub use policy::*;

pub mod store;
pub use store::*;

pub mod validate;
pub use validate::*;
