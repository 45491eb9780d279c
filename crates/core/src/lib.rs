#![deny(missing_docs)]
//! Tiered content-addressed block service.
//!
//! Blocks are looked up in the local store first, then on the HTTP edge
//! network, then on the peer exchange network, as selected per request
//! by a [LoadPolicy](tbs_api::LoadPolicy). See [BlockService].

use tbs_api::{builder::Builder, config::Config, HashSecurity};

/// Construct a production-ready default builder.
///
/// - `validator` - The default validator is [HashSecurity].
/// - `edge` - The default edge module is [factories::CoreEdgeFactory].
pub fn default_builder() -> Builder {
    Builder {
        config: Config::default(),
        validator: HashSecurity::create(),
        edge: factories::CoreEdgeFactory::create(),
    }
}

mod common;

pub mod factories;

pub mod fetcher;
pub use fetcher::{DynFetcherFactory, FetcherFactory, NotifyingFetcher};

pub mod pipeline;

mod service;
pub use service::*;

mod tier;
