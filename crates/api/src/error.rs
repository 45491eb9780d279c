//! Tiered block service error types.

use crate::Cid;
use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The block service error type. Used by every store, exchange and edge
/// api as well as by the tier dispatch internals.
///
/// This type is required to implement `Clone` so that a single failure
/// can be fanned out to multiple waiters (e.g. the scheduler race).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TbsError {
    /// The block is not present in the consulted tier(s).
    ///
    /// This is the only error kind that lets a lookup fall through to
    /// the next tier.
    #[error("block not found: {cid}")]
    NotFound {
        /// The identifier that was looked up.
        cid: Cid,
    },

    /// The identifier was rejected by hash security validation.
    #[error("unsafe cid {cid}: {reason}")]
    InvalidCid {
        /// The rejected identifier.
        cid: Cid,

        /// Why it was rejected.
        reason: Arc<str>,
    },

    /// The exchange tier was required but no exchange is configured.
    #[error("no fetcher available")]
    NoFetcher,

    /// The edge tier was required but no edge client is configured.
    #[error("no edge client configured")]
    NoEdge,

    /// No scheduler answered a discovery request within the bound.
    #[error("discovery timed out after {0:?}")]
    DiscoveryTimeout(std::time::Duration),

    /// An explicit load policy value did not map to a known policy.
    #[error("unknown load level: {0}")]
    UnknownLoadPolicy(u8),

    /// The request was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,

    /// Generic internal error, including store and transport failures.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl TbsError {
    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// Construct a "not found" error for the given identifier.
    pub fn not_found(cid: Cid) -> Self {
        Self::NotFound { cid }
    }

    /// Returns true if this error signals a tier miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The block service result type.
pub type TbsResult<T> = Result<T, TbsError>;

#[cfg(test)]
mod test {
    use super::*;
    use crate::Block;

    #[test]
    fn error_display() {
        assert_eq!(
            "bla (src: None)",
            TbsError::other("bla").to_string().as_str(),
        );
        assert_eq!(
            "foo (src: bar)",
            TbsError::other_src("foo", std::io::Error::other("bar"))
                .to_string()
                .as_str(),
        );
        assert_eq!(
            "unknown load level: 9",
            TbsError::UnknownLoadPolicy(9).to_string().as_str(),
        );
    }

    #[test]
    fn not_found_carries_cid() {
        let block = Block::new(bytes::Bytes::from_static(b"hello"));
        let err = TbsError::not_found(*block.cid());

        assert!(err.is_not_found());
        assert!(!TbsError::NoFetcher.is_not_found());
        assert_eq!(
            format!("block not found: {}", block.cid()),
            err.to_string(),
        );
    }

    #[test]
    fn ensure_error_type_is_send_and_sync() {
        fn ensure<T: std::fmt::Display + Send + Sync>(_t: T) {}
        ensure(TbsError::other("bla"));
    }
}
