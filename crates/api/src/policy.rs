//! Load policies and the per-request context carrying them.

use crate::*;
use tokio_util::sync::CancellationToken;

/// A source a block can be retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// The local [crate::BlockStore].
    Local,

    /// The HTTP edge network, see [crate::EdgeFetcher].
    Edge,

    /// The peer exchange network, see [crate::Exchange].
    Exchange,
}

impl Tier {
    /// Whether a block retrieved from this tier is written to the local
    /// store (and announced to the exchange) before it is returned.
    ///
    /// Only exchange hits are cached. Edge hits are returned without
    /// touching the local store, so a block served by the edge will be
    /// fetched from the edge again on the next lookup.
    pub fn writes_back(self) -> bool {
        match self {
            Self::Local | Self::Edge => false,
            Self::Exchange => true,
        }
    }
}

/// Selects which tiers participate in a lookup and in what order.
///
/// The raw `u8` encoding is the declaration order, starting at zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadPolicy {
    /// local > edge > exchange.
    #[default]
    LocalEdgeExchange,

    /// local > edge.
    LocalEdge,

    /// local > exchange.
    LocalExchange,

    /// local store only.
    LocalOnly,

    /// edge network only.
    EdgeOnly,

    /// exchange network only.
    ExchangeOnly,
}

impl LoadPolicy {
    /// Every policy, in raw encoding order.
    pub const ALL: [LoadPolicy; 6] = [
        LoadPolicy::LocalEdgeExchange,
        LoadPolicy::LocalEdge,
        LoadPolicy::LocalExchange,
        LoadPolicy::LocalOnly,
        LoadPolicy::EdgeOnly,
        LoadPolicy::ExchangeOnly,
    ];

    /// The tiers this policy consults, in order.
    pub fn tiers(self) -> &'static [Tier] {
        match self {
            Self::LocalEdgeExchange => {
                &[Tier::Local, Tier::Edge, Tier::Exchange]
            }
            Self::LocalEdge => &[Tier::Local, Tier::Edge],
            Self::LocalExchange => &[Tier::Local, Tier::Exchange],
            Self::LocalOnly => &[Tier::Local],
            Self::EdgeOnly => &[Tier::Edge],
            Self::ExchangeOnly => &[Tier::Exchange],
        }
    }

    /// Does this policy consult the local store?
    pub fn includes_local(self) -> bool {
        self.tiers().contains(&Tier::Local)
    }

    /// Does this policy consult the edge network?
    pub fn includes_edge(self) -> bool {
        self.tiers().contains(&Tier::Edge)
    }

    /// Does this policy consult the exchange network?
    pub fn includes_exchange(self) -> bool {
        self.tiers().contains(&Tier::Exchange)
    }
}

impl From<LoadPolicy> for u8 {
    fn from(value: LoadPolicy) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for LoadPolicy {
    type Error = TbsError;

    fn try_from(value: u8) -> TbsResult<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(TbsError::UnknownLoadPolicy(value))
    }
}

/// Per-request parameters threaded through every lookup.
///
/// This is the single place the default load policy is decided: a
/// context built with [RequestContext::default] or from an absent raw
/// policy uses [LoadPolicy::LocalEdgeExchange].
#[derive(Debug, Default, Clone)]
pub struct RequestContext {
    /// The tiers to consult.
    pub policy: LoadPolicy,

    /// Cancels every suspension point of the request when triggered.
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// A context using the given policy and a fresh cancellation token.
    pub fn with_policy(policy: LoadPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a context from an optional raw policy value, as received from
    /// an out-of-band per-call selector.
    ///
    /// `None` selects the default policy, an unknown value is an error.
    pub fn from_raw_policy(raw: Option<u8>) -> TbsResult<Self> {
        let policy = match raw {
            None => LoadPolicy::default(),
            Some(raw) => LoadPolicy::try_from(raw)?,
        };
        Ok(Self::with_policy(policy))
    }

    /// A context sharing this policy, cancelled whenever this one is.
    pub fn child(&self) -> Self {
        Self {
            policy: self.policy,
            cancel: self.cancel.child_token(),
        }
    }
}
