use thiserror::Error;

use crate::commons::{BusSignal, CacheId, ProcSignal};

/// A coherence invariant was broken. There is nothing to recover inside the
/// engine: every reachable (state, message) pair is handled explicitly, so
/// hitting one of these means a bug in the engine or a bus-ordering guarantee
/// failure upstream. The driver decides how to report it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{protocol}: local {access:?} while {state} has a transaction outstanding")]
    AccessWhileOutstanding {
        protocol: &'static str,
        state: &'static str,
        access: ProcSignal,
    },

    #[error("{protocol}: {state} state must not see {signal:?} from cache {requester}")]
    UnexpectedSnoop {
        protocol: &'static str,
        state: &'static str,
        signal: BusSignal,
        requester: CacheId,
    },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
