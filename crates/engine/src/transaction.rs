use crate::NodeId;

/// The single in-flight request.
///
/// A node keeps at most one of these; a new `request_data` while one is
/// pending silently replaces it. The stamp is the transaction's identity
/// on the wire and is refreshed on every retransmission so relay caches do
/// not swallow the retry as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub destination: NodeId,
    pub stamp: u64,
    /// DATA transmissions so far, the initial send included.
    pub attempts: u32,
    /// Monotonic second at or after which the next retransmission fires.
    pub retry_at: u64,
    /// Monotonic second at or after which the route is declared dead.
    pub deadline: u64,
}

/// A finished transaction, handed to the application once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub source: NodeId,
    pub stamp: u64,
    pub payload: String,
}
