/// Engine counters. Nothing the engine receives is fatal; every dropped
/// frame lands in exactly one of these buckets instead.
///
/// The engine runs behind `&mut self`, so plain integers suffice; hosts
/// that export metrics snapshot the struct from their own context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Frames handed to the radio.
    pub sent_pkts: u64,
    /// Frames taken off the radio, well-formed or not.
    pub received_pkts: u64,
    /// Frames that failed structural parsing.
    pub malformed: u64,
    /// RESP frames addressed here whose integrity check did not match.
    pub check_failed: u64,
    /// Frames rejected by a semantic gate: an RREQ from a non-neighbor
    /// last hop or looping through this node, or an RREP whose route does
    /// not include this node.
    pub gated: u64,
    /// Well-formed RESP frames addressed here with no transaction waiting
    /// for their stamp.
    pub orphan_resp: u64,
    /// Transactions that hit the hard deadline.
    pub timeouts: u64,
    /// Transmissions the radio driver reported as failed.
    pub radio_errors: u64,
}
