//! parse_result
//!
//! The outcome a connection handler hands back to the reactor loop after
//! a packet is read and dispatched, so a bad or unexpected packet never
//! has to unwind the loop through a panic or a propagated error.

/// What the reactor loop should do after a packet has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketParseResult {
    /// The packet was handled (or intentionally ignored); keep reading.
    Pass,
    /// The packet was malformed or out of order for the connection's
    /// current state; drop it and keep the connection open.
    Block,
    /// The connection is no longer trustworthy (bad proof, protocol
    /// violation, rate limit exceeded); tear it down.
    Disconnect,
}

impl PacketParseResult {
    /// Whether the connection should be torn down.
    pub fn is_disconnect(self) -> bool {
        matches!(self, PacketParseResult::Disconnect)
    }
}
