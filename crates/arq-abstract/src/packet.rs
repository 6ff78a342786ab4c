use serde::{Deserialize, Serialize};

/// Placeholder carried in `seq` by pure acknowledgments.
pub const NO_SEQ: i32 = -1;

/// Placeholder carried in `ack` by data packets.
pub const NO_ACK: i32 = -1;

/// Largest payload a single packet may carry, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 20;

/// The only record that crosses the channel between sender and receiver.
///
/// The checksum is stored as sent; nothing here recomputes or trusts it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    pub seq: i32,
    pub ack: i32,
    pub checksum: i32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(seq: i32, ack: i32, checksum: i32, payload: Vec<u8>) -> Self {
        Self {
            seq,
            ack,
            checksum,
            payload,
        }
    }

    /// A control packet carries no data, only an acknowledgment.
    pub fn is_ack(&self) -> bool {
        self.seq == NO_SEQ
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
