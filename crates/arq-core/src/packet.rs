use arq_abstract::{MAX_PAYLOAD_LEN, NO_ACK, NO_SEQ, Packet, ProtocolError};

use crate::checksum;

/// A data packet for `seq` with a valid checksum.
pub fn data_packet(seq: i32, payload: &[u8]) -> Packet {
    Packet::new(
        seq,
        NO_ACK,
        checksum::compute(seq, NO_ACK, payload),
        payload.to_vec(),
    )
}

/// A pure acknowledgment of `ack` with a valid checksum.
pub fn ack_packet(ack: i32) -> Packet {
    Packet::new(NO_SEQ, ack, checksum::compute(NO_SEQ, ack, &[]), Vec::new())
}

/// Reject application messages that don't fit in one packet.
pub fn check_payload(data: &[u8]) -> Result<(), ProtocolError> {
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: data.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}
