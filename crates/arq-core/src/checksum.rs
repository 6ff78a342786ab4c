//! Additive corruption check over a packet's fields.
//!
//! This is a heuristic against accidental damage, not authentication: two
//! compensating changes go unnoticed.

use arq_abstract::Packet;

/// `seq + ack + Σ payload bytes`, wrapping on overflow.
pub fn compute(seq: i32, ack: i32, payload: &[u8]) -> i32 {
    payload
        .iter()
        .fold(seq.wrapping_add(ack), |sum, &byte| sum.wrapping_add(i32::from(byte)))
}

/// Recompute the checksum and compare it with the one carried by `packet`.
pub fn validate(packet: &Packet) -> bool {
    compute(packet.seq, packet.ack, &packet.payload) == packet.checksum
}
