//! Go-Back-N: up to `window_size` packets in flight, cumulative ACKs, and a
//! single timer guarding the oldest unacknowledged packet.
//!
//! # Sender layout
//!
//! ```text
//!  base        window end       next
//!   │ <- sent -> │ <- buffered -> │
//! ──┼────────────┼────────────────┼──────▶ seq space (cyclic)
//! ```
//!
//! The ring `buffer` has one slot per sequence number. Occupied slots are
//! exactly `[base, next)`; only the first `window_size` of them have been
//! put on the wire.

use arq_abstract::{
    ArqConfig, ConfigError, Packet, ProtocolError, ProtocolKind, SystemContext, TransportProtocol,
};
use tracing::warn;

use crate::checksum;
use crate::packet::{ack_packet, check_payload, data_packet};
use crate::sequence::SequenceSpace;

pub struct GoBackNSender {
    space: SequenceSpace,
    window_size: usize,
    timeout_ms: u64,
    /// Oldest unacknowledged sequence number.
    base: i32,
    /// Sequence number the next message will get.
    next: i32,
    highest_ack: Option<i32>,
    buffer: Vec<Option<Packet>>,
    terminated: bool,
    retransmissions: u64,
}

impl GoBackNSender {
    pub fn new(config: &ArqConfig) -> Result<Self, ConfigError> {
        config.validate(ProtocolKind::GoBackN)?;
        let space = SequenceSpace::from_config(config)?;
        Ok(Self {
            space,
            window_size: config.window_size,
            timeout_ms: config.timeout_ms,
            base: space.min(),
            next: space.min(),
            highest_ack: None,
            buffer: vec![None; space.len()],
            terminated: false,
            retransmissions: 0,
        })
    }

    pub fn base(&self) -> i32 {
        self.base
    }

    pub fn next(&self) -> i32 {
        self.next
    }

    pub fn highest_ack(&self) -> Option<i32> {
        self.highest_ack
    }

    /// Packets buffered and not yet acknowledged, sent or not.
    pub fn outstanding(&self) -> usize {
        self.space.distance(self.base, self.next)
    }

    /// Packets put on the wire and not yet acknowledged. Never above the window.
    pub fn in_flight(&self) -> usize {
        self.outstanding().min(self.window_size)
    }

    /// How many packets can be outstanding before `output` overflows.
    pub fn capacity(&self) -> usize {
        self.space.len() - 1
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// `ack` names a packet that was sent and is still unacknowledged.
    fn acknowledges_in_flight(&self, ack: i32) -> bool {
        self.space.in_window(ack, self.base, self.window_size)
            && self.space.distance(self.base, ack) < self.in_flight()
    }

    fn send_slot(&self, ctx: &mut dyn SystemContext, seq: i32) {
        if let Some(packet) = &self.buffer[self.space.slot(seq)] {
            ctx.send_packet(packet.clone());
        }
    }

    fn record_window(&self, ctx: &mut dyn SystemContext) {
        ctx.record_metric("in_flight", self.in_flight() as f64);
        ctx.record_metric("outstanding", self.outstanding() as f64);
    }
}

impl TransportProtocol for GoBackNSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log(&format!(
            "GBN sender ready, window {} over [{}, {}]",
            self.window_size,
            self.space.min(),
            self.space.max()
        ));
    }

    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        data: &[u8],
    ) -> Result<(), ProtocolError> {
        if self.terminated {
            return Err(ProtocolError::SenderTerminated);
        }
        check_payload(data)?;

        let seq = self.next;
        let packet = data_packet(seq, data);
        if self.space.in_window(seq, self.base, self.window_size) {
            ctx.log(&format!("GBN send seq={} ({} bytes)", seq, packet.len()));
            ctx.send_packet(packet.clone());
            if seq == self.base {
                ctx.start_timer(self.timeout_ms);
            }
        } else {
            ctx.log(&format!("GBN window full, buffering seq={seq}"));
        }
        self.buffer[self.space.slot(seq)] = Some(packet);
        self.next = self.space.increment(seq);

        if self.next == self.base {
            self.terminated = true;
            let capacity = self.capacity();
            warn!(capacity, "go-back-n send buffer overflow");
            ctx.log(&format!("GBN buffer capacity of {capacity} exceeded, stopping"));
            return Err(ProtocolError::BufferOverflow { capacity });
        }
        self.record_window(ctx);
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if self.terminated {
            return;
        }
        if !checksum::validate(&packet) {
            ctx.log("GBN sender ignoring corrupted ACK");
            return;
        }
        let ack = packet.ack;
        if !self.acknowledges_in_flight(ack) {
            ctx.log(&format!(
                "GBN sender ignoring ACK {} outside [{}, +{})",
                ack,
                self.base,
                self.in_flight()
            ));
            return;
        }

        let unsent = self.space.advance(self.base, self.in_flight());
        let new_base = self.space.increment(ack);
        while self.base != new_base {
            self.buffer[self.space.slot(self.base)] = None;
            self.base = self.space.increment(self.base);
        }
        self.highest_ack = Some(ack);
        ctx.log(&format!("GBN received ACK {ack}, base -> {}", self.base));
        ctx.stop_timer();

        // Release buffered packets the slide brought into the window.
        let mut seq = unsent;
        while seq != self.next && self.space.in_window(seq, self.base, self.window_size) {
            ctx.log(&format!("GBN releasing buffered seq={seq}"));
            self.send_slot(ctx, seq);
            seq = self.space.increment(seq);
        }

        if self.base != self.next {
            ctx.start_timer(self.timeout_ms);
        }
        self.record_window(ctx);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        if self.terminated {
            return;
        }
        let count = self.in_flight();
        if count == 0 {
            ctx.log("GBN sender timer fired with nothing in flight");
            return;
        }

        ctx.log(&format!(
            "GBN timeout, resending {} packets from seq {}",
            count, self.base
        ));
        for offset in 0..count {
            self.send_slot(ctx, self.space.advance(self.base, offset));
        }
        ctx.start_timer(self.timeout_ms);
        self.retransmissions += count as u64;
        ctx.record_metric("retransmissions", self.retransmissions as f64);
    }
}

pub struct GoBackNReceiver {
    space: SequenceSpace,
    expected: i32,
}

impl GoBackNReceiver {
    pub fn new(config: &ArqConfig) -> Result<Self, ConfigError> {
        let space = SequenceSpace::from_config(config)?;
        Ok(Self {
            space,
            expected: space.min(),
        })
    }

    pub fn expected(&self) -> i32 {
        self.expected
    }
}

impl TransportProtocol for GoBackNReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log("GBN receiver ready");
    }

    fn on_app_data(
        &mut self,
        _ctx: &mut dyn SystemContext,
        _data: &[u8],
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !checksum::validate(&packet) {
            ctx.log(&format!("GBN receiver dropping corrupted seq {}", packet.seq));
            return;
        }

        let ack = if packet.seq == self.expected {
            ctx.log(&format!(
                "GBN received seq {} ({} bytes)",
                packet.seq,
                packet.len()
            ));
            ctx.deliver_data(&packet.payload);
            self.expected = self.space.increment(self.expected);
            packet.seq
        } else {
            // Out of order or already delivered: repeat the cumulative ACK.
            let last_good = self.space.previous(self.expected);
            ctx.log(&format!(
                "GBN unexpected seq {} (expect {}), re-ACK {}",
                packet.seq, self.expected, last_good
            ));
            last_good
        };
        ctx.send_packet(ack_packet(ack));
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}
}
