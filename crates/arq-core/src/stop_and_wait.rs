//! Stop-and-Wait: one packet in flight, alternating over a small sequence
//! range. The sender drops application data while it waits for an ACK.

use arq_abstract::{ArqConfig, ConfigError, Packet, ProtocolError, SystemContext, TransportProtocol};

use crate::checksum;
use crate::packet::{ack_packet, check_payload, data_packet};
use crate::sequence::SequenceSpace;

pub struct StopAndWaitSender {
    space: SequenceSpace,
    timeout_ms: u64,
    current_seq: i32,
    busy: bool,
    pending: Option<Packet>,
    retransmissions: u64,
}

impl StopAndWaitSender {
    pub fn new(config: &ArqConfig) -> Result<Self, ConfigError> {
        let space = SequenceSpace::from_config(config)?;
        Ok(Self {
            space,
            timeout_ms: config.timeout_ms,
            current_seq: space.min(),
            busy: false,
            pending: None,
            retransmissions: 0,
        })
    }

    pub fn current_seq(&self) -> i32 {
        self.current_seq
    }

    /// True while a packet is outstanding and the timer runs.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn pending(&self) -> Option<&Packet> {
        self.pending.as_ref()
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }
}

impl TransportProtocol for StopAndWaitSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log(&format!(
            "SAW sender ready, seq range [{}, {}]",
            self.space.min(),
            self.space.max()
        ));
    }

    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        data: &[u8],
    ) -> Result<(), ProtocolError> {
        if self.busy {
            ctx.log(&format!(
                "SAW sender busy with seq {}, dropping {} bytes",
                self.current_seq,
                data.len()
            ));
            return Ok(());
        }
        check_payload(data)?;

        let packet = data_packet(self.current_seq, data);
        ctx.log(&format!(
            "SAW send seq={} ({} bytes)",
            packet.seq,
            packet.len()
        ));
        ctx.send_packet(packet.clone());
        ctx.start_timer(self.timeout_ms);
        self.pending = Some(packet);
        self.busy = true;
        ctx.record_metric("in_flight", 1.0);
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !checksum::validate(&packet) {
            ctx.log("SAW sender ignoring corrupted ACK");
            return;
        }
        if !self.busy || packet.ack != self.current_seq {
            ctx.log(&format!(
                "SAW sender ignoring ACK {} (waiting={}, seq={})",
                packet.ack, self.busy, self.current_seq
            ));
            return;
        }

        ctx.log(&format!("SAW received ACK {}", packet.ack));
        ctx.stop_timer();
        self.current_seq = self.space.increment(self.current_seq);
        self.busy = false;
        ctx.record_metric("in_flight", 0.0);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        if !self.busy {
            ctx.log("SAW sender timer fired while idle");
            return;
        }
        if let Some(packet) = &self.pending {
            ctx.log(&format!("SAW timeout, retransmitting seq {}", packet.seq));
            ctx.send_packet(packet.clone());
            ctx.start_timer(self.timeout_ms);
            self.retransmissions += 1;
            ctx.record_metric("retransmissions", self.retransmissions as f64);
        }
    }
}

pub struct StopAndWaitReceiver {
    space: SequenceSpace,
    expected: i32,
}

impl StopAndWaitReceiver {
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

    fn send_ack(&self, ctx: &mut dyn SystemContext, seq: i32) {
        ctx.log(&format!("SAW send ACK {seq}"));
        ctx.send_packet(ack_packet(seq));
    }
}

impl TransportProtocol for StopAndWaitReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log("SAW receiver ready");
    }

    fn on_app_data(
        &mut self,
        _ctx: &mut dyn SystemContext,
        _data: &[u8],
    ) -> Result<(), ProtocolError> {
        // Receiver doesn't send app data
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        // Corruption is treated as loss: no ACK, the sender times out.
        if !checksum::validate(&packet) {
            ctx.log(&format!("SAW receiver dropping corrupted seq {}", packet.seq));
            return;
        }

        if packet.seq == self.expected {
            ctx.log(&format!(
                "SAW received seq {} ({} bytes)",
                packet.seq,
                packet.len()
            ));
            ctx.deliver_data(&packet.payload);
            self.send_ack(ctx, packet.seq);
            self.expected = self.space.increment(self.expected);
        } else if packet.seq == self.space.previous(self.expected) {
            ctx.log(&format!("SAW duplicate seq {}, re-ACK", packet.seq));
            self.send_ack(ctx, packet.seq);
        } else {
            ctx.log(&format!(
                "SAW receiver ignoring seq {} (expect {})",
                packet.seq, self.expected
            ));
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {
        // Receiver has no timers
    }
}
