use crate::trace::SimulationReport;
use arq_abstract::{Packet, ProtocolError, SimConfig};
use arq_abstract::{SystemContext, TransportProtocol};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { data: Vec<u8> },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerCommand {
    Start(u64),
    Stop,
}

/// Actions buffered during a protocol callback, applied once it returns.
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timer_commands: Vec<TimerCommand>,
    logs: Vec<String>,
    delivered_data: Vec<Vec<u8>>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the protocol
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64) {
        self.buffer.timer_commands.push(TimerCommand::Start(delay_ms));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_commands.push(TimerCommand::Stop);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// The single timer each node owns. Stopping or restarting bumps the
/// generation so expiry events already in the queue are recognised as stale.
#[derive(Debug, Default, Clone, Copy)]
struct NodeTimer {
    generation: u64,
    running: bool,
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub rejected_messages: u32,

    /// Set when the sender reports a fatal error; no further events run.
    pub fatal_error: Option<ProtocolError>,

    /// Arbitrary time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "in_flight"), Value: Vec<(time_ms, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection, each entry consumed by the first match
    drop_sender_seq_once: Vec<i32>,
    corrupt_sender_seq_once: Vec<i32>,
    drop_receiver_ack_once: Vec<i32>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, NodeTimer>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            receiver_packet_count: 0,
            rejected_messages: 0,
            fatal_error: None,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: i32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: i32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: i32) {
        self.drop_receiver_ack_once.push(ack);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Return a slice of (time_ms, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn timer_running(&self, node: NodeId) -> bool {
        self.timers.get(&node).is_some_and(|t| t.running)
    }

    pub fn is_halted(&self) -> bool {
        self.fatal_error.is_some()
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: Vec<u8>) {
        self.push_event(time, EventType::AppSend { data });
    }

    pub fn init(&mut self) {
        for node in [NodeId::Sender, NodeId::Receiver] {
            let mut buffer = ActionBuffer::default();
            {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now: self.time,
                };
                self.node_mut(node).init(&mut ctx);
            }
            self.process_actions(node, buffer);
        }
    }

    fn node_mut(&mut self, node: NodeId) -> &mut dyn TransportProtocol {
        match node {
            NodeId::Sender => self.sender.as_mut(),
            NodeId::Receiver => self.receiver.as_mut(),
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns false once the queue is empty or the run halted.
    pub fn step(&mut self) -> bool {
        if self.is_halted() {
            return false;
        }
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.node_mut(to).on_packet(&mut ctx, packet);
                }
                self.process_actions(to, buffer);
            }
            EventType::TimerExpiry { node, generation } => {
                let timer = self.timers.entry(node).or_default();
                if !timer.running || timer.generation != generation {
                    debug!("Skipping stale timer event for {:?}", node);
                    return true;
                }
                timer.running = false;

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.node_mut(node).on_timer(&mut ctx);
                }
                self.process_actions(node, buffer);
            }
            EventType::AppSend { data } => {
                let mut buffer = ActionBuffer::default();
                let result = {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.sender.on_app_data(&mut ctx, &data)
                };
                self.process_actions(NodeId::Sender, buffer);
                if let Err(err) = result {
                    self.handle_protocol_error(err);
                }
            }
        }
        true
    }

    fn handle_protocol_error(&mut self, err: ProtocolError) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!("[Sender] APP DATA REJECTED: {err}"),
        });
        if err.is_fatal() {
            error!("Sender failed at {} ms: {}", self.time, err);
            self.fatal_error = Some(err);
        } else {
            warn!("Sender rejected application data: {}", err);
            self.rejected_messages += 1;
        }
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            receiver_packet_count: self.receiver_packet_count,
            rejected_messages: self.rejected_messages,
            fatal_error: self.fatal_error.as_ref().map(|e| e.to_string()),
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Like [`Simulator::run_until_complete`] but leaves events after `deadline_ms`
    /// in the queue. Returns true if the queue drained, which a fatal halt
    /// also prevents.
    pub fn run_until(&mut self, deadline_ms: u64) -> bool {
        self.init();
        while self
            .peek_next_event_time()
            .is_some_and(|time| time <= deadline_ms)
        {
            if !self.step() {
                break;
            }
        }
        self.event_queue.is_empty()
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        // First, fold metrics into simulator-wide store
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {} bytes to application",
                    source_node,
                    data.len()
                ),
            });
            self.delivered_data.push(data);
        }

        for command in buffer.timer_commands {
            self.apply_timer_command(source_node, command);
        }

        for packet in buffer.outgoing_packets {
            self.transmit(source_node, packet);
        }
    }

    fn apply_timer_command(&mut self, node: NodeId, command: TimerCommand) {
        let timer = self.timers.entry(node).or_default();
        match command {
            TimerCommand::Stop => {
                if timer.running {
                    timer.generation += 1;
                    timer.running = false;
                }
            }
            TimerCommand::Start(delay) => {
                if timer.running {
                    warn!("[{:?}] timer restarted while running", node);
                }
                timer.generation += 1;
                timer.running = true;
                let generation = timer.generation;
                self.push_event(self.time + delay, EventType::TimerExpiry { node, generation });
            }
        }
    }

    /// Channel: deterministic faults first, then random loss, corruption,
    /// latency and duplication.
    fn transmit(&mut self, source_node: NodeId, mut packet: Packet) {
        let target_node = source_node.peer();
        match source_node {
            NodeId::Sender => {
                self.sender_packet_count += 1;

                if let Some(pos) = self
                    .drop_sender_seq_once
                    .iter()
                    .position(|s| *s == packet.seq)
                {
                    self.drop_sender_seq_once.remove(pos);
                    self.link_event(format!(
                        "[Sender->Receiver] DROP (deterministic seq) seq={}",
                        packet.seq
                    ));
                    debug!("Deterministically dropping sender packet with seq={}", packet.seq);
                    return;
                }

                if let Some(pos) = self
                    .corrupt_sender_seq_once
                    .iter()
                    .position(|s| *s == packet.seq)
                {
                    self.corrupt_sender_seq_once.remove(pos);
                    self.link_event(format!(
                        "[Sender->Receiver] CORRUPT (deterministic seq) seq={}",
                        packet.seq
                    ));
                    packet.checksum = !packet.checksum;
                    self.schedule_arrival(target_node, packet);
                    return;
                }
            }
            NodeId::Receiver => {
                self.receiver_packet_count += 1;

                if packet.is_ack()
                    && let Some(pos) = self
                        .drop_receiver_ack_once
                        .iter()
                        .position(|a| *a == packet.ack)
                {
                    self.drop_receiver_ack_once.remove(pos);
                    self.link_event(format!(
                        "[Receiver->Sender] DROP (deterministic ack) ack={}",
                        packet.ack
                    ));
                    debug!("Deterministically dropping receiver ACK with ack={}", packet.ack);
                    return;
                }
            }
        }

        // 1. Check Loss
        if self.rng.random::<f64>() < self.config.loss_rate {
            self.link_event(format!(
                "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                source_node, target_node, packet.seq, packet.ack
            ));
            debug!("Packet lost in channel");
            return;
        }

        // 2. Check Corruption
        if self.rng.random::<f64>() < self.config.corrupt_rate {
            self.link_event(format!(
                "[{:?}->{:?}] CORRUPT seq={} ack={}",
                source_node, target_node, packet.seq, packet.ack
            ));
            debug!("Packet corrupted in channel");
            self.corrupt(&mut packet);
        }

        // 3. Check Duplication
        if self.rng.random::<f64>() < self.config.duplicate_rate {
            self.link_event(format!(
                "[{:?}->{:?}] DUPLICATE seq={} ack={}",
                source_node, target_node, packet.seq, packet.ack
            ));
            self.schedule_arrival(target_node, packet.clone());
        }

        self.schedule_arrival(target_node, packet);
    }

    /// Damage exactly one field, the way a bit error on the wire would.
    fn corrupt(&mut self, packet: &mut Packet) {
        let fields = if packet.payload.is_empty() { 3 } else { 4 };
        let delta = self.rng.random_range(1..=64);
        match self.rng.random_range(0..fields) {
            0 => packet.seq = packet.seq.wrapping_add(delta),
            1 => packet.ack = packet.ack.wrapping_add(delta),
            2 => packet.checksum = !packet.checksum,
            _ => {
                let idx = self.rng.random_range(0..packet.payload.len());
                packet.payload[idx] = packet.payload[idx].wrapping_add(delta as u8);
            }
        }
    }

    fn schedule_arrival(&mut self, to: NodeId, packet: Packet) {
        let latency = self
            .rng
            .random_range(self.config.min_latency..=self.config.max_latency);
        self.link_event(format!(
            "[{:?}->{:?}] SEND seq={} ack={} (latency={}ms)",
            to.peer(),
            to,
            packet.seq,
            packet.ack,
            latency
        ));
        self.push_event(self.time + latency, EventType::PacketArrival { to, packet });
    }

    fn link_event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, Simulator};
    use arq_abstract::{Packet, ProtocolError, SimConfig, SystemContext, TransportProtocol};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Probe {
        timer_fired: u32,
        packets: Vec<Packet>,
    }

    /// Starts its timer on init and stops it when the first packet arrives.
    struct TimerProtocol {
        probe: Rc<RefCell<Probe>>,
        delay: u64,
    }

    impl TransportProtocol for TimerProtocol {
        fn init(&mut self, ctx: &mut dyn SystemContext) {
            ctx.start_timer(self.delay);
        }

        fn on_app_data(
            &mut self,
            ctx: &mut dyn SystemContext,
            data: &[u8],
        ) -> Result<(), ProtocolError> {
            if data == b"boom" {
                return Err(ProtocolError::BufferOverflow { capacity: 1 });
            }
            if data.len() > 20 {
                return Err(ProtocolError::PayloadTooLarge {
                    len: data.len(),
                    max: 20,
                });
            }
            ctx.send_packet(Packet::new(0, -1, 0, data.to_vec()));
            Ok(())
        }

        fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
            ctx.stop_timer();
            self.probe.borrow_mut().packets.push(packet);
        }

        fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {
            self.probe.borrow_mut().timer_fired += 1;
        }
    }

    fn simulator(
        config: SimConfig,
        delay: u64,
    ) -> (Simulator, Rc<RefCell<Probe>>, Rc<RefCell<Probe>>) {
        let tx = Rc::new(RefCell::new(Probe::default()));
        let rx = Rc::new(RefCell::new(Probe::default()));
        let sim = Simulator::new(
            config,
            Box::new(TimerProtocol {
                probe: tx.clone(),
                delay,
            }),
            Box::new(TimerProtocol {
                probe: rx.clone(),
                delay,
            }),
        );
        (sim, tx, rx)
    }

    #[test]
    fn stopped_timer_does_not_fire() {
        let config = SimConfig {
            min_latency: 5,
            max_latency: 5,
            ..Default::default()
        };
        let (mut sim, tx, rx) = simulator(config, 50);
        sim.schedule_app_send(0, b"hi".to_vec());
        sim.run_until_complete();

        // receiver got the packet at 5ms and stopped its timer
        assert_eq!(rx.borrow().timer_fired, 0);
        assert_eq!(rx.borrow().packets.len(), 1);
        // sender never heard anything back
        assert_eq!(tx.borrow().timer_fired, 1);
        assert!(!sim.timer_running(NodeId::Sender));
    }

    #[test]
    fn lossy_channel_drops_everything_at_rate_one() {
        let config = SimConfig {
            loss_rate: 1.0,
            ..Default::default()
        };
        let (mut sim, _tx, rx) = simulator(config, 1);
        sim.schedule_app_send(0, b"a".to_vec());
        sim.schedule_app_send(1, b"b".to_vec());
        sim.run_until_complete();

        assert!(rx.borrow().packets.is_empty());
        assert_eq!(sim.sender_packet_count, 2);
    }

    #[test]
    fn duplication_delivers_twice() {
        let config = SimConfig {
            duplicate_rate: 1.0,
            ..Default::default()
        };
        let (mut sim, _tx, rx) = simulator(config, 1);
        sim.schedule_app_send(0, b"a".to_vec());
        sim.run_until_complete();
        assert_eq!(rx.borrow().packets.len(), 2);
    }

    #[test]
    fn corruption_changes_exactly_the_packet_in_flight() {
        let config = SimConfig {
            corrupt_rate: 1.0,
            seed: 3,
            ..Default::default()
        };
        let (mut sim, _tx, rx) = simulator(config, 1);
        sim.schedule_app_send(0, b"abc".to_vec());
        sim.run_until_complete();

        let original = Packet::new(0, -1, 0, b"abc".to_vec());
        let received = rx.borrow().packets[0].clone();
        assert_ne!(received, original);
    }

    #[test]
    fn deterministic_faults_fire_once() {
        let (mut sim, _tx, rx) = simulator(SimConfig::default(), 1);
        sim.add_drop_sender_seq_once(0);
        sim.schedule_app_send(0, b"a".to_vec());
        sim.schedule_app_send(10, b"b".to_vec());
        sim.run_until_complete();

        let received = &rx.borrow().packets;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload, b"b");
        assert!(
            sim.link_events
                .iter()
                .any(|e| e.description.contains("DROP (deterministic seq)"))
        );
    }

    #[test]
    fn fatal_error_halts_the_run() {
        let (mut sim, _tx, rx) = simulator(SimConfig::default(), 1000);
        sim.schedule_app_send(0, b"boom".to_vec());
        sim.schedule_app_send(10, b"late".to_vec());
        sim.run_until_complete();

        assert!(sim.is_halted());
        assert!(rx.borrow().packets.is_empty());
        let report = sim.export_report();
        assert!(report.fatal_error.unwrap().contains("overflow"));
    }

    #[test]
    fn rejected_message_is_counted_and_run_continues() {
        let (mut sim, _tx, rx) = simulator(SimConfig::default(), 1000);
        sim.schedule_app_send(0, vec![b'x'; 30]);
        sim.schedule_app_send(10, b"ok".to_vec());
        sim.run_until_complete();

        assert_eq!(sim.rejected_messages, 1);
        assert!(!sim.is_halted());
        assert_eq!(rx.borrow().packets.len(), 1);
    }

    #[test]
    fn run_until_leaves_later_events_queued() {
        let (mut sim, _tx, _rx) = simulator(SimConfig::default(), 5000);
        sim.schedule_app_send(100, b"a".to_vec());
        assert!(!sim.run_until(50));
        assert_eq!(sim.peek_next_event_time(), Some(100));
    }
}
