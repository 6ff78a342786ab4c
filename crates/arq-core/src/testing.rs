use arq_abstract::{Packet, SystemContext};

/// Records everything an entity asks of its host so tests can inspect it.
#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub delivered: Vec<Vec<u8>>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
    pub timer_running: bool,
    pub timer_starts: u32,
    pub timer_stops: u32,
    pub now: u64,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the packets sent since the last call.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }

    pub fn sent_seqs(&mut self) -> Vec<i32> {
        self.take_sent().into_iter().map(|p| p.seq).collect()
    }

    /// The host fires the timer, which leaves it idle.
    pub fn expire_timer(&mut self) {
        assert!(self.timer_running, "timer fired while idle");
        self.timer_running = false;
    }

    pub fn last_metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, _delay_ms: u64) {
        assert!(!self.timer_running, "timer started while already running");
        self.timer_running = true;
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        self.timer_running = false;
        self.timer_stops += 1;
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.delivered.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}
