use crate::config::{ArqConfig, ProtocolKind, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    /// Protocol pair the scenario targets; the caller's choice wins when absent.
    #[serde(default)]
    pub protocol: Option<ProtocolKind>,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub arq: ArqConfigOverride,
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub duplicate_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.duplicate_rate {
            config.duplicate_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArqConfigOverride {
    pub min_seq: Option<i32>,
    pub max_seq: Option<i32>,
    pub window_size: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl ArqConfigOverride {
    pub fn apply_to(&self, config: &mut ArqConfig) {
        if let Some(v) = self.min_seq {
            config.min_seq = v;
        }
        if let Some(v) = self.max_seq {
            config.max_seq = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: i32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: i32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: i32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that exactly these messages were delivered, once each, in this order
    DeliveredInOrder { data: Vec<String> },
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that every sample of a recorded metric stays at or below `max`
    MetricMax { name: String, max: f64 },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
    /// Assert whether the run ended on a fatal protocol error
    FatalError { expected: bool },
}
