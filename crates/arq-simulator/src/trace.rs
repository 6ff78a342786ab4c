use arq_abstract::SimConfig;
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    /// Application messages the sender refused without stopping.
    pub rejected_messages: u32,
    /// The error that halted the run, if any.
    pub fatal_error: Option<String>,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Delivered payloads rendered as text, for assertions and summaries.
    pub fn delivered_strings(&self) -> Vec<String> {
        self.delivered_data
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }
}
