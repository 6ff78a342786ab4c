use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Largest sequence range a protocol will allocate a ring for.
pub const MAX_SEQ_RANGE: usize = 1 << 16;

/// Channel behaviour of the simulated link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub duplicate_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl SimConfig {
    /// Check the probabilities and the latency range before a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
            ("duplicate_rate", self.duplicate_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        if self.min_latency > self.max_latency {
            return Err(ConfigError::InvalidLatency {
                min: self.min_latency,
                max: self.max_latency,
            });
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
        }
    }
}

/// Which ARQ pair to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    StopAndWait,
    GoBackN,
}

impl ProtocolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::StopAndWait => "stop-and-wait",
            ProtocolKind::GoBackN => "go-back-n",
        }
    }

    /// The stock parameters for this protocol.
    pub fn default_config(&self) -> ArqConfig {
        match self {
            ProtocolKind::StopAndWait => ArqConfig::stop_and_wait(),
            ProtocolKind::GoBackN => ArqConfig::go_back_n(),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop-and-wait" | "saw" => Ok(ProtocolKind::StopAndWait),
            "go-back-n" | "gbn" => Ok(ProtocolKind::GoBackN),
            other => Err(format!(
                "Unknown protocol '{other}'. Try 'stop-and-wait' or 'go-back-n'."
            )),
        }
    }
}

/// Sequence space, window and retransmission timeout shared by a sender and
/// its receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArqConfig {
    pub min_seq: i32,
    pub max_seq: i32,
    /// Ignored by Stop-and-Wait, whose window is always one packet.
    pub window_size: usize,
    pub timeout_ms: u64,
}

impl ArqConfig {
    pub fn stop_and_wait() -> Self {
        Self {
            min_seq: 0,
            max_seq: 1,
            window_size: 1,
            timeout_ms: 40,
        }
    }

    pub fn go_back_n() -> Self {
        Self {
            min_seq: 0,
            max_seq: 49,
            window_size: 8,
            timeout_ms: 40,
        }
    }

    /// Number of distinct sequence numbers, or `None` if `max < min`.
    pub fn range_size(&self) -> Option<usize> {
        if self.max_seq < self.min_seq {
            return None;
        }
        usize::try_from(i64::from(self.max_seq) - i64::from(self.min_seq) + 1).ok()
    }

    /// Check the parameters are able to tell new packets from duplicates.
    pub fn validate(&self, kind: ProtocolKind) -> Result<(), ConfigError> {
        let size = self.range_size().ok_or(ConfigError::InvalidRange {
            min: self.min_seq,
            max: self.max_seq,
        })?;
        if size < 2 {
            return Err(ConfigError::RangeTooSmall { size, required: 2 });
        }
        if size > MAX_SEQ_RANGE {
            return Err(ConfigError::RangeTooLarge {
                size,
                max: MAX_SEQ_RANGE,
            });
        }
        if kind == ProtocolKind::GoBackN {
            if self.window_size == 0 {
                return Err(ConfigError::ZeroWindow);
            }
            if size < self.window_size + 1 {
                return Err(ConfigError::WindowTooLarge {
                    window: self.window_size,
                    size,
                    required: self.window_size + 1,
                });
            }
        }
        Ok(())
    }
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self::go_back_n()
    }
}
