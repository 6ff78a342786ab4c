use thiserror::Error;

/// Errors a protocol entity reports back to its host from `on_app_data`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The sender's ring wrapped all the way round with nothing acknowledged.
    #[error("send buffer overflow: at most {capacity} packets can be outstanding")]
    BufferOverflow { capacity: usize },

    /// The sender already overflowed and refuses any further message.
    #[error("sender terminated after a buffer overflow")]
    SenderTerminated,

    #[error("message of {len} bytes exceeds the {max}-byte payload limit")]
    PayloadTooLarge { len: usize, max: usize },
}

impl ProtocolError {
    /// Whether the entity has stopped for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::BufferOverflow { .. } | ProtocolError::SenderTerminated
        )
    }
}

/// Rejected protocol or channel parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid sequence range [{min}, {max}]")]
    InvalidRange { min: i32, max: i32 },

    #[error("sequence range of {size} numbers is too small, need at least {required}")]
    RangeTooSmall { size: usize, required: usize },

    #[error("sequence range of {size} numbers exceeds the limit of {max}")]
    RangeTooLarge { size: usize, max: usize },

    #[error("window size must be at least 1")]
    ZeroWindow,

    #[error("window size {window} needs a range of at least {required} numbers, got {size}")]
    WindowTooLarge {
        window: usize,
        size: usize,
        required: usize,
    },

    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("latency range [{min}, {max}] ms is inverted")]
    InvalidLatency { min: u64, max: u64 },
}
