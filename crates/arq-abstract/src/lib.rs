pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{MAX_PAYLOAD_LEN, NO_ACK, NO_SEQ, Packet};

pub use config::{ArqConfig, MAX_SEQ_RANGE, ProtocolKind, SimConfig};
pub use error::{ConfigError, ProtocolError};
pub use scenario::{
    ArqConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
