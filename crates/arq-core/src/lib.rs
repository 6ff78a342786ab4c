//! Stop-and-Wait and Go-Back-N ARQ state machines.
//!
//! Every entity implements [`TransportProtocol`] and talks to the outside
//! world only through the [`SystemContext`] its host passes in.

pub mod builtin;
pub mod checksum;
pub mod go_back_n;
pub mod packet;
pub mod sequence;
pub mod stop_and_wait;

#[cfg(test)]
pub(crate) mod testing;

pub use arq_abstract::{
    ArqConfig, ConfigError, Packet, ProtocolError, ProtocolKind, SystemContext, TransportProtocol,
};
pub use go_back_n::{GoBackNReceiver, GoBackNSender};
pub use sequence::SequenceSpace;
pub use stop_and_wait::{StopAndWaitReceiver, StopAndWaitSender};
