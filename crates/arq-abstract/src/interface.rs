use crate::error::ProtocolError;
use crate::packet::Packet;

/// The capabilities the host environment lends to a protocol entity.
/// A fresh context is handed to every callback; entities never keep it.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel. It may be lost, corrupted,
    /// delayed or duplicated on the way.
    fn send_packet(&mut self, packet: Packet);

    /// Start this node's timer. Each node owns exactly one timer, so a
    /// protocol must stop a running timer before starting it again.
    fn start_timer(&mut self, delay_ms: u64);

    /// Stop this node's timer. Stopping an idle timer is a no-op.
    fn stop_timer(&mut self);

    /// Deliver an in-order payload to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the host's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time in ms.
    fn now(&self) -> u64;

    /// Record a numeric metric (e.g. packets in flight) for later inspection.
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Hosts that don't chart anything can ignore metrics.
    }
}

/// A sender or receiver state machine driven by the host, one event at a time.
pub trait TransportProtocol {
    /// Called once before the first event.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// The application hands down a message to transfer reliably.
    ///
    /// A fatal error (see [`ProtocolError::is_fatal`]) means the entity has
    /// stopped and the host should end the run.
    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        data: &[u8],
    ) -> Result<(), ProtocolError>;

    /// A packet arrived from the channel, possibly corrupted.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// The node's timer expired without being stopped.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);
}
