use arq_abstract::{ArqConfig, ConfigError, ProtocolKind, TransportProtocol};

use crate::go_back_n::{GoBackNReceiver, GoBackNSender};
use crate::stop_and_wait::{StopAndWaitReceiver, StopAndWaitSender};

pub fn sender(
    kind: ProtocolKind,
    config: &ArqConfig,
) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    config.validate(kind)?;
    let protocol: Box<dyn TransportProtocol> = match kind {
        ProtocolKind::StopAndWait => Box::new(StopAndWaitSender::new(config)?),
        ProtocolKind::GoBackN => Box::new(GoBackNSender::new(config)?),
    };
    Ok(protocol)
}

pub fn receiver(
    kind: ProtocolKind,
    config: &ArqConfig,
) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    config.validate(kind)?;
    let protocol: Box<dyn TransportProtocol> = match kind {
        ProtocolKind::StopAndWait => Box::new(StopAndWaitReceiver::new(config)?),
        ProtocolKind::GoBackN => Box::new(GoBackNReceiver::new(config)?),
    };
    Ok(protocol)
}

/// Sender and receiver sharing one set of parameters.
pub fn pair(
    kind: ProtocolKind,
    config: &ArqConfig,
) -> Result<(Box<dyn TransportProtocol>, Box<dyn TransportProtocol>), ConfigError> {
    Ok((sender(kind, config)?, receiver(kind, config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    #[test]
    fn builds_both_pairs_with_stock_parameters() {
        for kind in [ProtocolKind::StopAndWait, ProtocolKind::GoBackN] {
            let (mut tx, mut rx) = pair(kind, &kind.default_config()).unwrap();
            let mut tx_ctx = RecordingContext::new();
            let mut rx_ctx = RecordingContext::new();
            tx.init(&mut tx_ctx);
            rx.init(&mut rx_ctx);

            tx.on_app_data(&mut tx_ctx, b"hello").unwrap();
            for packet in tx_ctx.take_sent() {
                rx.on_packet(&mut rx_ctx, packet);
            }
            assert_eq!(rx_ctx.delivered, vec![b"hello".to_vec()], "{kind}");
        }
    }

    #[test]
    fn invalid_parameters_are_reported() {
        let cfg = ArqConfig {
            min_seq: 0,
            max_seq: 3,
            window_size: 4,
            timeout_ms: 40,
        };
        assert!(sender(ProtocolKind::GoBackN, &cfg).is_err());
        assert!(receiver(ProtocolKind::GoBackN, &cfg).is_err());
        assert!(pair(ProtocolKind::StopAndWait, &cfg).is_ok());
    }
}
