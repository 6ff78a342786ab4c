use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use arq_abstract::{SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol};

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario: TestScenario =
        toml::from_str(&content).context("Failed to parse scenario file")?;
    Ok(scenario)
}

/// Build a simulator with the scenario's channel overrides and actions applied.
pub fn build_simulator(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    config
        .validate()
        .with_context(|| format!("Invalid channel config in scenario '{}'", scenario.name))?;
    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions);
    Ok(sim)
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
        }
    }
}

/// Run a scenario to completion and check every assertion.
pub fn run_scenario(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<SimulationReport> {
    info!("Running scenario '{}': {}", scenario.name, scenario.description);
    let mut sim = build_simulator(scenario, sender, receiver)?;
    sim.run_until_complete();
    let report = sim.export_report();
    check_assertions(&scenario.assertions, &report)
        .with_context(|| format!("Scenario '{}' failed", scenario.name))?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(report)
}

/// Evaluate all assertions, reporting every failure at once.
pub fn check_assertions(assertions: &[TestAssertion], report: &SimulationReport) -> Result<()> {
    let failures: Vec<String> = assertions
        .iter()
        .filter_map(|assertion| check_assertion(assertion, report).err())
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} assertion(s) failed:\n  {}", failures.len(), failures.join("\n  "))
    }
}

fn check_assertion(
    assertion: &TestAssertion,
    report: &SimulationReport,
) -> std::result::Result<(), String> {
    match assertion {
        TestAssertion::DataDelivered { data } => {
            if report.delivered_data.iter().any(|d| d == data.as_bytes()) {
                Ok(())
            } else {
                Err(format!("'{data}' was never delivered"))
            }
        }
        TestAssertion::DeliveredInOrder { data } => {
            let delivered = report.delivered_strings();
            if &delivered == data {
                Ok(())
            } else {
                Err(format!("expected delivery {data:?}, got {delivered:?}"))
            }
        }
        TestAssertion::SenderPacketCount { min, max } => {
            let count = report.sender_packet_count;
            if count < *min || max.is_some_and(|max| count > max) {
                Err(format!(
                    "sender sent {count} packets, expected [{min}, {}]",
                    max.map_or("inf".to_string(), |m| m.to_string())
                ))
            } else {
                Ok(())
            }
        }
        TestAssertion::MetricMax { name, max } => {
            let samples = report
                .metrics
                .get(name)
                .ok_or_else(|| format!("metric '{name}' was never recorded"))?;
            match samples.iter().find(|(_, v)| v > max) {
                Some((time, v)) => Err(format!("metric '{name}' hit {v} at {time} ms, max {max}")),
                None => Ok(()),
            }
        }
        TestAssertion::MaxDuration { ms } => {
            if report.duration_ms <= *ms {
                Ok(())
            } else {
                Err(format!("run took {} ms, limit {ms} ms", report.duration_ms))
            }
        }
        TestAssertion::FatalError { expected } => {
            match (&report.fatal_error, expected) {
                (Some(_), true) | (None, false) => Ok(()),
                (Some(err), false) => Err(format!("unexpected fatal error: {err}")),
                (None, true) => Err("expected a fatal error, run finished cleanly".to_string()),
            }
        }
    }
}
