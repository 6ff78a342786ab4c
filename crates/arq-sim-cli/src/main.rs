use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use arq_abstract::{ArqConfigOverride, ProtocolKind, SimConfig, SimConfigOverride, TestScenario};
use arq_core::builtin;
use arq_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run Stop-and-Wait or Go-Back-N over a simulated lossy channel")]
struct Args {
    /// Protocol pair: `stop-and-wait` (`saw`) or `go-back-n` (`gbn`).
    #[arg(long, default_value = "go-back-n")]
    protocol: String,

    /// Load a scenario from disk. Its `protocol` field wins over --protocol.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Messages sent by the default workload.
    #[arg(long, default_value_t = 10)]
    messages: usize,

    /// Gap between two messages of the default workload, in ms.
    #[arg(long, default_value_t = 100)]
    interval: u64,

    #[arg(long)]
    loss_rate: Option<f64>,
    #[arg(long)]
    corrupt_rate: Option<f64>,
    #[arg(long)]
    duplicate_rate: Option<f64>,
    #[arg(long)]
    min_latency: Option<u64>,
    #[arg(long)]
    max_latency: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    min_seq: Option<i32>,
    #[arg(long)]
    max_seq: Option<i32>,
    #[arg(long)]
    window: Option<usize>,
    /// Retransmission timeout in ms.
    #[arg(long)]
    timeout: Option<u64>,

    /// Stop processing events after this simulated time, in ms.
    #[arg(long)]
    deadline: Option<u64>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("arq-sim starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario = scenario_runner::load_scenario(path)?;
        run_scenario(&args, &scenario)?
    } else {
        run_default_sim(&args)?
    };
    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn protocol_kind(&self) -> Result<ProtocolKind> {
        self.protocol
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
    }

    fn sim_overrides(&self) -> SimConfigOverride {
        SimConfigOverride {
            loss_rate: self.loss_rate,
            corrupt_rate: self.corrupt_rate,
            duplicate_rate: self.duplicate_rate,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            seed: self.seed,
        }
    }

    fn arq_overrides(&self) -> ArqConfigOverride {
        ArqConfigOverride {
            min_seq: self.min_seq,
            max_seq: self.max_seq,
            window_size: self.window,
            timeout_ms: self.timeout,
        }
    }
}

fn run_scenario(args: &Args, scenario: &TestScenario) -> Result<SimulationReport> {
    let kind = match scenario.protocol {
        Some(kind) => kind,
        None => args.protocol_kind()?,
    };
    let mut arq = kind.default_config();
    scenario.arq.apply_to(&mut arq);
    args.arq_overrides().apply_to(&mut arq);
    info!("Scenario protocol {} with {:?}", kind, arq);

    let (sender, receiver) = builtin::pair(kind, &arq)
        .with_context(|| format!("Invalid {kind} parameters"))?;
    scenario_runner::run_scenario(scenario, sender, receiver)
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let kind = args.protocol_kind()?;
    let mut arq = kind.default_config();
    args.arq_overrides().apply_to(&mut arq);

    let mut config = SimConfig {
        loss_rate: 0.1,
        corrupt_rate: 0.1,
        min_latency: 5,
        max_latency: 15,
        seed: 42,
        ..Default::default()
    };
    args.sim_overrides().apply_to(&mut config);
    config.validate().context("Invalid channel parameters")?;

    let (sender, receiver) = builtin::pair(kind, &arq)
        .with_context(|| format!("Invalid {kind} parameters"))?;
    let mut sim = Simulator::new(config, sender, receiver);
    for i in 0..args.messages {
        sim.schedule_app_send(i as u64 * args.interval, format!("msg {i}").into_bytes());
    }

    info!("Starting {} simulation with {:?}", kind, arq);
    match args.deadline {
        Some(deadline) => {
            if stopped_at_deadline(&mut sim, deadline) {
                info!(
                    "Deadline of {} ms reached with {} events pending",
                    deadline,
                    sim.remaining_events()
                );
            }
        }
        None => sim.run_until_complete(),
    }
    info!("Simulation complete.");
    Ok(sim.export_report())
}

/// Run up to `deadline` and report whether events were cut off by it. A run
/// halted by a fatal protocol error does not count.
fn stopped_at_deadline(sim: &mut Simulator, deadline: u64) -> bool {
    !sim.run_until(deadline) && !sim.is_halted()
}

fn log_summary(report: &SimulationReport) {
    info!(
        "Simulation duration: {} ms | packets sent: {} | ACKs sent: {} | deliveries: {}",
        report.duration_ms,
        report.sender_packet_count,
        report.receiver_packet_count,
        report.delivered_data.len()
    );
    if let Some(err) = &report.fatal_error {
        info!("Run halted: {}", err);
    }
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
