//! Real-time tick loop for the engine.
//!
//! Each iteration simulated actors may press device buttons, then the core
//! is ticked by one simulated step. The loop stops after `max_ticks` or on
//! Ctrl-C, whichever comes first.

use std::time::Duration;

use pulse_core::state_machine::Activation;
use pulse_core::system::PulseSystem;
use pulse_core::tick::TickSummary;
use pulse_types::{ActorId, DeviceStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::scenario::{Layout, ScenarioConfig};
use crate::sim_host::{HostCounters, SimulatedHost};

/// Reason the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Ctrl-C was received.
    Interrupted,
}

/// Loop parameters.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Real time between ticks. Zero runs as fast as possible.
    pub interval: Duration,
    /// Simulated time per tick.
    pub step: Duration,
    /// Stop after this many ticks (0 = unlimited).
    pub max_ticks: u64,
    /// Chance per device per tick of an activation attempt.
    pub activation_chance: f64,
    /// Seed for the interaction RNG.
    pub seed: u64,
}

impl RunSettings {
    /// Combine engine and scenario configuration.
    pub fn new(interval_ms: u64, max_ticks: u64, seed: u64, scenario: &ScenarioConfig) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            step: Duration::try_from_secs_f64(scenario.step_seconds)
                .unwrap_or(Duration::from_secs(1)),
            max_ticks,
            activation_chance: scenario.activation_chance.clamp(0.0, 1.0),
            seed,
        }
    }
}

/// Running totals kept by the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    /// Ticks executed.
    pub ticks: u64,
    /// Activation attempts made by simulated actors.
    pub attempts: u64,
    /// Attempts that started a cycle.
    pub started: u64,
    /// Phase transitions across all devices.
    pub transitions: u64,
    /// Cycles that ran back to idle.
    pub completed: u64,
    /// Stale active-set entries dropped.
    pub stale: u64,
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Why the loop stopped.
    pub end_reason: RunEndReason,
    /// Loop totals.
    pub totals: RunTotals,
    /// Host totals.
    pub host: HostCounters,
    /// Every device at the end of the run.
    pub devices: Vec<DeviceStatus>,
}

/// Run the tick loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`EngineError`] if a tick or activation fails unrecoverably.
pub async fn run(
    system: &mut PulseSystem,
    host: &mut SimulatedHost,
    layout: &Layout,
    settings: &RunSettings,
) -> Result<RunReport, EngineError> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let actor = ActorId::new();
    let mut totals = RunTotals::default();
    let mut interval =
        (!settings.interval.is_zero()).then(|| tokio::time::interval(settings.interval));

    info!(
        max_ticks = settings.max_ticks,
        interval = ?settings.interval,
        step = ?settings.step,
        "Tick loop starting"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let end_reason = loop {
        if settings.max_ticks > 0 && totals.ticks >= settings.max_ticks {
            info!(ticks = totals.ticks, "Tick limit reached");
            break RunEndReason::MaxTicksReached;
        }

        let interrupted = match interval.as_mut() {
            Some(interval) => tokio::select! {
                _ = interval.tick() => false,
                _ = &mut ctrl_c => true,
            },
            None => tokio::select! {
                biased;
                _ = &mut ctrl_c => true,
                () = tokio::task::yield_now() => false,
            },
        };
        if interrupted {
            info!("Received shutdown signal, stopping");
            break RunEndReason::Interrupted;
        }

        for device in layout.devices() {
            if !rng.random_bool(settings.activation_chance) {
                continue;
            }
            totals.attempts = totals.attempts.saturating_add(1);
            if let Activation::Started { zone, .. } = system.activate(device, actor, host)? {
                totals.started = totals.started.saturating_add(1);
                debug!(%device, %zone, "Actor started a device");
            }
        }

        let summary = system.tick(settings.step, host)?;
        totals.ticks = totals.ticks.saturating_add(1);
        record(&mut totals, &summary);
    };

    let devices = layout
        .devices()
        .map(|device| system.describe(device))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RunReport {
        end_reason,
        totals,
        host: host.counters(),
        devices,
    })
}

fn record(totals: &mut RunTotals, summary: &TickSummary) {
    let count = |items: usize| u64::try_from(items).unwrap_or(u64::MAX);
    totals.transitions = totals.transitions.saturating_add(count(summary.transitions.len()));
    totals.completed = totals.completed.saturating_add(count(summary.finished.len()));
    totals.stale = totals.stale.saturating_add(count(summary.stale.len()));
    if !summary.stale.is_empty() {
        warn!(stale = summary.stale.len(), "Dropped stale active devices");
    }
}

/// Log the end of a run.
pub fn log_run_end(report: &RunReport) {
    info!(
        reason = ?report.end_reason,
        ticks = report.totals.ticks,
        attempts = report.totals.attempts,
        started = report.totals.started,
        completed = report.totals.completed,
        effects_fired = report.host.effects_fired,
        effects_failed = report.host.effects_failed,
        "Run ended"
    );
    if report.totals.ticks == 0 {
        warn!("Run ended with no ticks executed");
    }
}
