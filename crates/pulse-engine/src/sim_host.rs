//! A headless host world for the pulse core.
//!
//! [`SimulatedHost`] resolves zones from a static placement table, fails
//! effects at a seeded random rate and turns every presentation call into a
//! structured log line.

use std::collections::BTreeMap;

use pulse_core::host::{
    EffectDispatcher, EffectError, EffectSpec, MessageArg, Presenter, Visual, ZoneResolver,
};
use pulse_types::{ActorId, DeviceId, MessageKey, ZoneId, ceil_seconds};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Running totals of everything the host was asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostCounters {
    /// Effects that went off.
    pub effects_fired: u64,
    /// Effects that failed.
    pub effects_failed: u64,
    /// Channel broadcasts.
    pub notifications: u64,
    /// Popups shown to actors.
    pub popups: u64,
    /// Visual updates.
    pub visuals: u64,
    /// Sounds played.
    pub sounds: u64,
    /// Successful activations observed.
    pub activations: u64,
}

/// Simulated host world.
#[derive(Debug)]
pub struct SimulatedHost {
    placements: BTreeMap<DeviceId, ZoneId>,
    rng: StdRng,
    failure_chance: f64,
    counters: HostCounters,
}

impl SimulatedHost {
    /// Create a host whose effects fail with probability `failure_chance`.
    pub fn new(seed: u64, failure_chance: f64) -> Self {
        Self {
            placements: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            failure_chance: failure_chance.clamp(0.0, 1.0),
            counters: HostCounters::default(),
        }
    }

    /// Place `device` in `zone`.
    pub fn place(&mut self, device: DeviceId, zone: ZoneId) {
        self.placements.insert(device, zone);
    }

    /// Zone `device` was placed in.
    pub fn placement(&self, device: DeviceId) -> Option<ZoneId> {
        self.placements.get(&device).copied()
    }

    /// Running totals so far.
    pub const fn counters(&self) -> HostCounters {
        self.counters
    }
}

impl ZoneResolver for SimulatedHost {
    fn zone_of(&self, device: DeviceId) -> Option<ZoneId> {
        self.placement(device)
    }
}

impl EffectDispatcher for SimulatedHost {
    fn fire_effect(&mut self, device: DeviceId, effect: &EffectSpec) -> Result<(), EffectError> {
        if self.rng.random_bool(self.failure_chance) {
            self.counters.effects_failed = self.counters.effects_failed.saturating_add(1);
            return Err(EffectError::Failed {
                device,
                reason: "simulated power surge".to_owned(),
            });
        }
        self.counters.effects_fired = self.counters.effects_fired.saturating_add(1);
        info!(
            %device,
            zone = ?self.placement(device),
            magnitude = effect.magnitude,
            radius = effect.radius,
            duration = ?effect.duration,
            "Pulse fired"
        );
        Ok(())
    }
}

impl Presenter for SimulatedHost {
    fn notify(&mut self, device: DeviceId, channel: &str, message: MessageKey, args: &[MessageArg]) {
        self.counters.notifications = self.counters.notifications.saturating_add(1);
        let args: Vec<String> = args.iter().map(render_arg).collect();
        info!(%device, channel, %message, ?args, "Broadcast");
    }

    fn popup(&mut self, device: DeviceId, message: MessageKey, target: ActorId) {
        self.counters.popups = self.counters.popups.saturating_add(1);
        debug!(%device, %message, %target, "Popup");
    }

    fn set_visual(&mut self, device: DeviceId, visual: Visual) {
        self.counters.visuals = self.counters.visuals.saturating_add(1);
        match visual {
            Visual::Flag { flag, lit } => debug!(%device, ?flag, lit, "Visual flag"),
            Visual::Charge(level) => debug!(%device, level, "Charge level"),
        }
    }

    fn play_sound(&mut self, device: DeviceId, sound: &str) {
        self.counters.sounds = self.counters.sounds.saturating_add(1);
        debug!(%device, sound, "Sound");
    }

    fn activated(&mut self, device: DeviceId) {
        self.counters.activations = self.counters.activations.saturating_add(1);
        if self.placement(device).is_none() {
            warn!(%device, "Activated device has no placement");
        }
    }
}

fn render_arg(arg: &MessageArg) -> String {
    match arg {
        MessageArg::Zone(zone) => format!("{}={zone}", arg.name()),
        MessageArg::TimeLeft(left) => format!("{}={}", arg.name(), ceil_seconds(*left)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn spec() -> EffectSpec {
        EffectSpec {
            magnitude: 50_000.0,
            radius: 100.0,
            duration: Duration::from_secs(60),
        }
    }

    #[test]
    fn zero_failure_chance_always_fires() {
        let mut host = SimulatedHost::new(7, 0.0);
        let device = DeviceId::new();
        for _ in 0..50 {
            assert!(host.fire_effect(device, &spec()).is_ok());
        }
        assert_eq!(host.counters().effects_fired, 50);
    }

    #[test]
    fn certain_failure_never_fires() {
        let mut host = SimulatedHost::new(7, 1.0);
        let device = DeviceId::new();
        assert!(host.fire_effect(device, &spec()).is_err());
        assert_eq!(host.counters().effects_failed, 1);
    }

    #[test]
    fn same_seed_same_failures() {
        let device = DeviceId::new();
        let outcomes = |seed| {
            let mut host = SimulatedHost::new(seed, 0.5);
            (0..32)
                .map(|_| host.fire_effect(device, &spec()).is_ok())
                .collect::<Vec<_>>()
        };
        assert_eq!(outcomes(42), outcomes(42));
    }

    #[test]
    fn time_args_render_in_whole_seconds() {
        let rendered = render_arg(&MessageArg::TimeLeft(Duration::from_millis(2_100)));
        assert_eq!(rendered, "timeLeft=3");
    }
}
