//! Per-tick update pass.
//!
//! Each tick, for every zone that has active devices and is not paused:
//!
//! 1. **Advance** -- add the tick delta to the zone clock.
//! 2. **Charge** -- recompute each active device's charge indicator and
//!    emit a visual only when the quantized level changed.
//! 3. **Expire** -- devices whose deadline has passed advance exactly one
//!    phase. A device that overslept several phases catches up one phase
//!    per tick.
//! 4. **Reconcile** -- devices that returned to idle, or whose record has
//!    disappeared, are removed from the zone's active set after the scan.
//!
//! Zones are processed in id order. Within a zone, devices are scanned in
//! activation order.

use std::time::Duration;

use pulse_types::{DeviceId, DeviceStateType, ZoneId};
use tracing::{debug, warn};

use crate::charge;
use crate::clock::{ClockError, ZoneRegistry};
use crate::device::DeviceTable;
use crate::host::{Cue, EffectDispatcher, Visual};
use crate::state_machine;

/// Errors that can occur during a tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A zone clock could not be advanced.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// One phase change that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRecord {
    /// The device that moved.
    pub device: DeviceId,
    /// Its zone.
    pub zone: ZoneId,
    /// Phase before the transition.
    pub from: DeviceStateType,
    /// Phase after the transition.
    pub to: DeviceStateType,
    /// Zone time of the transition.
    pub at: Duration,
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Zones whose clock moved this tick.
    pub zones_advanced: usize,
    /// Phase changes, in processing order.
    pub transitions: Vec<TransitionRecord>,
    /// Devices that returned to idle and left their zone.
    pub finished: Vec<DeviceId>,
    /// Active-set entries that no longer had a device record.
    pub stale: Vec<DeviceId>,
}

/// Run one update pass over every zone in `registry`.
///
/// Presentation work is appended to `cues` in the order it was produced.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if a zone clock overflows. Zones processed
/// before the failing one keep their updates.
pub fn run_tick(
    registry: &mut ZoneRegistry,
    devices: &mut DeviceTable,
    effects: &mut dyn EffectDispatcher,
    delta: Duration,
    cues: &mut Vec<Cue>,
) -> Result<TickSummary, TickError> {
    let mut summary = TickSummary::default();

    for zone in registry.zone_ids() {
        let runnable = registry
            .get(zone)
            .is_some_and(|clock| clock.has_active_devices() && !clock.is_paused());
        if !runnable || !registry.advance(zone, delta)? {
            continue;
        }
        summary.zones_advanced = summary.zones_advanced.saturating_add(1);

        let leaving = scan_zone(registry, devices, effects, zone, cues, &mut summary);
        for device in leaving {
            registry.deregister_active(zone, device);
        }
    }

    Ok(summary)
}

/// Scan one zone's active devices. Returns the devices to deregister; the
/// active set itself is not touched while it is being iterated.
fn scan_zone(
    registry: &ZoneRegistry,
    devices: &mut DeviceTable,
    effects: &mut dyn EffectDispatcher,
    zone: ZoneId,
    cues: &mut Vec<Cue>,
    summary: &mut TickSummary,
) -> Vec<DeviceId> {
    let mut leaving = Vec::new();
    let Some(clock) = registry.get(zone) else {
        return leaving;
    };
    let now = clock.current_time();

    for &device in clock.active_devices() {
        let Some(record) = devices.get_mut(device) else {
            warn!(%device, %zone, "Active device has no record, dropping it");
            summary.stale.push(device);
            leaving.push(device);
            continue;
        };

        if !record.state.state_type().is_cycling() {
            leaving.push(device);
            continue;
        }

        if let Some(level) = charge::refresh(&mut record.state, now) {
            cues.push(Cue::Visual {
                device,
                visual: Visual::Charge(level),
            });
        }

        if !record.state.cycle.is_expired(now) {
            continue;
        }

        let from = record.state.state_type();
        let to = state_machine::transition(device, record, now, effects, cues);
        summary.transitions.push(TransitionRecord {
            device,
            zone,
            from,
            to,
            at: now,
        });

        if to == DeviceStateType::Idle {
            debug!(%device, %zone, "Device cycle complete");
            summary.finished.push(device);
            leaving.push(device);
        }
    }

    leaving
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pulse_types::{ActorId, CycleState};

    use super::*;
    use crate::config::PulseConfig;
    use crate::device::DeviceProfile;
    use crate::host::RecordingHost;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn profile() -> DeviceProfile {
        let mut profile = DeviceProfile::from_config(&PulseConfig::default()).unwrap();
        profile.base_priming = secs(5);
        profile.active = secs(10);
        profile.cooling_down = secs(4);
        profile.base_cooldown = secs(20);
        profile
    }

    struct Fixture {
        registry: ZoneRegistry,
        devices: DeviceTable,
        host: RecordingHost,
        zone: ZoneId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: ZoneRegistry::new(),
                devices: DeviceTable::new(),
                host: RecordingHost::new(),
                zone: ZoneId::new(),
            }
        }

        fn activated_device(&mut self) -> DeviceId {
            let device = DeviceId::new();
            self.host.place(device, self.zone);
            let record = self.devices.install(device, profile());
            state_machine::activate(
                device,
                record,
                ActorId::new(),
                &self.host,
                &mut self.registry,
                &mut Vec::new(),
            )
            .unwrap();
            device
        }

        fn tick(&mut self, seconds: u64) -> TickSummary {
            let mut cues = Vec::new();
            let summary = run_tick(
                &mut self.registry,
                &mut self.devices,
                &mut self.host,
                secs(seconds),
                &mut cues,
            )
            .unwrap();
            for cue in &cues {
                cue.deliver(&mut self.host);
            }
            summary
        }

        fn state_of(&self, device: DeviceId) -> DeviceStateType {
            self.devices.get(device).unwrap().state.state_type()
        }
    }

    #[test]
    fn zones_without_active_devices_do_not_advance() {
        let mut fixture = Fixture::new();
        fixture.registry.get_or_create(fixture.zone);

        let summary = fixture.tick(1);
        assert_eq!(summary.zones_advanced, 0);
        assert_eq!(fixture.registry.current_time(fixture.zone), Some(Duration::ZERO));
    }

    #[test]
    fn deadline_triggers_single_transition() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();

        for _ in 0..4 {
            assert!(fixture.tick(1).transitions.is_empty());
        }
        let summary = fixture.tick(1);
        assert_eq!(summary.transitions.len(), 1);
        assert_eq!(fixture.state_of(device), DeviceStateType::Active);
    }

    #[test]
    fn large_delta_advances_one_phase_per_tick() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();

        // 100s covers every phase, but only one step happens per tick.
        fixture.tick(100);
        assert_eq!(fixture.state_of(device), DeviceStateType::Active);
        fixture.tick(100);
        assert_eq!(fixture.state_of(device), DeviceStateType::CoolingDown);
        fixture.tick(100);
        assert_eq!(fixture.state_of(device), DeviceStateType::Recharging);
        let summary = fixture.tick(100);
        assert_eq!(fixture.state_of(device), DeviceStateType::Idle);
        assert_eq!(summary.finished, vec![device]);
    }

    #[test]
    fn finished_devices_leave_active_set_after_scan() {
        let mut fixture = Fixture::new();
        let first = fixture.activated_device();
        let second = fixture.activated_device();

        for _ in 0..4 {
            fixture.tick(100);
        }
        let clock = fixture.registry.get(fixture.zone).unwrap();
        assert!(!clock.is_active(first));
        assert!(!clock.is_active(second));
        assert_eq!(fixture.registry.zone_of_active(first), None);
    }

    #[test]
    fn active_set_matches_non_idle_devices() {
        let mut fixture = Fixture::new();
        let early = fixture.activated_device();
        fixture.tick(3);
        let late = fixture.activated_device();

        for _ in 0..60 {
            fixture.tick(1);
            let clock = fixture.registry.get(fixture.zone).unwrap();
            for device in [early, late] {
                assert_eq!(
                    clock.is_active(device),
                    fixture.state_of(device).is_cycling(),
                    "active set out of sync for {device}"
                );
            }
        }
    }

    #[test]
    fn stale_entries_are_dropped_once() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();
        fixture.devices.remove(device);

        let summary = fixture.tick(1);
        assert_eq!(summary.stale, vec![device]);
        assert_eq!(fixture.registry.zone_of_active(device), None);

        // Zone is now empty and no longer advances.
        let summary = fixture.tick(1);
        assert!(summary.stale.is_empty());
        assert_eq!(summary.zones_advanced, 0);
    }

    #[test]
    fn idle_entries_are_reconciled() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();
        fixture.devices.get_mut(device).unwrap().state.cycle = CycleState::Idle;

        let summary = fixture.tick(1);
        assert!(summary.transitions.is_empty());
        assert_eq!(fixture.registry.zone_of_active(device), None);
    }

    #[test]
    fn paused_zone_keeps_time_and_deadlines() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();
        fixture.tick(2);
        fixture.registry.set_paused(fixture.zone, true);

        for _ in 0..3 {
            let summary = fixture.tick(1);
            assert_eq!(summary.zones_advanced, 0);
        }
        assert_eq!(fixture.registry.current_time(fixture.zone), Some(secs(2)));
        assert_eq!(
            fixture.devices.get(device).unwrap().state.cycle,
            CycleState::Priming { until: secs(5) }
        );
    }

    #[test]
    fn zones_are_isolated() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();
        let other_zone = ZoneId::new();
        let other = DeviceId::new();
        fixture.host.place(other, other_zone);
        let record = fixture.devices.install(other, profile());
        state_machine::activate(
            other,
            record,
            ActorId::new(),
            &fixture.host,
            &mut fixture.registry,
            &mut Vec::new(),
        )
        .unwrap();
        fixture.registry.set_paused(other_zone, true);

        for _ in 0..5 {
            fixture.tick(1);
        }
        assert_eq!(fixture.state_of(device), DeviceStateType::Active);
        assert_eq!(fixture.state_of(other), DeviceStateType::Priming);
        assert_eq!(fixture.registry.current_time(other_zone), Some(Duration::ZERO));
    }

    #[test]
    fn charge_visual_only_on_change() {
        let mut fixture = Fixture::new();
        let device = fixture.activated_device();
        for _ in 0..5 {
            fixture.tick(1);
        }
        // Active for 10s at capacity 5: one level every 2s.
        for _ in 0..10 {
            fixture.tick(1);
        }
        let levels = fixture.host.charge_levels(device);
        assert!(levels.windows(2).all(|pair| matches!(pair, [a, b] if a != b)));
        assert!(levels.iter().all(|level| *level <= 5));
    }
}
