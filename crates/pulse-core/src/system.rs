//! The public entry point of the core.
//!
//! [`PulseSystem`] owns the zone registry and the device table and exposes
//! the operations a host world calls: activation, ticking, teardown
//! notifications, upgrades and inspection. Every cue produced by an
//! operation is delivered to the host before the operation returns.

use std::time::Duration;

use pulse_types::{ActorId, DeviceId, DeviceState, DeviceStatus, RunLevel, ZoneId};
use tracing::{debug, warn};

use crate::clock::ZoneRegistry;
use crate::device::{DeviceError, DeviceProfile, DeviceRecord, DeviceTable};
use crate::host::{Cue, Host, Presenter};
use crate::lifecycle::{self, ZoneRemoval};
use crate::state_machine::{self, Activation, ActivationError};
use crate::tick::{self, TickError, TickSummary};
use crate::upgrade;

/// Zone clocks plus every installed device.
#[derive(Debug, Clone, Default)]
pub struct PulseSystem {
    registry: ZoneRegistry,
    devices: DeviceTable,
}

impl PulseSystem {
    /// Create a system with no devices and no zones.
    pub const fn new() -> Self {
        Self {
            registry: ZoneRegistry::new(),
            devices: DeviceTable::new(),
        }
    }

    /// Install `device` as idle with `profile`.
    ///
    /// Reinstalling a device drops its previous record and any zone
    /// registration it still held.
    pub fn install(&mut self, device: DeviceId, profile: DeviceProfile) -> &DeviceRecord {
        if let Some(zone) = self.registry.deregister_device(device) {
            debug!(%device, %zone, "Reinstalled device left its zone");
        }
        self.devices.install(device, profile)
    }

    /// Handle an activation request from `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::UnknownDevice`] if `device` was never
    /// installed, [`ActivationError::NoZone`] if an idle device sits outside
    /// every zone, or [`ActivationError::Clock`] if the device is still
    /// registered with another zone.
    pub fn activate<H: Host>(
        &mut self,
        device: DeviceId,
        actor: ActorId,
        host: &mut H,
    ) -> Result<Activation, ActivationError> {
        let record = self
            .devices
            .get_mut(device)
            .ok_or(ActivationError::UnknownDevice { device })?;
        let mut cues = Vec::new();
        let outcome =
            state_machine::activate(device, record, actor, &*host, &mut self.registry, &mut cues)?;
        deliver(&cues, host);
        Ok(outcome)
    }

    /// Advance every unpaused zone by `delta` and process expired deadlines.
    ///
    /// Cues produced before a failure are still delivered.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if a zone clock overflows.
    pub fn tick<H: Host>(&mut self, delta: Duration, host: &mut H) -> Result<TickSummary, TickError> {
        let mut cues = Vec::new();
        let result = tick::run_tick(
            &mut self.registry,
            &mut self.devices,
            &mut *host,
            delta,
            &mut cues,
        );
        deliver(&cues, host);
        result
    }

    /// The host destroyed or detached `device`.
    ///
    /// Returns the device's last state, or `None` if it was unknown.
    pub fn on_device_removed(&mut self, device: DeviceId) -> Option<DeviceState> {
        lifecycle::remove_device(&mut self.registry, &mut self.devices, device)
    }

    /// The host removed `zone`.
    pub fn on_zone_removed(&mut self, zone: ZoneId) -> ZoneRemoval {
        lifecycle::remove_zone(&mut self.registry, &mut self.devices, zone)
    }

    /// The round or session ended.
    pub fn on_session_reset(&mut self) {
        lifecycle::reset_session(&mut self.registry, &mut self.devices);
    }

    /// The run level changed. Returns `true` if the session was reset.
    pub fn on_run_level_changed(&mut self, level: RunLevel) -> bool {
        lifecycle::on_run_level_changed(&mut self.registry, &mut self.devices, level)
    }

    /// The device's parts now have upgrade `rating`.
    ///
    /// Only future deadlines use the new durations.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnknownDevice`] if `device` was never installed.
    pub fn on_upgrade(&mut self, device: DeviceId, rating: u32) -> Result<(), DeviceError> {
        let record = self.devices.require_mut(device)?;
        upgrade::apply_rating(&mut record.state, rating);
        debug!(
            %device,
            rating,
            priming = ?record.state.priming_duration,
            cooldown = ?record.state.cooldown_duration,
            "Device upgraded"
        );
        Ok(())
    }

    /// Read-only snapshot of `device` for examine text.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnknownDevice`] if `device` was never installed.
    pub fn describe(&self, device: DeviceId) -> Result<DeviceStatus, DeviceError> {
        let record = self.devices.require(device)?;
        let state_type = record.state.state_type();
        let remaining = match (record.state.cycle.until(), record.zone) {
            (None, _) => None,
            (Some(until), zone) => {
                let now = zone.and_then(|zone| self.registry.current_time(zone));
                if now.is_none() {
                    warn!(%device, ?zone, %state_type, "Cycling device has no tracked zone");
                }
                now.map(|now| until.saturating_sub(now))
            }
        };
        Ok(DeviceStatus {
            device,
            state_type,
            remaining,
            delay_multiplier: upgrade::delay_multiplier(&record.state),
        })
    }

    /// Suspend or resume the clock of `zone`.
    pub fn set_zone_paused(&mut self, zone: ZoneId, paused: bool) {
        self.registry.set_paused(zone, paused);
        debug!(%zone, paused, "Zone pause changed");
    }

    /// Current time of `zone`, if tracked.
    pub fn zone_time(&self, zone: ZoneId) -> Option<Duration> {
        self.registry.current_time(zone)
    }

    /// The zone registry.
    pub const fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// The device table.
    pub const fn devices(&self) -> &DeviceTable {
        &self.devices
    }
}

fn deliver<P: Presenter>(cues: &[Cue], presenter: &mut P) {
    for cue in cues {
        cue.deliver(presenter);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pulse_types::{DeviceStateType, MessageKey};

    use super::*;
    use crate::config::PulseConfig;
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

    fn setup() -> (PulseSystem, RecordingHost, DeviceId, ZoneId) {
        let mut system = PulseSystem::new();
        let mut host = RecordingHost::new();
        let device = DeviceId::new();
        let zone = ZoneId::new();
        host.place(device, zone);
        system.install(device, profile());
        (system, host, device, zone)
    }

    #[test]
    fn activation_cues_reach_host() {
        let (mut system, mut host, device, zone) = setup();
        let outcome = system.activate(device, ActorId::new(), &mut host).unwrap();
        assert_eq!(outcome, Activation::Started { zone, until: secs(5) });
        assert_eq!(host.popups(device), vec![MessageKey::ActivateSuccess]);
        assert_eq!(host.notifications(device), vec![MessageKey::ActivateSuccess]);
    }

    #[test]
    fn unknown_device_cannot_activate() {
        let mut system = PulseSystem::new();
        let mut host = RecordingHost::new();
        let result = system.activate(DeviceId::new(), ActorId::new(), &mut host);
        assert!(matches!(result, Err(ActivationError::UnknownDevice { .. })));
        assert!(host.cues().is_empty());
    }

    #[test]
    fn describe_reports_remaining_time() {
        let (mut system, mut host, device, _) = setup();
        let idle = system.describe(device).unwrap();
        assert_eq!(idle.state_type, DeviceStateType::Idle);
        assert_eq!(idle.remaining, None);

        system.activate(device, ActorId::new(), &mut host).unwrap();
        system.tick(Duration::from_millis(1_500), &mut host).unwrap();
        let status = system.describe(device).unwrap();
        assert_eq!(status.state_type, DeviceStateType::Priming);
        assert_eq!(status.remaining, Some(Duration::from_millis(3_500)));
    }

    #[test]
    fn describe_after_zone_removal_has_no_time() {
        let (mut system, mut host, device, zone) = setup();
        system.activate(device, ActorId::new(), &mut host).unwrap();
        system.on_zone_removed(zone);
        let status = system.describe(device).unwrap();
        assert_eq!(status.state_type, DeviceStateType::Idle);
        assert_eq!(status.remaining, None);
    }

    #[test]
    fn upgrade_changes_next_cycle_only() {
        let (mut system, mut host, device, _) = setup();
        system.activate(device, ActorId::new(), &mut host).unwrap();
        system.on_upgrade(device, 2).unwrap();

        let status = system.describe(device).unwrap();
        assert_eq!(status.remaining, Some(secs(5)));
        assert!((status.delay_multiplier - 0.8).abs() < 1e-6);
        assert!(system.on_upgrade(DeviceId::new(), 2).is_err());
    }

    #[test]
    fn reinstall_clears_zone_registration() {
        let (mut system, mut host, device, _) = setup();
        system.activate(device, ActorId::new(), &mut host).unwrap();
        let record = system.install(device, profile());
        assert_eq!(record.state.state_type(), DeviceStateType::Idle);
        assert_eq!(system.registry().zone_of_active(device), None);
    }

    #[test]
    fn zone_pause_is_forwarded() {
        let (mut system, mut host, device, zone) = setup();
        system.activate(device, ActorId::new(), &mut host).unwrap();
        system.set_zone_paused(zone, true);
        system.tick(secs(1), &mut host).unwrap();
        assert_eq!(system.zone_time(zone), Some(Duration::ZERO));
        system.set_zone_paused(zone, false);
        system.tick(secs(1), &mut host).unwrap();
        assert_eq!(system.zone_time(zone), Some(secs(1)));
    }
}
