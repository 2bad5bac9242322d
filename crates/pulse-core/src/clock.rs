//! Per-zone clocks and the registry that owns them.
//!
//! Every zone keeps its own time accumulator. Device deadlines are absolute
//! offsets on that accumulator, so pausing a zone freezes all of its devices
//! together without disturbing their relative timing.
//!
//! # Design Principles
//!
//! - Zone time only moves forward, and only through [`ZoneRegistry::advance`].
//! - A zone clock references its active devices by id; it owns nothing.
//! - A device is active in at most one zone. The registry keeps a reverse
//!   index so the invariant is checked on every registration.
//! - Clocks are created lazily on first activation and discarded as a whole
//!   when the zone goes away or the session resets.

use std::collections::BTreeMap;
use std::time::Duration;

use pulse_types::{DeviceId, ZoneId};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The zone's time accumulator would overflow.
    #[error("zone {zone} clock overflow: cannot advance beyond Duration::MAX")]
    TimeOverflow {
        /// The zone whose clock overflowed.
        zone: ZoneId,
    },

    /// The device is already active in another zone.
    #[error("device {device} is active in zone {active_in}, cannot register it in zone {requested}")]
    AlreadyRegistered {
        /// The device being registered.
        device: DeviceId,
        /// The zone currently tracking the device.
        active_in: ZoneId,
        /// The zone the caller asked for.
        requested: ZoneId,
    },
}

/// The clock and active-device set of one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneClock {
    /// Accumulated zone time.
    current_time: Duration,

    /// Devices currently outside `Idle`, in activation order.
    active_devices: Vec<DeviceId>,

    /// Whether the host has suspended this zone.
    paused: bool,
}

impl ZoneClock {
    /// Create a clock at time zero with no active devices.
    pub const fn new() -> Self {
        Self {
            current_time: Duration::ZERO,
            active_devices: Vec::new(),
            paused: false,
        }
    }

    /// Return the accumulated zone time.
    pub const fn current_time(&self) -> Duration {
        self.current_time
    }

    /// Return the active devices in activation order.
    pub fn active_devices(&self) -> &[DeviceId] {
        &self.active_devices
    }

    /// Whether any device is active in this zone.
    pub fn has_active_devices(&self) -> bool {
        !self.active_devices.is_empty()
    }

    /// Whether `device` is in this zone's active set.
    pub fn is_active(&self, device: DeviceId) -> bool {
        self.active_devices.contains(&device)
    }

    /// Whether the zone is suspended.
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    fn advance(&mut self, zone: ZoneId, delta: Duration) -> Result<bool, ClockError> {
        if self.paused {
            return Ok(false);
        }
        self.current_time = self
            .current_time
            .checked_add(delta)
            .ok_or(ClockError::TimeOverflow { zone })?;
        Ok(true)
    }
}

/// Process-wide mapping of zone id to [`ZoneClock`].
///
/// The scheduler and the lifecycle paths are the only writers. Tests build
/// one registry per case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneRegistry {
    /// Known zones.
    zones: BTreeMap<ZoneId, ZoneClock>,

    /// Reverse index: active device -> zone tracking it.
    device_zones: BTreeMap<DeviceId, ZoneId>,
}

impl ZoneRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            zones: BTreeMap::new(),
            device_zones: BTreeMap::new(),
        }
    }

    /// Return the clock for `zone`, creating it at time zero if needed.
    pub fn get_or_create(&mut self, zone: ZoneId) -> &mut ZoneClock {
        self.zones.entry(zone).or_default()
    }

    /// Return the clock for `zone`, if the zone is tracked.
    pub fn get(&self, zone: ZoneId) -> Option<&ZoneClock> {
        self.zones.get(&zone)
    }

    /// Return the current time of `zone`, if the zone is tracked.
    pub fn current_time(&self, zone: ZoneId) -> Option<Duration> {
        self.zones.get(&zone).map(ZoneClock::current_time)
    }

    /// Advance `zone` by `delta`.
    ///
    /// Returns `Ok(false)` without touching the clock when the zone is
    /// paused or not tracked.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TimeOverflow`] if the accumulator would overflow.
    pub fn advance(&mut self, zone: ZoneId, delta: Duration) -> Result<bool, ClockError> {
        match self.zones.get_mut(&zone) {
            Some(clock) => clock.advance(zone, delta),
            None => Ok(false),
        }
    }

    /// Suspend or resume `zone`, creating its clock if needed.
    pub fn set_paused(&mut self, zone: ZoneId, paused: bool) {
        self.get_or_create(zone).paused = paused;
    }

    /// Add `device` to `zone`'s active set, creating the zone if needed.
    ///
    /// Registering a device that is already active in the same zone is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::AlreadyRegistered`] if the device is active in a
    /// different zone. Neither zone is modified in that case.
    pub fn register_active(&mut self, zone: ZoneId, device: DeviceId) -> Result<(), ClockError> {
        match self.device_zones.get(&device) {
            Some(&active_in) if active_in == zone => return Ok(()),
            Some(&active_in) => {
                return Err(ClockError::AlreadyRegistered {
                    device,
                    active_in,
                    requested: zone,
                });
            }
            None => {}
        }
        self.get_or_create(zone).active_devices.push(device);
        self.device_zones.insert(device, zone);
        Ok(())
    }

    /// Remove `device` from `zone`'s active set.
    ///
    /// Returns whether the device was registered there.
    pub fn deregister_active(&mut self, zone: ZoneId, device: DeviceId) -> bool {
        let Some(clock) = self.zones.get_mut(&zone) else {
            return false;
        };
        let before = clock.active_devices.len();
        clock.active_devices.retain(|id| *id != device);
        let removed = clock.active_devices.len() != before;
        if removed {
            self.device_zones.remove(&device);
        }
        removed
    }

    /// Remove `device` from whichever zone tracks it.
    ///
    /// Returns the zone it was removed from.
    pub fn deregister_device(&mut self, device: DeviceId) -> Option<ZoneId> {
        let zone = self.zone_of_active(device)?;
        self.deregister_active(zone, device);
        Some(zone)
    }

    /// Return the zone in which `device` is active.
    pub fn zone_of_active(&self, device: DeviceId) -> Option<ZoneId> {
        self.device_zones.get(&device).copied()
    }

    /// Discard `zone` and all of its bookkeeping.
    ///
    /// Returns the discarded clock, if the zone was tracked.
    pub fn clear_zone(&mut self, zone: ZoneId) -> Option<ZoneClock> {
        let clock = self.zones.remove(&zone)?;
        for device in &clock.active_devices {
            self.device_zones.remove(device);
        }
        Some(clock)
    }

    /// Discard every zone.
    pub fn clear_all(&mut self) {
        self.zones.clear();
        self.device_zones.clear();
    }

    /// Return the tracked zone ids in a stable order.
    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.zones.keys().copied().collect()
    }

    /// Number of tracked zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether no zone is tracked.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Number of devices active across all zones.
    pub fn active_device_count(&self) -> usize {
        self.device_zones.len()
    }
}
