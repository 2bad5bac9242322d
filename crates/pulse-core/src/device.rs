//! Device records owned by the core.
//!
//! Each installed device has a [`DeviceRecord`]: its timing state, the
//! profile it was installed with and the zone it is currently cycling in.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::time::Duration;

use pulse_types::{CycleState, DeviceId, DeviceState, ZoneId};

use crate::charge::IDLE_CHARGE;
use crate::config::{ConfigError, PulseConfig};
use crate::host::EffectSpec;

/// Errors for operations addressed to a single device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// No record exists for the device.
    #[error("unknown device {device}")]
    UnknownDevice {
        /// The device that was looked up.
        device: DeviceId,
    },
}

/// Static parameters a device is installed with.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    /// Priming time at upgrade rating 1.
    pub base_priming: Duration,
    /// Time the effect stays active.
    pub active: Duration,
    /// Venting time after the effect.
    pub cooling_down: Duration,
    /// Recharge time at upgrade rating 1.
    pub base_cooldown: Duration,
    /// Per-rating delay factor.
    pub rating_delay_factor: f32,
    /// Charge indicator levels.
    pub charge_capacity: u32,
    /// Broadcast channel for reports.
    pub channel: String,
    /// Sound played on activation.
    pub activated_sound: String,
    /// Effect parameters.
    pub effect: EffectSpec,
}

impl DeviceProfile {
    /// Build the default profile described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a configured duration is unusable.
    pub fn from_config(config: &PulseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let device = &config.device;
        Ok(Self {
            base_priming: device.base_priming()?,
            active: device.active()?,
            cooling_down: device.cooling_down()?,
            base_cooldown: device.base_cooldown()?,
            rating_delay_factor: device.rating_delay_factor,
            charge_capacity: device.charge_capacity,
            channel: device.channel.clone(),
            activated_sound: device.activated_sound.clone(),
            effect: EffectSpec {
                magnitude: config.effect.magnitude,
                radius: config.effect.radius,
                duration: config.effect.duration()?,
            },
        })
    }

    /// Fresh idle state at upgrade rating 1.
    pub fn initial_state(&self) -> DeviceState {
        DeviceState {
            cycle: CycleState::Idle,
            priming_duration: self.base_priming,
            active_duration: self.active,
            cooling_down_duration: self.cooling_down,
            cooldown_duration: self.base_cooldown,
            base_priming_duration: self.base_priming,
            base_cooldown_duration: self.base_cooldown,
            rating_delay_factor: self.rating_delay_factor,
            charge_capacity: self.charge_capacity.max(1),
            charge_remaining: IDLE_CHARGE,
            previous_charge_remaining: IDLE_CHARGE,
        }
    }
}

/// One installed device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Timing and cycle state.
    pub state: DeviceState,
    /// Installation parameters.
    pub profile: DeviceProfile,
    /// Zone the device is cycling in; `None` while idle.
    pub zone: Option<ZoneId>,
}

/// All installed devices, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceTable {
    records: BTreeMap<DeviceId, DeviceRecord>,
}

impl DeviceTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Install `device` with `profile`, replacing any previous record.
    pub fn install(&mut self, device: DeviceId, profile: DeviceProfile) -> &mut DeviceRecord {
        let record = DeviceRecord {
            state: profile.initial_state(),
            profile,
            zone: None,
        };
        match self.records.entry(device) {
            Entry::Occupied(mut slot) => {
                slot.insert(record);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(record),
        }
    }

    /// Look up a device.
    pub fn get(&self, device: DeviceId) -> Option<&DeviceRecord> {
        self.records.get(&device)
    }

    /// Look up a device mutably.
    pub fn get_mut(&mut self, device: DeviceId) -> Option<&mut DeviceRecord> {
        self.records.get_mut(&device)
    }

    /// Look up a device, failing with [`DeviceError::UnknownDevice`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnknownDevice`] if no record exists.
    pub fn require(&self, device: DeviceId) -> Result<&DeviceRecord, DeviceError> {
        self.get(device).ok_or(DeviceError::UnknownDevice { device })
    }

    /// Look up a device mutably, failing with [`DeviceError::UnknownDevice`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnknownDevice`] if no record exists.
    pub fn require_mut(&mut self, device: DeviceId) -> Result<&mut DeviceRecord, DeviceError> {
        self.get_mut(device).ok_or(DeviceError::UnknownDevice { device })
    }

    /// Remove a device's record.
    pub fn remove(&mut self, device: DeviceId) -> Option<DeviceRecord> {
        self.records.remove(&device)
    }

    /// Every record, mutably, in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DeviceId, &mut DeviceRecord)> {
        self.records.iter_mut().map(|(id, record)| (*id, record))
    }

    /// Every record in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &DeviceRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Number of installed devices.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no device is installed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
