//! Per-device records and the read-only inspection snapshot.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enums::{DeviceStateType, MessageKey};
use crate::ids::DeviceId;

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Charge indicator level shown by an idle device.
///
/// Idle is the fixed minimum rather than a full indicator, so the
/// `Recharging` to `Idle` tick shows capacity and then drops to this level.
pub const IDLE_CHARGE: u32 = 0;

/// Where a device is in its cycle, together with the zone-time deadline of
/// the current phase.
///
/// `Idle` carries no deadline, every other phase always does. Deadlines are
/// absolute offsets on the owning zone's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleState {
    /// Ready to be activated.
    #[default]
    Idle,
    /// Counting down to the effect.
    Priming {
        /// Zone time at which priming ends.
        until: Duration,
    },
    /// The effect is in force.
    Active {
        /// Zone time at which the effect ends.
        until: Duration,
    },
    /// Venting after the effect.
    CoolingDown {
        /// Zone time at which cooling down ends.
        until: Duration,
    },
    /// Recovering charge.
    Recharging {
        /// Zone time at which the device becomes idle again.
        until: Duration,
    },
}

impl CycleState {
    /// The phase without its deadline.
    pub const fn state_type(self) -> DeviceStateType {
        match self {
            Self::Idle => DeviceStateType::Idle,
            Self::Priming { .. } => DeviceStateType::Priming,
            Self::Active { .. } => DeviceStateType::Active,
            Self::CoolingDown { .. } => DeviceStateType::CoolingDown,
            Self::Recharging { .. } => DeviceStateType::Recharging,
        }
    }

    /// The deadline of the current phase, `None` while idle.
    pub const fn until(self) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::Priming { until }
            | Self::Active { until }
            | Self::CoolingDown { until }
            | Self::Recharging { until } => Some(until),
        }
    }

    /// Whether the current phase has run out at zone time `now`.
    ///
    /// An idle device never expires.
    pub fn is_expired(self, now: Duration) -> bool {
        self.until().is_some_and(|until| until <= now)
    }

    /// Time left in the current phase, saturating at zero.
    pub fn remaining(self, now: Duration) -> Option<Duration> {
        self.until().map(|until| until.saturating_sub(now))
    }
}

// ---------------------------------------------------------------------------
// Device state
// ---------------------------------------------------------------------------

/// The complete timing record of one device.
///
/// Effective durations are derived from the base durations and the current
/// upgrade rating; they only influence deadlines computed after they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Current phase and its deadline.
    pub cycle: CycleState,
    /// Effective priming duration.
    pub priming_duration: Duration,
    /// How long the effect stays active.
    pub active_duration: Duration,
    /// How long the device vents after the effect.
    pub cooling_down_duration: Duration,
    /// Effective recharge duration.
    pub cooldown_duration: Duration,
    /// Priming duration at upgrade rating 1.
    pub base_priming_duration: Duration,
    /// Recharge duration at upgrade rating 1.
    pub base_cooldown_duration: Duration,
    /// Multiplier applied once per upgrade rating above 1.
    pub rating_delay_factor: f32,
    /// Number of discrete charge indicator levels (at least 1).
    pub charge_capacity: u32,
    /// Last computed charge indicator level.
    pub charge_remaining: u32,
    /// Charge level last pushed to the host.
    pub previous_charge_remaining: u32,
}

impl DeviceState {
    /// The phase without its deadline.
    pub const fn state_type(&self) -> DeviceStateType {
        self.cycle.state_type()
    }

    /// Drop the device out of its cycle, bypassing the transition table.
    ///
    /// The charge indicator returns to [`IDLE_CHARGE`] so a later cycle does
    /// not start from a level left over from this one.
    pub const fn force_idle(&mut self) {
        self.cycle = CycleState::Idle;
        self.charge_remaining = IDLE_CHARGE;
        self.previous_charge_remaining = IDLE_CHARGE;
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Read-only snapshot of a device for examine text and tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// The device described.
    pub device: DeviceId,
    /// Current phase.
    pub state_type: DeviceStateType,
    /// Time left in the current phase; `None` when idle or when the device's
    /// zone is not tracked.
    pub remaining: Option<Duration>,
    /// `cooldown / base_cooldown`, shown as the upgrade percentage.
    pub delay_multiplier: f32,
}

/// One line of examine text: a message key and its optional time argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamineLine {
    /// Localization key.
    pub key: MessageKey,
    /// Whole seconds left, rounded up.
    pub time_left_seconds: Option<u64>,
}

impl DeviceStatus {
    /// Pick the examine line for this snapshot.
    ///
    /// Active and recharging devices report their time left, so they yield
    /// nothing when the remaining time is unknown.
    pub fn examine(&self) -> Option<ExamineLine> {
        let plain = |key| {
            Some(ExamineLine {
                key,
                time_left_seconds: None,
            })
        };
        match self.state_type {
            DeviceStateType::Idle => plain(MessageKey::ExaminedInactive),
            DeviceStateType::Priming => plain(MessageKey::ExaminedStarting),
            DeviceStateType::CoolingDown => plain(MessageKey::ExaminedCoolingDown),
            DeviceStateType::Recharging => self.timed(MessageKey::ExaminedRecharging),
            DeviceStateType::Active => self.timed(MessageKey::ExaminedActive),
        }
    }

    fn timed(&self, key: MessageKey) -> Option<ExamineLine> {
        let remaining = self.remaining?;
        Some(ExamineLine {
            key,
            time_left_seconds: Some(ceil_seconds(remaining)),
        })
    }
}

/// Whole seconds in `duration`, rounding any fraction up.
pub const fn ceil_seconds(duration: Duration) -> u64 {
    if duration.subsec_nanos() == 0 {
        duration.as_secs()
    } else {
        duration.as_secs().saturating_add(1)
    }
}
