//! Enumeration types shared between the pulse core and its hosts.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Device cycle
// ---------------------------------------------------------------------------

/// The phase of a pulse device's cycle.
///
/// Devices move strictly through
/// `Idle -> Priming -> Active -> CoolingDown -> Recharging -> Idle`, with a
/// shortcut from `Priming` straight to `Recharging` when the effect fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceStateType {
    /// Ready to be activated.
    Idle,
    /// Counting down to the effect.
    Priming,
    /// The effect is in force.
    Active,
    /// The effect has ended; the device is venting.
    CoolingDown,
    /// Recovering charge before it can be activated again.
    Recharging,
}

impl DeviceStateType {
    /// Whether the device is anywhere in its cycle other than `Idle`.
    pub const fn is_cycling(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl core::fmt::Display for DeviceStateType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Priming => "priming",
            Self::Active => "active",
            Self::CoolingDown => "cooling_down",
            Self::Recharging => "recharging",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Localization keys for every message the core asks a host to show.
///
/// The core never formats text itself. Hosts resolve [`MessageKey::as_str`]
/// against their own localization tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    /// Activation accepted; the device is priming.
    ActivateSuccess,
    /// Activation rejected because the device is priming or active.
    AlreadyActive,
    /// Activation rejected because the device is cooling down or recharging.
    Recharging,
    /// The effect fired and is now in force.
    EffectActive,
    /// The effect has ended and the device is cooling down.
    CoolingDown,
    /// Examine text for an idle device.
    ExaminedInactive,
    /// Examine text for a priming device.
    ExaminedStarting,
    /// Examine text for a cooling-down device.
    ExaminedCoolingDown,
    /// Examine text for a recharging device, with time left.
    ExaminedRecharging,
    /// Examine text for an active device, with time left.
    ExaminedActive,
    /// Upgrade examine line describing the delay multiplier.
    DelayUpgrade,
}

impl MessageKey {
    /// Return the localization key understood by hosts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActivateSuccess => "pulse-report-activate-success",
            Self::AlreadyActive => "pulse-report-already-active",
            Self::Recharging => "pulse-report-recharging",
            Self::EffectActive => "pulse-announcement-active",
            Self::CoolingDown => "pulse-announcement-cooling-down",
            Self::ExaminedInactive => "pulse-examined-inactive",
            Self::ExaminedStarting => "pulse-examined-starting",
            Self::ExaminedCoolingDown => "pulse-examined-cooling-down",
            Self::ExaminedRecharging => "pulse-examined-recharging",
            Self::ExaminedActive => "pulse-examined-active",
            Self::DelayUpgrade => "pulse-generator-delay-upgrade",
        }
    }
}

impl core::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean visual flags a host renders on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VisualFlag {
    /// Blinking ready light, lit while priming.
    PrimingBlink,
    /// Solid ready light, lit while the effect is active.
    Ready,
    /// Solid unready light, lit while recharging.
    Unready,
    /// Blinking unready light, lit while cooling down.
    UnreadyBlink,
}

impl VisualFlag {
    /// All flags, in the order hosts receive them.
    pub const ALL: [Self; 4] = [
        Self::PrimingBlink,
        Self::Ready,
        Self::Unready,
        Self::UnreadyBlink,
    ];

    /// Whether this flag is lit for a device in `state`.
    pub const fn is_lit(self, state: DeviceStateType) -> bool {
        matches!(
            (self, state),
            (Self::PrimingBlink, DeviceStateType::Priming)
                | (Self::Ready, DeviceStateType::Active)
                | (Self::Unready, DeviceStateType::Recharging)
                | (Self::UnreadyBlink, DeviceStateType::CoolingDown)
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The host's session run level.
///
/// Leaving [`RunLevel::InRound`] discards all zone bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RunLevel {
    /// Waiting for a round to start.
    PreRound,
    /// A round is being played.
    InRound,
    /// The round has ended.
    PostRound,
}
