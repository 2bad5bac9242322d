//! Collaborator traits and the cues the core hands to them.
//!
//! The core never renders, localizes or applies effects itself. A host world
//! plugs in through three narrow traits:
//!
//! - [`ZoneResolver`] -- which zone a device currently sits in.
//! - [`EffectDispatcher`] -- fire a device's effect, possibly failing.
//! - [`Presenter`] -- notifications, popups, visuals and sounds.
//!
//! Anything that implements all three is a [`Host`]. The state machine
//! describes presentation work as [`Cue`] values; the facade delivers them
//! to the host in the order they were produced.
//!
//! [`RecordingHost`] is an in-memory host used by tests and tooling.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use pulse_types::{ActorId, DeviceId, MessageKey, VisualFlag, ZoneId};

/// Fixed parameters of a device's effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectSpec {
    /// Energy drained from everything in range.
    pub magnitude: f32,
    /// Radius in world units.
    pub radius: f32,
    /// How long affected equipment stays disabled.
    pub duration: Duration,
}

/// Errors an effect collaborator may report.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// The effect could not be applied.
    #[error("effect for device {device} failed: {reason}")]
    Failed {
        /// The device whose effect failed.
        device: DeviceId,
        /// Host-provided description.
        reason: String,
    },
}

/// A formatting argument attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageArg {
    /// The zone the device sits in (`grid` in localization tables).
    Zone(ZoneId),
    /// A duration, shown in whole seconds (`timeLeft`).
    TimeLeft(Duration),
}

impl MessageArg {
    /// Placeholder name used by localization tables.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Zone(_) => "grid",
            Self::TimeLeft(_) => "timeLeft",
        }
    }
}

/// A presentation update for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visual {
    /// A boolean indicator light.
    Flag {
        /// Which light.
        flag: VisualFlag,
        /// Whether it is lit.
        lit: bool,
    },
    /// The quantized charge level.
    Charge(u32),
}

/// A request for presentation work, produced by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    /// Broadcast a message on a channel.
    Notify {
        /// Source device.
        device: DeviceId,
        /// Channel name.
        channel: String,
        /// Localization key.
        message: MessageKey,
        /// Formatting arguments.
        args: Vec<MessageArg>,
    },
    /// Show a popup to one actor.
    Popup {
        /// Source device.
        device: DeviceId,
        /// Localization key.
        message: MessageKey,
        /// Who sees the popup.
        target: ActorId,
    },
    /// Update a visual on the device.
    Visual {
        /// Target device.
        device: DeviceId,
        /// The update.
        visual: Visual,
    },
    /// Play a sound at the device.
    Sound {
        /// Source device.
        device: DeviceId,
        /// Sound resource.
        sound: String,
    },
    /// The device has just been activated.
    Activated {
        /// The activated device.
        device: DeviceId,
    },
}

impl Cue {
    /// The device this cue concerns.
    pub const fn device(&self) -> DeviceId {
        match self {
            Self::Notify { device, .. }
            | Self::Popup { device, .. }
            | Self::Visual { device, .. }
            | Self::Sound { device, .. }
            | Self::Activated { device } => *device,
        }
    }

    /// Hand this cue to `presenter`.
    pub fn deliver<P: Presenter + ?Sized>(&self, presenter: &mut P) {
        match self {
            Self::Notify {
                device,
                channel,
                message,
                args,
            } => presenter.notify(*device, channel, *message, args),
            Self::Popup {
                device,
                message,
                target,
            } => presenter.popup(*device, *message, *target),
            Self::Visual { device, visual } => presenter.set_visual(*device, *visual),
            Self::Sound { device, sound } => presenter.play_sound(*device, sound),
            Self::Activated { device } => presenter.activated(*device),
        }
    }
}

/// Resolves the zone a device is placed in.
pub trait ZoneResolver {
    /// Return the zone of `device`, or `None` if it is not inside any zone.
    fn zone_of(&self, device: DeviceId) -> Option<ZoneId>;
}

/// Applies device effects in the host world.
pub trait EffectDispatcher {
    /// Fire the effect of `device`.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError`] if the effect did not take place. The core
    /// never retries within the same cycle.
    fn fire_effect(&mut self, device: DeviceId, effect: &EffectSpec) -> Result<(), EffectError>;
}

/// Fire-and-forget presentation sink.
///
/// None of these calls can fail from the core's point of view.
pub trait Presenter {
    /// Broadcast `message` on `channel`.
    fn notify(&mut self, device: DeviceId, channel: &str, message: MessageKey, args: &[MessageArg]);

    /// Show `message` to `target`.
    fn popup(&mut self, device: DeviceId, message: MessageKey, target: ActorId);

    /// Update a visual on `device`.
    fn set_visual(&mut self, device: DeviceId, visual: Visual);

    /// Play `sound` at `device`.
    fn play_sound(&mut self, device: DeviceId, sound: &str);

    /// Observe a successful activation. Ignored by default.
    fn activated(&mut self, device: DeviceId) {
        let _ = device;
    }
}

/// Everything the core needs from its host world.
pub trait Host: ZoneResolver + EffectDispatcher + Presenter {}

impl<T: ZoneResolver + EffectDispatcher + Presenter + ?Sized> Host for T {}

/// In-memory [`Host`] that records every call.
///
/// Devices are placed into zones explicitly; effects succeed unless the
/// device has been marked as failing.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    /// Device placement.
    placements: BTreeMap<DeviceId, ZoneId>,
    /// Devices whose effect fails.
    failing: BTreeSet<DeviceId>,
    /// Effects fired, in order.
    fired: Vec<(DeviceId, EffectSpec)>,
    /// Cues received, in order.
    cues: Vec<Cue>,
}

impl RecordingHost {
    /// Create a host with no placements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `device` in `zone`.
    pub fn place(&mut self, device: DeviceId, zone: ZoneId) {
        self.placements.insert(device, zone);
    }

    /// Take `device` out of every zone.
    pub fn unplace(&mut self, device: DeviceId) {
        self.placements.remove(&device);
    }

    /// Make the effect of `device` fail (or succeed again).
    pub fn set_effect_fails(&mut self, device: DeviceId, fails: bool) {
        if fails {
            self.failing.insert(device);
        } else {
            self.failing.remove(&device);
        }
    }

    /// Effects fired so far.
    pub fn fired(&self) -> &[(DeviceId, EffectSpec)] {
        &self.fired
    }

    /// Cues received so far.
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Drain the recorded cues.
    pub fn take_cues(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }

    /// Message keys broadcast by `device`, in order.
    pub fn notifications(&self, device: DeviceId) -> Vec<MessageKey> {
        self.cues
            .iter()
            .filter_map(|cue| match cue {
                Cue::Notify {
                    device: source,
                    message,
                    ..
                } if *source == device => Some(*message),
                _ => None,
            })
            .collect()
    }

    /// Message keys shown as popups for `device`, in order.
    pub fn popups(&self, device: DeviceId) -> Vec<MessageKey> {
        self.cues
            .iter()
            .filter_map(|cue| match cue {
                Cue::Popup {
                    device: source,
                    message,
                    ..
                } if *source == device => Some(*message),
                _ => None,
            })
            .collect()
    }

    /// Charge levels pushed to `device`, in order.
    pub fn charge_levels(&self, device: DeviceId) -> Vec<u32> {
        self.cues
            .iter()
            .filter_map(|cue| match cue {
                Cue::Visual {
                    device: target,
                    visual: Visual::Charge(level),
                } if *target == device => Some(*level),
                _ => None,
            })
            .collect()
    }
}

impl ZoneResolver for RecordingHost {
    fn zone_of(&self, device: DeviceId) -> Option<ZoneId> {
        self.placements.get(&device).copied()
    }
}

impl EffectDispatcher for RecordingHost {
    fn fire_effect(&mut self, device: DeviceId, effect: &EffectSpec) -> Result<(), EffectError> {
        self.fired.push((device, *effect));
        if self.failing.contains(&device) {
            return Err(EffectError::Failed {
                device,
                reason: "marked as failing".to_owned(),
            });
        }
        Ok(())
    }
}

impl Presenter for RecordingHost {
    fn notify(&mut self, device: DeviceId, channel: &str, message: MessageKey, args: &[MessageArg]) {
        self.cues.push(Cue::Notify {
            device,
            channel: channel.to_owned(),
            message,
            args: args.to_vec(),
        });
    }

    fn popup(&mut self, device: DeviceId, message: MessageKey, target: ActorId) {
        self.cues.push(Cue::Popup {
            device,
            message,
            target,
        });
    }

    fn set_visual(&mut self, device: DeviceId, visual: Visual) {
        self.cues.push(Cue::Visual { device, visual });
    }

    fn play_sound(&mut self, device: DeviceId, sound: &str) {
        self.cues.push(Cue::Sound {
            device,
            sound: sound.to_owned(),
        });
    }

    fn activated(&mut self, device: DeviceId) {
        self.cues.push(Cue::Activated { device });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spec() -> EffectSpec {
        EffectSpec {
            magnitude: 1.0,
            radius: 2.0,
            duration: Duration::from_secs(3),
        }
    }

    #[test]
    fn delivered_cues_are_recorded_verbatim() {
        let mut host = RecordingHost::new();
        let device = DeviceId::new();
        let cues = vec![
            Cue::Popup {
                device,
                message: MessageKey::AlreadyActive,
                target: ActorId::new(),
            },
            Cue::Visual {
                device,
                visual: Visual::Charge(3),
            },
            Cue::Notify {
                device,
                channel: "Security".to_owned(),
                message: MessageKey::CoolingDown,
                args: vec![MessageArg::TimeLeft(Duration::from_secs(30))],
            },
            Cue::Sound {
                device,
                sound: "beep".to_owned(),
            },
            Cue::Activated { device },
        ];
        for cue in &cues {
            cue.deliver(&mut host);
        }
        assert_eq!(host.cues(), cues.as_slice());
        assert_eq!(host.notifications(device), vec![MessageKey::CoolingDown]);
        assert_eq!(host.popups(device), vec![MessageKey::AlreadyActive]);
        assert_eq!(host.charge_levels(device), vec![3]);
    }

    #[test]
    fn placement_drives_zone_resolution() {
        let mut host = RecordingHost::new();
        let device = DeviceId::new();
        let zone = ZoneId::new();
        assert_eq!(host.zone_of(device), None);
        host.place(device, zone);
        assert_eq!(host.zone_of(device), Some(zone));
        host.unplace(device);
        assert_eq!(host.zone_of(device), None);
    }

    #[test]
    fn failing_devices_report_errors() {
        let mut host = RecordingHost::new();
        let device = DeviceId::new();
        assert!(host.fire_effect(device, &spec()).is_ok());
        host.set_effect_fails(device, true);
        assert!(host.fire_effect(device, &spec()).is_err());
        assert_eq!(host.fired().len(), 2);
    }

    #[test]
    fn arg_names_match_localization_placeholders() {
        assert_eq!(MessageArg::Zone(ZoneId::new()).name(), "grid");
        assert_eq!(MessageArg::TimeLeft(Duration::ZERO).name(), "timeLeft");
    }
}
