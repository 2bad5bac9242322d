//! Device cycle transitions.
//!
//! | From                      | Trigger    | To                              |
//! |---------------------------|------------|---------------------------------|
//! | Idle                      | activation | Priming                         |
//! | Priming                   | deadline   | Active, or Recharging on failure|
//! | Active                    | deadline   | `CoolingDown`                   |
//! | `CoolingDown`             | deadline   | Recharging                      |
//! | Recharging                | deadline   | Idle                            |
//! | Priming / Active          | activation | unchanged, "already active"     |
//! | `CoolingDown` / Recharging| activation | unchanged, "recharging"         |
//!
//! New deadlines are always measured from the zone time at which the
//! transition happens. Presentation work is returned as [`Cue`] values;
//! only the effect itself is dispatched synchronously, because its outcome
//! decides the next phase.

use std::time::Duration;

use pulse_types::{ActorId, CycleState, DeviceId, DeviceStateType, MessageKey, VisualFlag, ZoneId};
use tracing::{debug, warn};

use crate::charge;
use crate::clock::{ClockError, ZoneRegistry};
use crate::device::DeviceRecord;
use crate::host::{Cue, EffectDispatcher, MessageArg, Visual, ZoneResolver};

/// Errors that reject an activation request.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// The device is not inside any zone. Devices must never be interactable
    /// without a zone, so this indicates a host bug.
    #[error("device {device} has no zone")]
    NoZone {
        /// The device that was activated.
        device: DeviceId,
    },

    /// No record exists for the device.
    #[error("unknown device {device}")]
    UnknownDevice {
        /// The device that was activated.
        device: DeviceId,
    },

    /// The zone registry refused the registration.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Outcome of an accepted activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The device started priming.
    Started {
        /// Zone the device was registered in.
        zone: ZoneId,
        /// Zone time at which priming ends.
        until: Duration,
    },
    /// The device is priming or active; nothing changed.
    AlreadyActive,
    /// The device is cooling down or recharging; nothing changed.
    Recharging,
}

/// Handle an activation request from `actor`.
///
/// An idle device resolves its zone, registers with that zone's clock and
/// starts priming. Any other phase leaves the device untouched and only
/// produces a popup.
///
/// # Errors
///
/// Returns [`ActivationError::NoZone`] if an idle device has no zone, or
/// [`ActivationError::Clock`] if the device is still registered elsewhere.
/// The device is unchanged on error.
pub fn activate(
    device: DeviceId,
    record: &mut DeviceRecord,
    actor: ActorId,
    resolver: &dyn ZoneResolver,
    registry: &mut ZoneRegistry,
    cues: &mut Vec<Cue>,
) -> Result<Activation, ActivationError> {
    let outcome = match record.state.cycle {
        CycleState::Idle => start_priming(device, record, actor, resolver, registry, cues)?,
        CycleState::Priming { .. } | CycleState::Active { .. } => {
            cues.push(popup(device, MessageKey::AlreadyActive, actor));
            Activation::AlreadyActive
        }
        CycleState::CoolingDown { .. } | CycleState::Recharging { .. } => {
            cues.push(popup(device, MessageKey::Recharging, actor));
            Activation::Recharging
        }
    };
    push_appearance(device, record.state.state_type(), cues);
    Ok(outcome)
}

fn start_priming(
    device: DeviceId,
    record: &mut DeviceRecord,
    actor: ActorId,
    resolver: &dyn ZoneResolver,
    registry: &mut ZoneRegistry,
    cues: &mut Vec<Cue>,
) -> Result<Activation, ActivationError> {
    let zone = resolver
        .zone_of(device)
        .ok_or(ActivationError::NoZone { device })?;
    registry.register_active(zone, device)?;
    let now = registry.current_time(zone).unwrap_or_default();
    let until = now.saturating_add(record.state.priming_duration);

    record.state.cycle = CycleState::Priming { until };
    record.zone = Some(zone);
    debug!(%device, %zone, ?until, "Device priming");

    cues.push(popup(device, MessageKey::ActivateSuccess, actor));
    cues.push(Cue::Sound {
        device,
        sound: record.profile.activated_sound.clone(),
    });
    cues.push(Cue::Activated { device });
    cues.push(report(
        device,
        record,
        MessageKey::ActivateSuccess,
        vec![MessageArg::Zone(zone)],
    ));
    Ok(Activation::Started { zone, until })
}

/// Advance a device whose deadline has passed by exactly one phase.
///
/// `now` is the current time of the device's zone. Returns the phase the
/// device ends up in. Idle devices are left alone.
pub fn transition(
    device: DeviceId,
    record: &mut DeviceRecord,
    now: Duration,
    effects: &mut dyn EffectDispatcher,
    cues: &mut Vec<Cue>,
) -> DeviceStateType {
    let from = record.state.state_type();
    let next = match record.state.cycle {
        CycleState::Idle => return DeviceStateType::Idle,
        CycleState::Priming { .. } => match effects.fire_effect(device, &record.profile.effect) {
            Ok(()) => {
                cues.push(report(
                    device,
                    record,
                    MessageKey::EffectActive,
                    vec![MessageArg::TimeLeft(record.state.active_duration)],
                ));
                CycleState::Active {
                    until: now.saturating_add(record.state.active_duration),
                }
            }
            Err(err) => {
                warn!(%device, %err, "Effect failed, skipping to recharge");
                CycleState::Recharging {
                    until: now.saturating_add(record.state.cooldown_duration),
                }
            }
        },
        CycleState::Active { .. } => {
            cues.push(report(
                device,
                record,
                MessageKey::CoolingDown,
                vec![MessageArg::TimeLeft(record.state.cooling_down_duration)],
            ));
            CycleState::CoolingDown {
                until: now.saturating_add(record.state.cooling_down_duration),
            }
        }
        // Recharge is not announced, to keep the channel quiet.
        CycleState::CoolingDown { .. } => CycleState::Recharging {
            until: now.saturating_add(record.state.cooldown_duration),
        },
        CycleState::Recharging { .. } => CycleState::Idle,
    };
    record.state.cycle = next;

    let to = record.state.state_type();
    if to == DeviceStateType::Idle {
        record.zone = None;
    }
    debug!(%device, %from, %to, until = ?record.state.cycle.until(), "Device transitioned");
    push_appearance(device, to, cues);
    if let Some(level) = charge::refresh(&mut record.state, now) {
        cues.push(Cue::Visual {
            device,
            visual: Visual::Charge(level),
        });
    }
    to
}

/// Visual flag cues matching `state`.
pub fn push_appearance(device: DeviceId, state: DeviceStateType, cues: &mut Vec<Cue>) {
    cues.extend(VisualFlag::ALL.into_iter().map(|flag| Cue::Visual {
        device,
        visual: Visual::Flag {
            flag,
            lit: flag.is_lit(state),
        },
    }));
}

const fn popup(device: DeviceId, message: MessageKey, target: ActorId) -> Cue {
    Cue::Popup {
        device,
        message,
        target,
    }
}

fn report(device: DeviceId, record: &DeviceRecord, message: MessageKey, args: Vec<MessageArg>) -> Cue {
    Cue::Notify {
        device,
        channel: record.profile.channel.clone(),
        message,
        args,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::PulseConfig;
    use crate::device::DeviceProfile;
    use crate::host::RecordingHost;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn record() -> DeviceRecord {
        let mut profile = DeviceProfile::from_config(&PulseConfig::default()).unwrap();
        profile.base_priming = secs(5);
        profile.active = secs(10);
        profile.cooling_down = secs(4);
        profile.base_cooldown = secs(20);
        DeviceRecord {
            state: profile.initial_state(),
            profile,
            zone: None,
        }
    }

    fn placed() -> (DeviceId, ZoneId, RecordingHost) {
        let device = DeviceId::new();
        let zone = ZoneId::new();
        let mut host = RecordingHost::new();
        host.place(device, zone);
        (device, zone, host)
    }

    fn popups(cues: &[Cue]) -> Vec<MessageKey> {
        cues.iter()
            .filter_map(|cue| match cue {
                Cue::Popup { message, .. } => Some(*message),
                _ => None,
            })
            .collect()
    }

    fn reports(cues: &[Cue]) -> Vec<MessageKey> {
        cues.iter()
            .filter_map(|cue| match cue {
                Cue::Notify { message, .. } => Some(*message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn idle_activation_starts_priming() {
        let (device, zone, host) = placed();
        let mut registry = ZoneRegistry::new();
        let mut device_record = record();
        let mut cues = Vec::new();

        let outcome = activate(
            device,
            &mut device_record,
            ActorId::new(),
            &host,
            &mut registry,
            &mut cues,
        )
        .unwrap();

        assert_eq!(outcome, Activation::Started { zone, until: secs(5) });
        assert_eq!(device_record.state.cycle, CycleState::Priming { until: secs(5) });
        assert_eq!(device_record.zone, Some(zone));
        assert_eq!(registry.zone_of_active(device), Some(zone));
        assert_eq!(popups(&cues), vec![MessageKey::ActivateSuccess]);
        assert_eq!(reports(&cues), vec![MessageKey::ActivateSuccess]);
        assert!(cues.iter().any(|cue| matches!(cue, Cue::Sound { .. })));
        assert!(cues.iter().any(|cue| matches!(cue, Cue::Activated { .. })));
    }

    #[test]
    fn priming_deadline_is_offset_from_zone_time() {
        let (device, zone, host) = placed();
        let mut registry = ZoneRegistry::new();
        registry.get_or_create(zone);
        registry.advance(zone, secs(100)).unwrap();
        let mut device_record = record();

        activate(
            device,
            &mut device_record,
            ActorId::new(),
            &host,
            &mut registry,
            &mut Vec::new(),
        )
        .unwrap();
        assert_eq!(device_record.state.cycle.until(), Some(secs(105)));
    }

    #[test]
    fn activation_without_zone_is_rejected() {
        let host = RecordingHost::new();
        let mut registry = ZoneRegistry::new();
        let mut device_record = record();
        let mut cues = Vec::new();

        let result = activate(
            DeviceId::new(),
            &mut device_record,
            ActorId::new(),
            &host,
            &mut registry,
            &mut cues,
        );
        assert!(matches!(result, Err(ActivationError::NoZone { .. })));
        assert_eq!(device_record.state.state_type(), DeviceStateType::Idle);
        assert!(registry.is_empty());
        assert!(cues.is_empty());
    }

    #[test]
    fn repeated_activation_is_idempotent() {
        let (device, _zone, host) = placed();
        let mut registry = ZoneRegistry::new();
        let mut device_record = record();
        let actor = ActorId::new();
        activate(device, &mut device_record, actor, &host, &mut registry, &mut Vec::new()).unwrap();
        let before = device_record.state.clone();

        let mut cues = Vec::new();
        let outcome =
            activate(device, &mut device_record, actor, &host, &mut registry, &mut cues).unwrap();
        assert_eq!(outcome, Activation::AlreadyActive);
        assert_eq!(device_record.state, before);
        assert_eq!(popups(&cues), vec![MessageKey::AlreadyActive]);
        assert!(reports(&cues).is_empty());
    }

    #[test]
    fn activation_while_recharging_is_refused() {
        let (device, _zone, host) = placed();
        let mut registry = ZoneRegistry::new();
        let mut device_record = record();
        device_record.state.cycle = CycleState::CoolingDown { until: secs(3) };

        let mut cues = Vec::new();
        let outcome = activate(
            device,
            &mut device_record,
            ActorId::new(),
            &host,
            &mut registry,
            &mut cues,
        )
        .unwrap();
        assert_eq!(outcome, Activation::Recharging);
        assert_eq!(popups(&cues), vec![MessageKey::Recharging]);
        assert_eq!(device_record.state.cycle, CycleState::CoolingDown { until: secs(3) });
    }

    #[test]
    fn full_cycle_advances_one_phase_per_call() {
        let device = DeviceId::new();
        let mut host = RecordingHost::new();
        let mut device_record = record();
        device_record.state.cycle = CycleState::Priming { until: secs(5) };
        let mut cues = Vec::new();

        let to = transition(device, &mut device_record, secs(5), &mut host, &mut cues);
        assert_eq!(to, DeviceStateType::Active);
        assert_eq!(device_record.state.cycle, CycleState::Active { until: secs(15) });
        assert_eq!(host.fired().len(), 1);

        let to = transition(device, &mut device_record, secs(15), &mut host, &mut cues);
        assert_eq!(to, DeviceStateType::CoolingDown);
        assert_eq!(device_record.state.cycle.until(), Some(secs(19)));

        let to = transition(device, &mut device_record, secs(19), &mut host, &mut cues);
        assert_eq!(to, DeviceStateType::Recharging);
        assert_eq!(device_record.state.cycle.until(), Some(secs(39)));

        let to = transition(device, &mut device_record, secs(39), &mut host, &mut cues);
        assert_eq!(to, DeviceStateType::Idle);
        assert_eq!(device_record.state.cycle.until(), None);
        assert_eq!(device_record.zone, None);

        // Cooling down is announced, recharging is not.
        assert_eq!(
            reports(&cues),
            vec![MessageKey::EffectActive, MessageKey::CoolingDown]
        );
    }

    #[test]
    fn failed_effect_skips_to_recharging() {
        let device = DeviceId::new();
        let mut host = RecordingHost::new();
        host.set_effect_fails(device, true);
        let mut device_record = record();
        device_record.state.cycle = CycleState::Priming { until: secs(5) };
        let mut cues = Vec::new();

        let to = transition(device, &mut device_record, secs(6), &mut host, &mut cues);
        assert_eq!(to, DeviceStateType::Recharging);
        assert_eq!(device_record.state.cycle, CycleState::Recharging { until: secs(26) });
        assert!(reports(&cues).is_empty());
    }

    #[test]
    fn idle_transition_is_noop() {
        let device = DeviceId::new();
        let mut host = RecordingHost::new();
        let mut device_record = record();
        let mut cues = Vec::new();

        assert_eq!(
            transition(device, &mut device_record, secs(1), &mut host, &mut cues),
            DeviceStateType::Idle
        );
        assert!(cues.is_empty());
        assert!(host.fired().is_empty());
    }

    #[test]
    fn transition_updates_appearance_flags() {
        let device = DeviceId::new();
        let mut host = RecordingHost::new();
        let mut device_record = record();
        device_record.state.cycle = CycleState::Active { until: secs(10) };
        let mut cues = Vec::new();

        transition(device, &mut device_record, secs(10), &mut host, &mut cues);
        let lit: Vec<VisualFlag> = cues
            .iter()
            .filter_map(|cue| match cue {
                Cue::Visual {
                    visual: Visual::Flag { flag, lit: true },
                    ..
                } => Some(*flag),
                _ => None,
            })
            .collect();
        assert_eq!(lit, vec![VisualFlag::UnreadyBlink]);
    }
}
