//! Charge indicator quantization.
//!
//! The charge indicator is display-only. It is derived from the time left in
//! the current phase and split into `charge_capacity` levels:
//!
//! - `Idle` shows the fixed minimum, [`IDLE_CHARGE`].
//! - `Active` counts down from capacity to zero as the deadline approaches.
//! - `CoolingDown` is forced to zero.
//! - `Recharging` counts up from zero to capacity.
//! - `Priming` holds whatever was shown before.

use std::time::Duration;

pub use pulse_types::IDLE_CHARGE;
use pulse_types::{CycleState, DeviceState};

/// Compute the indicator level for `state` at zone time `now`.
///
/// The result is always within `0..=charge_capacity`.
pub fn quantize(state: &DeviceState, now: Duration) -> u32 {
    let capacity = state.charge_capacity;
    match state.cycle {
        CycleState::Idle => IDLE_CHARGE,
        CycleState::Active { until } => {
            levels_left(until.saturating_sub(now), state.active_duration, capacity)
        }
        CycleState::CoolingDown { .. } => 0,
        CycleState::Recharging { until } => capacity.saturating_sub(levels_left(
            until.saturating_sub(now),
            state.cooldown_duration,
            capacity,
        )),
        CycleState::Priming { .. } => state.charge_remaining.min(capacity),
    }
}

/// Recompute the indicator and report it when it differs from the level the
/// host last saw.
///
/// Returns the new level if the host must be told.
pub fn refresh(state: &mut DeviceState, now: Duration) -> Option<u32> {
    state.charge_remaining = quantize(state, now);
    if state.charge_remaining == state.previous_charge_remaining {
        return None;
    }
    state.previous_charge_remaining = state.charge_remaining;
    Some(state.charge_remaining)
}

/// Number of `span / capacity` steps needed to cover `remaining`, rounded
/// up and clamped to `capacity`.
fn levels_left(remaining: Duration, span: Duration, capacity: u32) -> u32 {
    let step = span.as_nanos().checked_div(u128::from(capacity)).unwrap_or(0);
    if step == 0 {
        return 0;
    }
    let levels = remaining.as_nanos().div_ceil(step);
    u32::try_from(levels).unwrap_or(u32::MAX).min(capacity)
}
