//! Upgrade-driven timing.
//!
//! Better machine parts shorten priming and recharging:
//! `effective = base * factor^(rating - 1)`. Recomputing only changes the
//! stored durations; a deadline already set keeps its value.

use std::time::Duration;

use pulse_types::DeviceState;

/// Scale `base` for the given part rating.
///
/// Ratings below 1 are treated as 1. A factor that would produce an
/// unrepresentable duration leaves `base` unchanged.
pub fn effective_duration(base: Duration, rating: u32, factor: f32) -> Duration {
    let exponent = i32::try_from(rating.saturating_sub(1)).unwrap_or(i32::MAX);
    let scale = f64::from(factor).powi(exponent);
    Duration::try_from_secs_f64(base.as_secs_f64() * scale).unwrap_or(base)
}

/// Recompute the effective priming and recharge durations for `rating`.
pub fn apply_rating(state: &mut DeviceState, rating: u32) {
    let factor = state.rating_delay_factor;
    state.priming_duration = effective_duration(state.base_priming_duration, rating, factor);
    state.cooldown_duration = effective_duration(state.base_cooldown_duration, rating, factor);
}

/// `cooldown / base_cooldown`, the figure shown in upgrade examine text.
pub fn delay_multiplier(state: &DeviceState) -> f32 {
    let base = state.base_cooldown_duration.as_secs_f32();
    if base > 0.0 {
        state.cooldown_duration.as_secs_f32() / base
    } else {
        1.0
    }
}
