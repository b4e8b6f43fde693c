//! Integer PD control law for the speed-controlled motors.
//!
//! Each tick the controller adds a proportional and a derivative correction to the
//! previous drive power instead of computing the output from scratch, so `power`
//! behaves like an integrator fed by the PD terms. There is no true integral term.
//!
//! # Example
//! ```rust
//! use pdcan_core::utils::math::pd::{MotorState, PdController};
//! let mut state = MotorState::default();
//! state.target_speed = 100;
//! let next = PdController::update(state);
//! assert_eq!(next.power, 202);
//! ```

use serde::{Deserialize, Serialize};

/// Upper bound of the drive power sent to a motor.
pub const MAX_POWER: i16 = 16_300;
/// Lower bound of the drive power sent to a motor.
pub const MIN_POWER: i16 = -16_300;

/// Fixed PD gains of one motor.
///
/// `p_gain` divides the error (larger is softer), `d_gain` multiplies the change in error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdGains {
    pub p_gain: i16,
    pub d_gain: i16,
}

impl PdGains {
    /// Gains the motors are tuned for.
    pub const DEFAULT: Self = Self {
        p_gain: 50,
        d_gain: 2,
    };
}

impl Default for PdGains {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Control state of a single motor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    /// Desired speed, written from the setpoint frame.
    pub target_speed: i16,
    /// Speed reported by the motor's encoder frame.
    pub measured_speed: i16,
    /// Drive power, always within [`MIN_POWER`, `MAX_POWER`] after an update.
    pub power: i16,
    pub gains: PdGains,
    /// Error seen by the previous tick. Kept at 32 bits since
    /// `target - measured` spans twice the `i16` range.
    pub last_error: i32,
}

impl MotorState {
    /// A motor at rest with the given gains.
    pub const fn new(gains: PdGains) -> Self {
        Self {
            target_speed: 0,
            measured_speed: 0,
            power: 0,
            gains,
            last_error: 0,
        }
    }
}

impl Default for MotorState {
    fn default() -> Self {
        Self::new(PdGains::DEFAULT)
    }
}

/// Stateless PD update step.
pub struct PdController;

impl PdController {
    /// Run one control step and return the next state.
    ///
    /// `p_term` uses Rust's integer division, which truncates toward zero for
    /// negative errors. The power sum is formed at 64 bits so the clamp sees the
    /// true value rather than a wrapped one.
    pub fn update(state: MotorState) -> MotorState {
        let error = i32::from(state.target_speed) - i32::from(state.measured_speed);

        let p_term = error
            .checked_div(i32::from(state.gains.p_gain))
            .unwrap_or(0);
        let d_term = i64::from(error - state.last_error) * i64::from(state.gains.d_gain);

        let power = (i64::from(state.power) + i64::from(p_term) + d_term)
            .clamp(i64::from(MIN_POWER), i64::from(MAX_POWER));

        MotorState {
            // within i16 after the clamp
            power: power as i16,
            last_error: error,
            ..state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(target: i16, measured: i16, power: i16, last_error: i32) -> MotorState {
        MotorState {
            target_speed: target,
            measured_speed: measured,
            power,
            gains: PdGains::DEFAULT,
            last_error,
        }
    }

    #[test]
    fn test_first_step_from_rest() {
        let next = PdController::update(state(100, 0, 0, 0));
        assert_eq!(next.power, 100 / 50 + 100 * 2);
        assert_eq!(next.last_error, 100);
    }

    #[test]
    fn test_proportional_truncates_toward_zero() {
        // -149 / 50 == -2 (floor division would give -3)
        let next = PdController::update(state(0, 149, 0, -149));
        assert_eq!(next.power, -2);
    }

    #[test]
    fn test_saturates_high_and_low() {
        let high = PdController::update(state(i16::MAX, i16::MIN, MAX_POWER, 0));
        assert_eq!(high.power, MAX_POWER);
        let low = PdController::update(state(i16::MIN, i16::MAX, MIN_POWER, 0));
        assert_eq!(low.power, MIN_POWER);
    }

    #[test]
    fn test_error_history_is_not_narrowed() {
        let next = PdController::update(state(i16::MAX, i16::MIN, 0, 0));
        assert_eq!(next.last_error, 65_535);
    }

    #[test]
    fn test_zero_error_holds_power() {
        let mut s = state(500, 500, 1234, 0);
        for _ in 0..10 {
            s = PdController::update(s);
            assert_eq!(s.power, 1234);
        }
    }

    #[test]
    fn test_zero_p_gain_only_applies_derivative() {
        let mut s = state(10, 0, 0, 0);
        s.gains.p_gain = 0;
        let next = PdController::update(s);
        assert_eq!(next.power, 20);
    }
}
