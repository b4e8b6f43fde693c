//! Fixed bank of four speed-controlled motors.
//!
//! The bank offers no locking of its own; share it through
//! [`ControlShared`](super::control_loop::ControlShared).

use crate::utils::math::pd::{MotorState, PdController, PdGains};

/// Number of motor slots on the controller node.
pub const MOTOR_COUNT: usize = 4;

/// Logical motor slot in `0..MOTOR_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MotorSlot(u8);

impl MotorSlot {
    pub const M0: Self = Self(0);
    pub const M1: Self = Self(1);
    pub const M2: Self = Self(2);
    pub const M3: Self = Self(3);

    /// Every slot, in update order.
    pub const ALL: [Self; MOTOR_COUNT] = [Self::M0, Self::M1, Self::M2, Self::M3];

    /// Returns `None` when `index` is not a valid slot.
    pub const fn new(index: usize) -> Option<Self> {
        if index < MOTOR_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Snapshot of every slot's drive power taken at the end of a control tick.
pub type PowerReport = [i16; MOTOR_COUNT];

/// Owns the control state of all motors.
#[derive(Debug, Clone)]
pub struct MotorBank {
    motors: [MotorState; MOTOR_COUNT],
}

impl MotorBank {
    /// Create a bank with every motor at rest and sharing `gains`.
    pub const fn new(gains: PdGains) -> Self {
        Self {
            motors: [MotorState::new(gains); MOTOR_COUNT],
        }
    }

    /// Run one PD step on every motor, slot 0 first.
    pub fn update_all(&mut self) {
        for motor in self.motors.iter_mut() {
            *motor = PdController::update(*motor);
        }
    }

    pub fn set_target(&mut self, slot: MotorSlot, value: i16) {
        self.motors[slot.index()].target_speed = value;
    }

    /// Apply a full setpoint frame.
    pub fn set_targets(&mut self, targets: [i16; MOTOR_COUNT]) {
        for (motor, target) in self.motors.iter_mut().zip(targets) {
            motor.target_speed = target;
        }
    }

    pub fn set_measured(&mut self, slot: MotorSlot, value: i16) {
        self.motors[slot.index()].measured_speed = value;
    }

    /// Current clamped drive power of `slot`.
    #[inline]
    pub fn read_power(&self, slot: MotorSlot) -> i16 {
        self.motors[slot.index()].power
    }

    pub fn powers(&self) -> PowerReport {
        self.motors.map(|m| m.power)
    }

    pub fn targets(&self) -> [i16; MOTOR_COUNT] {
        self.motors.map(|m| m.target_speed)
    }

    pub fn state(&self, slot: MotorSlot) -> &MotorState {
        &self.motors[slot.index()]
    }
}

impl Default for MotorBank {
    fn default() -> Self {
        Self::new(PdGains::DEFAULT)
    }
}
