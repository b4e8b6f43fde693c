//! Node configuration.
//!
//! Every field has a compile-time default matching the deployed boards. Hosts may
//! deserialize overrides (missing fields fall back to the defaults) and must call
//! [`NodeConfig::validate`] before building nodes from it.

use core::fmt;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::math::pd::PdGains;

/// Control loop period in milliseconds.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 2;
/// CAN bit rate of both nodes.
pub const DEFAULT_CAN_BITRATE: u32 = 1_000_000;
/// Serial link baud rate on the bridge (8-N-1).
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Errors returned by [`NodeConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ZeroProportionalGain,
    ZeroTickPeriod,
    ZeroCanBitrate,
    ZeroSerialBaud,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroProportionalGain => f.write_str("p_gain must be non-zero"),
            ConfigError::ZeroTickPeriod => f.write_str("tick_period_ms must be non-zero"),
            ConfigError::ZeroCanBitrate => f.write_str("can_bitrate must be non-zero"),
            ConfigError::ZeroSerialBaud => f.write_str("serial_baud must be non-zero"),
        }
    }
}

/// Settings shared by the controller and bridge nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub gains: PdGains,
    pub tick_period_ms: u64,
    pub can_bitrate: u32,
    pub serial_baud: u32,
}

impl NodeConfig {
    pub const DEFAULT: Self = Self {
        gains: PdGains::DEFAULT,
        tick_period_ms: DEFAULT_TICK_PERIOD_MS,
        can_bitrate: DEFAULT_CAN_BITRATE,
        serial_baud: DEFAULT_SERIAL_BAUD,
    };

    /// Check the invariants the nodes rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gains.p_gain == 0 {
            return Err(ConfigError::ZeroProportionalGain);
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.can_bitrate == 0 {
            return Err(ConfigError::ZeroCanBitrate);
        }
        if self.serial_baud == 0 {
            return Err(ConfigError::ZeroSerialBaud);
        }
        Ok(())
    }

    #[inline]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.gains, PdGains { p_gain: 50, d_gain: 2 });
        assert_eq!(cfg.tick_period(), Duration::from_millis(2));
    }

    #[test]
    fn test_zero_p_gain_rejected() {
        let cfg = NodeConfig {
            gains: PdGains { p_gain: 0, d_gain: 2 },
            ..NodeConfig::DEFAULT
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroProportionalGain));
    }

    #[test]
    fn test_zero_period_rejected() {
        let cfg = NodeConfig {
            tick_period_ms: 0,
            ..NodeConfig::DEFAULT
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTickPeriod));
    }
}
