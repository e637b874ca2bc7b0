//! Allocator configuration.

use crate::port::{DYNAMIC_PORT_END, DYNAMIC_PORT_START};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors raised when validating a [`PortAllocatorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid dynamic port range {start}-{end}: must lie within {min}-{max} with start <= end")]
    InvalidDynamicRange {
        start: u32,
        end: u32,
        min: u32,
        max: u32,
    },
}

/// Configuration of a [`PortAllocator`](crate::PortAllocator).
///
/// The dynamic range may be narrowed but never moved outside
/// `DYNAMIC_PORT_START..=DYNAMIC_PORT_END`, since ports already handed out
/// by other managers were chosen from that window.
///
/// # Example
///
/// ```
/// use netalloc_port::PortAllocatorConfig;
///
/// let config = PortAllocatorConfig::default().with_dynamic_range(31000, 31999);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.dynamic_port_count(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortAllocatorConfig {
    /// First port searched for dynamic assignment.
    pub dynamic_port_start: u32,
    /// Last port searched for dynamic assignment (inclusive).
    pub dynamic_port_end: u32,
}

impl Default for PortAllocatorConfig {
    fn default() -> Self {
        Self {
            dynamic_port_start: DYNAMIC_PORT_START,
            dynamic_port_end: DYNAMIC_PORT_END,
        }
    }
}

impl PortAllocatorConfig {
    /// Sets the dynamic port range.
    pub fn with_dynamic_range(mut self, start: u32, end: u32) -> Self {
        self.dynamic_port_start = start;
        self.dynamic_port_end = end;
        self
    }

    /// Checks that the dynamic range is a non-empty sub-range of the
    /// default dynamic window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (start, end) = (self.dynamic_port_start, self.dynamic_port_end);
        if start < DYNAMIC_PORT_START || end > DYNAMIC_PORT_END || start > end {
            return Err(ConfigError::InvalidDynamicRange {
                start,
                end,
                min: DYNAMIC_PORT_START,
                max: DYNAMIC_PORT_END,
            });
        }
        Ok(())
    }

    /// Returns the dynamic port range, ascending.
    pub fn dynamic_range(&self) -> RangeInclusive<u32> {
        self.dynamic_port_start..=self.dynamic_port_end
    }

    /// Returns the number of ports in the dynamic range.
    pub fn dynamic_port_count(&self) -> usize {
        self.dynamic_range().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_range() {
        let config = PortAllocatorConfig::default();
        assert_eq!(config.dynamic_range(), 30000..=32767);
        assert_eq!(config.dynamic_port_count(), 2768);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_window() {
        let config = PortAllocatorConfig::default().with_dynamic_range(29999, 30010);
        assert!(config.validate().is_err());

        let config = PortAllocatorConfig::default().with_dynamic_range(30000, 32768);
        assert!(config.validate().is_err());

        let config = PortAllocatorConfig::default().with_dynamic_range(31000, 30999);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDynamicRange {
                start: 31000,
                end: 30999,
                min: 30000,
                max: 32767,
            })
        );
    }

    #[test]
    fn test_single_port_range() {
        let config = PortAllocatorConfig::default().with_dynamic_range(32767, 32767);
        assert!(config.validate().is_ok());
        assert_eq!(config.dynamic_port_count(), 1);
    }

    #[test]
    fn test_yaml_partial_config() {
        let config: PortAllocatorConfig =
            serde_yaml::from_str("dynamic_port_start: 31000\n").unwrap();
        assert_eq!(config.dynamic_port_start, 31000);
        assert_eq!(config.dynamic_port_end, DYNAMIC_PORT_END);
    }
}
