//! Speed levels: named multiplier configurations selectable at runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WarpsimError};

/// One selectable speed configuration.
///
/// Higher multipliers pair with shorter poll intervals so event firing
/// granularity stays acceptable relative to compressed simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedLevel {
    /// Level number, unique within the table
    pub level: u8,
    /// Simulated seconds per wall second
    pub multiplier: f64,
    /// Poll loop cadence while this level is active
    #[serde(rename = "poll-interval-secs")]
    pub poll_interval_secs: f64,
}

impl SpeedLevel {
    /// Poll cadence as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }
}

/// The fixed, ordered set of speed levels configured at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeedTable {
    levels: Vec<SpeedLevel>,
}

impl Default for SpeedTable {
    fn default() -> Self {
        Self {
            levels: vec![
                SpeedLevel { level: 1, multiplier: 1.0, poll_interval_secs: 1.0 },
                SpeedLevel { level: 2, multiplier: 60.0, poll_interval_secs: 0.5 },
                SpeedLevel { level: 3, multiplier: 168.0, poll_interval_secs: 0.25 },
                SpeedLevel { level: 4, multiplier: 504.0, poll_interval_secs: 0.2 },
                SpeedLevel { level: 5, multiplier: 1008.0, poll_interval_secs: 0.1 },
            ],
        }
    }
}

impl SpeedTable {
    /// Build a table from explicit levels, validating as a whole.
    pub fn new(levels: Vec<SpeedLevel>) -> Result<Self> {
        let table = Self { levels };
        table.validate()?;
        Ok(table)
    }

    /// Look up a level by number.
    pub fn get(&self, level: u8) -> Option<SpeedLevel> {
        self.levels.iter().copied().find(|l| l.level == level)
    }

    /// Lowest configured level, the startup default.
    pub fn base(&self) -> SpeedLevel {
        self.levels[0]
    }

    /// All configured levels in order.
    pub fn levels(&self) -> &[SpeedLevel] {
        &self.levels
    }

    /// Validate the table: non-empty, unique ascending level numbers,
    /// positive multipliers and poll intervals.
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(WarpsimError::Config("speed table must not be empty".to_string()));
        }
        for pair in self.levels.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(WarpsimError::Config(format!(
                    "speed levels must be unique and ascending, got {} after {}",
                    pair[1].level, pair[0].level
                )));
            }
        }
        for l in &self.levels {
            if l.multiplier <= 0.0 {
                return Err(WarpsimError::Config(format!(
                    "level {} has non-positive multiplier {}",
                    l.level, l.multiplier
                )));
            }
            if l.poll_interval_secs <= 0.0 {
                return Err(WarpsimError::Config(format!(
                    "level {} has non-positive poll interval {}",
                    l.level, l.poll_interval_secs
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_levels() {
        let table = SpeedTable::default();
        assert_eq!(table.levels().len(), 5);
        assert_eq!(table.base().multiplier, 1.0);
        assert_eq!(table.get(5).unwrap().multiplier, 1008.0);
    }

    #[test]
    fn test_default_table_validates() {
        assert!(SpeedTable::default().validate().is_ok());
    }

    #[test]
    fn test_get_unknown_level() {
        let table = SpeedTable::default();
        assert!(table.get(9).is_none());
    }

    #[test]
    fn test_poll_interval_shrinks_with_speed() {
        let table = SpeedTable::default();
        let slow = table.get(1).unwrap().poll_interval();
        let fast = table.get(5).unwrap().poll_interval();
        assert!(fast < slow);
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(SpeedTable::new(vec![]).is_err());
    }

    #[test]
    fn test_descending_levels_rejected() {
        let levels = vec![
            SpeedLevel { level: 2, multiplier: 60.0, poll_interval_secs: 0.5 },
            SpeedLevel { level: 1, multiplier: 1.0, poll_interval_secs: 1.0 },
        ];
        assert!(SpeedTable::new(levels).is_err());
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let levels = vec![SpeedLevel { level: 1, multiplier: 0.0, poll_interval_secs: 1.0 }];
        assert!(SpeedTable::new(levels).is_err());
    }
}
