//! Engine configuration.
//!
//! Loaded from warpsim.yml (or an explicit path). Top-level sections fall
//! back to defaults; individual agent records are strict — unknown or
//! missing fields there are a startup error, never a silent default.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::Context;
use serde::{Deserialize, Serialize};

use crate::agents::AgentProfile;
use crate::clock::SpeedTable;
use crate::domain::Priority;
use crate::error::{Result, WarpsimError};
use crate::sched::cycle::SIM_WEEK_SECS;

/// Base simulated processing minutes per priority class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BaseMinutes {
    pub urgent: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for BaseMinutes {
    fn default() -> Self {
        Self {
            urgent: 15.0,
            high: 30.0,
            medium: 60.0,
            low: 120.0,
        }
    }
}

impl BaseMinutes {
    /// Base minutes for one priority class.
    pub fn for_priority(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Urgent => self.urgent,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Outbound rate caps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    #[serde(rename = "per-minute")]
    pub per_minute: usize,
    #[serde(rename = "per-hour")]
    pub per_hour: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 5,
            per_hour: 100,
        }
    }
}

/// Simulated-cycle settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CycleConfig {
    /// Cycle length in simulated seconds (one simulated week by default)
    #[serde(rename = "length-sim-secs")]
    pub length_sim_secs: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            length_sim_secs: SIM_WEEK_SECS,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selectable speed levels
    #[serde(rename = "speed-levels")]
    pub speed_levels: SpeedTable,

    /// Level active at startup
    #[serde(rename = "initial-level")]
    pub initial_level: u8,

    /// Base processing minutes by priority class
    #[serde(rename = "base-minutes")]
    pub base_minutes: BaseMinutes,

    /// Outbound dispatch caps
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,

    /// Cycle settings
    pub cycle: CycleConfig,

    /// Agent roster
    pub agents: Vec<AgentProfile>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            speed_levels: SpeedTable::default(),
            initial_level: 1,
            base_minutes: BaseMinutes::default(),
            rate_limit: RateLimitConfig::default(),
            cycle: CycleConfig::default(),
            agents: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. warpsim.yml in the current directory
    /// 3. Built-in demo configuration
    pub fn load(config_path: Option<&PathBuf>) -> eyre::Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from("warpsim.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from warpsim.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load warpsim.yml: {}", e);
                }
            }
        }

        log::info!("No config file found, using demo configuration");
        Ok(Self::demo())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// A small self-contained roster for running without a config file.
    pub fn demo() -> Self {
        let agent = |id: &str, tags: &[&str], specialties: &[&str], mailbox: &str| AgentProfile {
            id: id.to_string(),
            capability_tags: tags.iter().map(|t| t.to_string()).collect(),
            specialties: specialties.iter().map(|t| t.to_string()).collect(),
            speed_multiplier: 1.0,
            auto_respond: true,
            escalation_threshold: 0.9,
            failure_rate: 0.05,
            honor_dilation: true,
            mailboxes: vec![mailbox.to_string()],
        };

        Self {
            agents: vec![
                agent("sales-sam", &["sales", "billing"], &["sales"], "sales@demo.test"),
                agent("support-sue", &["support", "billing"], &["support"], "support@demo.test"),
                agent("ops-olga", &["ops", "support"], &["ops"], "ops@demo.test"),
            ],
            ..Self::default()
        }
    }

    /// Validate the configuration as a whole.
    pub fn validate(&self) -> Result<()> {
        self.speed_levels.validate()?;

        if self.speed_levels.get(self.initial_level).is_none() {
            return Err(WarpsimError::Config(format!(
                "initial level {} not present in the speed table",
                self.initial_level
            )));
        }

        for priority in Priority::ALL {
            let minutes = self.base_minutes.for_priority(priority);
            if !minutes.is_finite() || minutes <= 0.0 {
                return Err(WarpsimError::Config(format!(
                    "base minutes for {} must be positive, got {}",
                    priority, minutes
                )));
            }
        }

        if self.rate_limit.per_minute == 0 || self.rate_limit.per_hour == 0 {
            return Err(WarpsimError::Config("rate caps must be > 0".to_string()));
        }

        if !self.cycle.length_sim_secs.is_finite() || self.cycle.length_sim_secs <= 0.0 {
            return Err(WarpsimError::Config(format!(
                "cycle length must be positive, got {}",
                self.cycle.length_sim_secs
            )));
        }

        if self.agents.is_empty() {
            return Err(WarpsimError::Config("at least one agent is required".to_string()));
        }

        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_mailboxes = std::collections::HashSet::new();
        for agent in &self.agents {
            agent.validate()?;
            if !seen_ids.insert(agent.id.clone()) {
                return Err(WarpsimError::Config(format!("duplicate agent id {}", agent.id)));
            }
            for mailbox in &agent.mailboxes {
                if !seen_mailboxes.insert(mailbox.clone()) {
                    return Err(WarpsimError::Config(format!(
                        "mailbox {} assigned to more than one agent",
                        mailbox
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_minutes() {
        let base = BaseMinutes::default();
        assert_eq!(base.for_priority(Priority::Urgent), 15.0);
        assert_eq!(base.for_priority(Priority::Low), 120.0);
        assert!(base.for_priority(Priority::Urgent) < base.for_priority(Priority::High));
    }

    #[test]
    fn test_default_config_has_week_cycle() {
        let config = EngineConfig::default();
        assert_eq!(config.cycle.length_sim_secs, 604800.0);
        assert_eq!(config.rate_limit.per_minute, 5);
    }

    #[test]
    fn test_default_config_fails_validation_without_agents() {
        let config = EngineConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demo_config_validates() {
        let config = EngineConfig::demo();
        assert!(config.validate().is_ok());
        assert_eq!(config.agents.len(), 3);
    }

    #[test]
    fn test_duplicate_agent_id_rejected() {
        let mut config = EngineConfig::demo();
        let dup = config.agents[0].clone();
        config.agents.push(AgentProfile {
            mailboxes: vec![],
            ..dup
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_mailbox_rejected() {
        let mut config = EngineConfig::demo();
        config.agents[1].mailboxes = config.agents[0].mailboxes.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_initial_level_rejected() {
        let mut config = EngineConfig::demo();
        config.initial_level = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_base_minutes_rejected() {
        let mut config = EngineConfig::demo();
        config.base_minutes.medium = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml_partial_sections() {
        let yaml = r#"
initial-level: 1
rate-limit:
  per-minute: 2
agents:
  - id: a1
    capability-tags: [billing]
    speed-multiplier: 1.0
    auto-respond: false
    escalation-threshold: 0.9
    failure-rate: 0.1
"#;
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limit.per_minute, 2);
        // Omitted sections fall back to defaults.
        assert_eq!(config.rate_limit.per_hour, 100);
        assert_eq!(config.cycle.length_sim_secs, SIM_WEEK_SECS);
        assert_eq!(config.agents.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_unknown_agent_field_fails() {
        let yaml = r#"
agents:
  - id: a1
    capability-tags: [billing]
    speed-multiplier: 1.0
    auto-respond: false
    escalation-threshold: 0.9
    failure-rate: 0.1
    typo-field: 7
"#;
        let parsed: std::result::Result<EngineConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EngineConfig::demo();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.agents.len(), config.agents.len());
        assert_eq!(back.base_minutes, config.base_minutes);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("engine.yml");
        std::fs::write(&path, "initial-level: 1\n").unwrap();
        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.initial_level, 1);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/warpsim.yml");
        assert!(EngineConfig::load(Some(&path)).is_err());
    }
}
