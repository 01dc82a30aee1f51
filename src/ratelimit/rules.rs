//! Rate limit rules configuration.
//!
//! One rule per guarded action. Rules are loaded from YAML in the same
//! `requests_per_unit` / `unit` shape Envoy uses for its rate limit
//! descriptors.

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::counter::TimeWindow;
use super::key::Action;
use crate::error::{BurnnoteError, Result};

/// A rate limit rule specifying the limit and time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Number of requests allowed per unit of time
    pub requests_per_unit: u64,
    /// The time unit
    pub unit: TimeWindow,
}

impl RateLimitRule {
    pub fn new(requests_per_unit: u64, unit: TimeWindow) -> Self {
        Self {
            requests_per_unit,
            unit,
        }
    }

    /// Length of one counting window.
    pub fn window(&self) -> Duration {
        self.unit.duration()
    }
}

/// Limits for every guarded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRules {
    /// Note creation; the stricter of the two
    #[serde(default = "default_create_rule")]
    pub create: RateLimitRule,
    /// Note viewing
    #[serde(default = "default_view_rule")]
    pub view: RateLimitRule,
}

fn default_create_rule() -> RateLimitRule {
    RateLimitRule::new(5, TimeWindow::Minute)
}

fn default_view_rule() -> RateLimitRule {
    RateLimitRule::new(15, TimeWindow::Minute)
}

impl Default for RateLimitRules {
    fn default() -> Self {
        Self {
            create: default_create_rule(),
            view: default_view_rule(),
        }
    }
}

impl RateLimitRules {
    /// The rule that applies to `action`.
    pub fn rule_for(&self, action: Action) -> &RateLimitRule {
        match action {
            Action::Create => &self.create,
            Action::View => &self.view,
        }
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RateLimitRules = serde_yaml::from_str(yaml)
            .map_err(|e| BurnnoteError::Config(format!("Failed to parse rate limit rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Reject rules that would block every request.
    pub fn validate(&self) -> Result<()> {
        for action in [Action::Create, Action::View] {
            if self.rule_for(action).requests_per_unit == 0 {
                return Err(BurnnoteError::Config(format!(
                    "rate limit for {} must allow at least one request",
                    action
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
    fn test_default_rules() {
        let rules = RateLimitRules::default();
        assert_eq!(rules.create, RateLimitRule::new(5, TimeWindow::Minute));
        assert_eq!(rules.view, RateLimitRule::new(15, TimeWindow::Minute));
        assert!(rules.create.requests_per_unit < rules.view.requests_per_unit);
    }

    #[test]
    fn test_parse_rules() {
        let yaml = r#"
create:
  requests_per_unit: 2
  unit: hour
view:
  requests_per_unit: 100
  unit: second
"#;
        let rules = RateLimitRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.rule_for(Action::Create).requests_per_unit, 2);
        assert_eq!(rules.rule_for(Action::Create).window(), Duration::seconds(3600));
        assert_eq!(rules.rule_for(Action::View).unit, TimeWindow::Second);
    }

    #[test]
    fn test_missing_rule_uses_default() {
        let yaml = r#"
view:
  requests_per_unit: 30
  unit: minute
"#;
        let rules = RateLimitRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.create, default_create_rule());
        assert_eq!(rules.view.requests_per_unit, 30);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = r#"
create:
  requests_per_unit: 0
  unit: minute
"#;
        let err = RateLimitRules::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, BurnnoteError::Config(_)));
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let yaml = r#"
view:
  requests_per_unit: 10
  unit: fortnight
"#;
        assert!(RateLimitRules::from_yaml(yaml).is_err());
    }
}
