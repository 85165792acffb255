use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use form_spec::{ComputedRegistry, SessionConfig, age_branch};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::Platform;
use crate::retry::RetryPolicy;

pub const PLATFORM_ENV: &str = "FORMCHAT_PLATFORM";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("FORMCHAT_PLATFORM: {0}")]
    InvalidPlatform(String),
    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,
    #[error("retry.timeout_ms must be greater than zero")]
    ZeroTimeout,
}

/// Declarative navigation function, registered under its map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputedRule {
    /// Picks `under` while the age from `field_id` is below `years`.
    AgeBranch {
        field_id: String,
        years: u32,
        under: String,
        otherwise: String,
    },
}

/// Runner settings, read from JSON with every key optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub platform: Platform,
    pub session: SessionConfig,
    pub retry: RetryPolicy,
    /// Save answers to the backend after every step transition.
    pub autosave: bool,
    pub computed: BTreeMap<String, ComputedRule>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Web,
            session: SessionConfig::default(),
            retry: RetryPolicy::default(),
            autosave: true,
            computed: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)?.with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_platform_override(std::env::var(PLATFORM_ENV).ok().as_deref())
    }

    pub fn with_platform_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = value
            && !raw.trim().is_empty()
        {
            self.platform = raw.parse().map_err(ConfigError::InvalidPlatform)?;
        }
        Ok(self)
    }

    /// Builds the functions `computed` navigation can call, dated at `today`.
    pub fn registry(&self, today: NaiveDate) -> ComputedRegistry {
        self.computed
            .iter()
            .fold(ComputedRegistry::new(), |registry, (name, rule)| match rule {
                ComputedRule::AgeBranch {
                    field_id,
                    years,
                    under,
                    otherwise,
                } => registry.with(
                    name.clone(),
                    age_branch(field_id.clone(), *years, under.clone(), otherwise.clone(), today),
                ),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.retry.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use form_spec::{FieldPresentationMode, RestartPolicy};

    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = RuntimeConfig::from_json_str("{}").expect("config");
        assert_eq!(config, RuntimeConfig::default());
        assert!(config.autosave);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
    }

    #[test]
    fn nested_settings_are_read() {
        let config = RuntimeConfig::from_json_str(
            r#"{
                "platform": "miniapp",
                "autosave": false,
                "retry": { "max_attempts": 5 },
                "session": {
                    "back_navigation_erases_answers": true,
                    "field_presentation": "one_at_a_time",
                    "restart_application_id": "regenerate"
                }
            }"#,
        )
        .expect("config");
        assert_eq!(config.platform, Platform::MiniApp);
        assert!(!config.autosave);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.timeout_ms, 10_000);
        assert!(config.session.back_navigation_erases_answers);
        assert_eq!(
            config.session.field_presentation,
            FieldPresentationMode::OneAtATime
        );
        assert_eq!(
            config.session.restart_application_id,
            RestartPolicy::Regenerate
        );
    }

    #[test]
    fn computed_rules_become_registry_entries() {
        let config = RuntimeConfig::from_json_str(
            r#"{
                "computed": {
                    "documents": {
                        "kind": "age_branch",
                        "field_id": "birth_date",
                        "years": 14,
                        "under": "child-docs",
                        "otherwise": "adult-docs"
                    }
                }
            }"#,
        )
        .expect("config");
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("date");
        let registry = config.registry(today);
        assert!(registry.contains("documents"));

        let child = form_spec::AnswerSet::new().with("birth_date", "01.02.2015");
        assert_eq!(
            registry.call("documents", &child).as_deref(),
            Some("child-docs")
        );
        let adult = form_spec::AnswerSet::new().with("birth_date", "01.02.1990");
        assert_eq!(
            registry.call("documents", &adult).as_deref(),
            Some("adult-docs")
        );
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let result = RuntimeConfig::from_json_str(r#"{ "retry": { "max_attempts": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::NoAttempts)));
    }

    #[test]
    fn platform_override_wins() {
        let config = RuntimeConfig::default()
            .with_platform_override(Some("miniapp"))
            .expect("override");
        assert_eq!(config.platform, Platform::MiniApp);

        let unchanged = RuntimeConfig::default()
            .with_platform_override(Some("  "))
            .expect("blank");
        assert_eq!(unchanged.platform, Platform::Web);

        assert!(matches!(
            RuntimeConfig::default().with_platform_override(Some("fax")),
            Err(ConfigError::InvalidPlatform(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chatform.json");
        std::fs::write(&path, r#"{ "autosave": false }"#).expect("write");
        let config = RuntimeConfig::load(&path).expect("load");
        assert!(!config.autosave);

        let missing = RuntimeConfig::load(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
