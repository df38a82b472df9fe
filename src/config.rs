use std::env;

use thiserror::Error;

use crate::formula::EvaluationBudget;

/// Runtime settings for the CLI, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub formula: EvaluationBudget,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let log_level = env::var("GRADEBOOK_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
        let defaults = EvaluationBudget::default();

        Ok(Self {
            telemetry: TelemetryConfig { log_level },
            formula: EvaluationBudget {
                max_steps: limit("GRADEBOOK_FORMULA_MAX_STEPS", defaults.max_steps)?,
                max_depth: limit("GRADEBOOK_FORMULA_MAX_DEPTH", defaults.max_depth)?,
                max_length: limit("GRADEBOOK_FORMULA_MAX_LENGTH", defaults.max_length)?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive whole number, got '{value}'")]
    InvalidLimit { name: &'static str, value: String },
}

fn limit(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidLimit { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("GRADEBOOK_LOG_LEVEL");
        env::remove_var("GRADEBOOK_FORMULA_MAX_STEPS");
        env::remove_var("GRADEBOOK_FORMULA_MAX_DEPTH");
        env::remove_var("GRADEBOOK_FORMULA_MAX_LENGTH");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.telemetry.log_level, "warn");
        assert_eq!(config.formula, EvaluationBudget::default());
    }

    #[test]
    fn limits_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GRADEBOOK_FORMULA_MAX_STEPS", "500");
        env::set_var("GRADEBOOK_LOG_LEVEL", "debug");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.formula.max_steps, 500);
        assert_eq!(config.formula.max_depth, 64);
        assert_eq!(config.telemetry.log_level, "debug");
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_limits() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GRADEBOOK_FORMULA_MAX_DEPTH", "deep");
        let error = AppConfig::load().expect_err("invalid depth");
        assert_eq!(
            error,
            ConfigError::InvalidLimit {
                name: "GRADEBOOK_FORMULA_MAX_DEPTH",
                value: "deep".to_string(),
            }
        );
        env::set_var("GRADEBOOK_FORMULA_MAX_DEPTH", "0");
        assert!(AppConfig::load().is_err());
        reset_env();
    }
}
