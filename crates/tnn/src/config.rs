//! Gradient-descent step configuration.
//!
//! [`StepConfig::default`] is a learning rate of 1 with no visited set, so a
//! node is stepped once per path on which it is reached.
//! Values can be overridden from the environment with [`StepConfig::from_env`].

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Environment variable holding the learning rate.
pub const ENV_LEARNING_RATE: &str = "TNN_LEARNING_RATE";
/// Environment variable holding the traversal mode (`every-path` or `once`).
pub const ENV_TRAVERSAL: &str = "TNN_TRAVERSAL";

const DEFAULT_LEARNING_RATE: f64 = 1.0;

/// How `update` and `zero_grad` walk a context graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// No visited set. A node shared by several contexts is stepped once per
    /// occurrence along every path from the root.
    #[default]
    EveryPath,
    /// Each reachable node is stepped exactly once.
    Once,
}

impl FromStr for Traversal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "every-path" | "every_path" | "everypath" => Ok(Self::EveryPath),
            "once" => Ok(Self::Once),
            other => Err(format!(
                "unknown traversal {other:?}, expected \"every-path\" or \"once\""
            )),
        }
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EveryPath => f.write_str("every-path"),
            Self::Once => f.write_str("once"),
        }
    }
}

/// Parameters of one gradient-descent step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    /// Multiplier applied to each gradient before it is subtracted.
    pub learning_rate: f64,
    /// Traversal used for the walk.
    pub traversal: Traversal,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            traversal: Traversal::default(),
        }
    }
}

impl StepConfig {
    /// Default configuration with a different learning rate.
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..Self::default()
        }
    }

    /// Set the traversal mode.
    pub fn traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Check that the learning rate is finite and strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Build from `TNN_LEARNING_RATE` and `TNN_TRAVERSAL`, falling back to
    /// [`StepConfig::default`] for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Replace fields whose environment variable is set. The result is validated.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let config = Self {
            learning_rate: env_parsed(ENV_LEARNING_RATE)?.unwrap_or(self.learning_rate),
            traversal: env_parsed(ENV_TRAVERSAL)?.unwrap_or(self.traversal),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Read and parse an environment variable. `Ok(None)` if unset.
fn env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = match std::env::var(key) {
        Ok(s) => s,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(e) => {
            return Err(ConfigError::EnvVar {
                key: key.to_string(),
                message: e.to_string(),
            });
        }
    };
    raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Parse {
        key: key.to_string(),
        value: raw.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env tests mutate process state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        // SAFETY: serialized by ENV_LOCK; no other thread reads these keys.
        unsafe {
            std::env::remove_var(ENV_LEARNING_RATE);
            std::env::remove_var(ENV_TRAVERSAL);
        }
    }

    #[test]
    fn test_default_is_unit_rate_every_path() {
        let cfg = StepConfig::default();
        assert_eq!(cfg.learning_rate, 1.0);
        assert_eq!(cfg.traversal, Traversal::EveryPath);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_learning_rate() {
        assert!(StepConfig::with_learning_rate(0.0).validate().is_err());
        assert!(StepConfig::with_learning_rate(-0.1).validate().is_err());
        assert!(StepConfig::with_learning_rate(f64::NAN).validate().is_err());
        assert!(StepConfig::with_learning_rate(0.01).validate().is_ok());
    }

    #[test]
    fn test_traversal_from_str() {
        assert_eq!("once".parse::<Traversal>(), Ok(Traversal::Once));
        assert_eq!("Every-Path".parse::<Traversal>(), Ok(Traversal::EveryPath));
        assert!("sometimes".parse::<Traversal>().is_err());
        assert_eq!(Traversal::Once.to_string(), "once");
    }

    #[test]
    fn test_from_env_falls_back_to_defaults() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        assert_eq!(StepConfig::from_env().unwrap(), StepConfig::default());
    }

    #[test]
    fn test_from_env_overrides() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var(ENV_LEARNING_RATE, "0.05");
            std::env::set_var(ENV_TRAVERSAL, "once");
        }
        let cfg = StepConfig::from_env();
        clear_env();
        let cfg = cfg.unwrap();
        assert_eq!(cfg.learning_rate, 0.05);
        assert_eq!(cfg.traversal, Traversal::Once);
    }

    #[test]
    fn test_env_overrides_keep_unset_fields() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var(ENV_TRAVERSAL, "every-path");
        }
        let base = StepConfig::with_learning_rate(0.02).traversal(Traversal::Once);
        let cfg = base.with_env_overrides();
        clear_env();
        let cfg = cfg.unwrap();
        assert_eq!(cfg.learning_rate, 0.02);
        assert_eq!(cfg.traversal, Traversal::EveryPath);
    }

    #[test]
    fn test_from_env_parse_error() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var(ENV_LEARNING_RATE, "fast");
        }
        let res = StepConfig::from_env();
        clear_env();
        assert!(matches!(res, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_env_validation_error() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var(ENV_LEARNING_RATE, "-1");
        }
        let res = StepConfig::from_env();
        clear_env();
        assert!(matches!(res, Err(ConfigError::Validation(_))));
    }
}
