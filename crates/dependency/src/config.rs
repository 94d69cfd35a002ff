//! Manager tuning loaded from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Tuning knobs shared by the managers of an embedding container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
	pub activation: ActivationConfig,
	pub retry: RetryConfig,
}

/// `[activation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
	/// Upper bound for a component to go from opened to active.
	pub timeout_ms: u64,
}

impl Default for ActivationConfig {
	fn default() -> Self {
		Self { timeout_ms: default_timeout_ms() }
	}
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	/// Period of the automatic retry loop. `0` disables it.
	pub interval_ms: u64,
	/// Failures after which a pair is no longer retried automatically.
	/// `0` retries forever.
	pub max_attempts: u32,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			interval_ms: default_interval_ms(),
			max_attempts: default_max_attempts(),
		}
	}
}

fn default_timeout_ms() -> u64 {
	5000
}

fn default_interval_ms() -> u64 {
	1000
}

fn default_max_attempts() -> u32 {
	3
}

impl ManagerConfig {
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.display().to_string(),
			source,
		})?;
		Self::from_toml_str(&source)
	}

	pub fn activation_timeout(&self) -> Duration {
		Duration::from_millis(self.activation.timeout_ms)
	}

	/// `None` when the automatic retry loop is disabled.
	pub fn retry_interval(&self) -> Option<Duration> {
		(self.retry.interval_ms > 0).then(|| Duration::from_millis(self.retry.interval_ms))
	}

	pub(crate) fn attempt_limit(&self) -> u32 {
		match self.retry.max_attempts {
			0 => u32::MAX,
			n => n,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		let config = ManagerConfig::from_toml_str("").unwrap();
		assert_eq!(config, ManagerConfig::default());
		assert_eq!(config.activation_timeout(), Duration::from_secs(5));
		assert_eq!(config.retry_interval(), Some(Duration::from_secs(1)));
		assert_eq!(config.attempt_limit(), 3);
	}

	#[test]
	fn partial_sections_keep_remaining_defaults() {
		let config = ManagerConfig::from_toml_str(
			r#"
			[retry]
			interval_ms = 0
			"#,
		)
		.unwrap();
		assert_eq!(config.retry_interval(), None);
		assert_eq!(config.retry.max_attempts, 3);
		assert_eq!(config.activation.timeout_ms, 5000);
	}

	#[test]
	fn zero_attempts_means_unbounded() {
		let config = ManagerConfig::from_toml_str("[retry]\nmax_attempts = 0\n").unwrap();
		assert_eq!(config.attempt_limit(), u32::MAX);
	}

	#[test]
	fn rejects_mistyped_values() {
		let err = ManagerConfig::from_toml_str("[activation]\ntimeout_ms = \"soon\"\n").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}

	#[test]
	fn loads_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[activation]\ntimeout_ms = 250").unwrap();
		let config = ManagerConfig::load(file.path()).unwrap();
		assert_eq!(config.activation_timeout(), Duration::from_millis(250));
	}

	#[test]
	fn missing_file_reports_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("absent.toml");
		match ManagerConfig::load(&path) {
			Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path.display().to_string()),
			other => panic!("unexpected result: {other:?}"),
		}
	}
}
