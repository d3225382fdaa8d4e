use std::path::Path;

use htlc_crypto::HashAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration shared by the three machines.
///
/// Every party deriving or reconciling identifiers must use the same
/// `hash_algorithm`; the limits only bound what a machine accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Hash for hashlocks, message digests, aggregates and identifiers.
    pub hash_algorithm: HashAlgorithm,
    /// Largest item list `create_batch` accepts.
    pub max_batch_items: usize,
    /// A new deadline must lie strictly later than `now + min_lock_seconds`.
    pub min_lock_seconds: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Blake3,
            max_batch_items: 4096,
            min_lock_seconds: 0,
        }
    }
}

impl MachineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_items == 0 {
            return Err(ConfigError::Parse("max_batch_items must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.max_batch_items, 4096);
        assert_eq!(config.min_lock_seconds, 0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MachineConfig::from_toml_str("hash_algorithm = \"sha256\"\n").unwrap();
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.max_batch_items, 4096);

        let empty = MachineConfig::from_toml_str("").unwrap();
        assert_eq!(empty, MachineConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            MachineConfig::from_toml_str("hash_algorithm = \"md5\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MachineConfig::from_toml_str("max_batch_items = 0"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_batch_items = 8\nmin_lock_seconds = 60").unwrap();
        let config = MachineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_batch_items, 8);
        assert_eq!(config.min_lock_seconds, 60);

        let missing = MachineConfig::load(Path::new("/nonexistent/htlc.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
