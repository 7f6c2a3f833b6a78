//! Operator configuration for the `medtrail` binary.
//!
//! Resolved in order, later sources winning:
//! 1. built-in defaults
//! 2. `medtrail.toml` (or the path given with `--config`), if it exists
//! 3. `MEDTRAIL_DATABASE_PATH` / `MEDTRAIL_BUSY_TIMEOUT_MS`
//!
//! Key material never lives in the file. `[keys]` only names the
//! environment variables holding the hex keys; `.env` is loaded first so
//! those can sit next to the database during development.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use medtrail_contracts::error::{MedResult, MedtrailError};
use medtrail_signing::{Ed25519Verifier, KeyPair};
use medtrail_store::sqlite::DEFAULT_BUSY_TIMEOUT;

pub const DEFAULT_CONFIG_FILE: &str = "medtrail.toml";

pub const ENV_DATABASE_PATH: &str = "MEDTRAIL_DATABASE_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "MEDTRAIL_BUSY_TIMEOUT_MS";

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MedtrailConfig {
    pub storage: StorageConfig,
    pub keys: KeysConfig,
    pub verification: VerificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite file, or `":memory:"` for a log that lives as long as the process.
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeysConfig {
    pub private_key_env: String,
    pub public_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationConfig {
    pub enumerate_all_breaks: bool,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("medtrail.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            private_key_env: "ED25519_PRIVATE_KEY".to_string(),
            public_key_env: "ED25519_PUBLIC_KEY".to_string(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enumerate_all_breaks: false,
            batch_size: medtrail_verify::DEFAULT_BATCH_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

fn config_error(reason: impl Into<String>) -> MedtrailError {
    MedtrailError::Config {
        reason: reason.into(),
    }
}

impl MedtrailConfig {
    /// Parse a TOML document and check the values make sense.
    pub fn from_toml_str(s: &str) -> MedResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| config_error(format!("failed to parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`. A missing file yields the defaults; an unreadable or
    /// malformed one is an error.
    pub fn load_from(path: &Path) -> MedResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Full startup resolution: `.env`, then the file, then process
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> MedResult<Self> {
        dotenvy::dotenv().ok();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `MEDTRAIL_*` overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> MedResult<()> {
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.storage.busy_timeout_ms = raw.trim().parse().map_err(|e| {
                config_error(format!("{ENV_BUSY_TIMEOUT_MS}='{raw}' is not a millisecond count: {e}"))
            })?;
        }
        self.validate()
    }

    fn validate(&self) -> MedResult<()> {
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(config_error("storage.database_path must not be empty"));
        }
        if self.verification.batch_size == 0 {
            return Err(config_error("verification.batch_size must be at least 1"));
        }
        if self.keys.private_key_env.is_empty() || self.keys.public_key_env.is_empty() {
            return Err(config_error("keys.*_env must name an environment variable"));
        }
        Ok(())
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    /// The signing keypair, read from the variables named in `[keys]`.
    pub fn keypair(&self, lookup: impl Fn(&str) -> Option<String>) -> MedResult<KeyPair> {
        let private_hex = required_var(&lookup, &self.keys.private_key_env)?;
        let public_hex = required_var(&lookup, &self.keys.public_key_env)?;
        KeyPair::from_hex(&private_hex, &public_hex)
    }

    /// A verifier needing only the public key.
    pub fn verifier(&self, lookup: impl Fn(&str) -> Option<String>) -> MedResult<Ed25519Verifier> {
        let public_hex = required_var(&lookup, &self.keys.public_key_env)?;
        Ed25519Verifier::from_public_hex(&public_hex)
    }
}

fn required_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> MedResult<String> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| config_error(format!("{name} is not set; run `medtrail keygen`")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use medtrail_contracts::error::ErrorClass;

    use super::*;

    const SEED_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const PUBLIC_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = MedtrailConfig::from_toml_str("").unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("medtrail.db"));
        assert_eq!(config.storage.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
        assert_eq!(config.keys.private_key_env, "ED25519_PRIVATE_KEY");
        assert!(!config.verification.enumerate_all_breaks);
        assert_eq!(config.verification.batch_size, 500);
        assert_eq!(config.logging.default_filter, "info");
    }

    #[test]
    fn test_full_document_parses() {
        let config = MedtrailConfig::from_toml_str(
            r#"
            [storage]
            database_path = ":memory:"
            busy_timeout_ms = 250

            [keys]
            private_key_env = "WARD_SIGNING_KEY"
            public_key_env = "WARD_PUBLIC_KEY"

            [verification]
            enumerate_all_breaks = true
            batch_size = 64

            [logging]
            default_filter = "medtrail_store=debug,warn"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.database_path, PathBuf::from(":memory:"));
        assert_eq!(config.storage.busy_timeout_ms, 250);
        assert_eq!(config.keys.public_key_env, "WARD_PUBLIC_KEY");
        assert!(config.verification.enumerate_all_breaks);
        assert_eq!(config.verification.batch_size, 64);
    }

    #[test]
    fn test_unknown_key_and_bad_values_are_config_errors() {
        for doc in [
            "[storage]\ndatabase = \"x.db\"",
            "[verification]\nbatch_size = 0",
            "[storage]\nbusy_timeout_ms = \"soon\"",
            "[storage]\ndatabase_path = \"\"",
        ] {
            let err = MedtrailConfig::from_toml_str(doc).unwrap_err();
            assert_eq!(err.class(), ErrorClass::Config, "{doc}");
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MedtrailConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medtrail.toml");
        std::fs::write(&path, "[storage]\ndatabase_path = \"ward/audit.db\"\n").unwrap();

        let config = MedtrailConfig::load_from(&path).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("ward/audit.db"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = MedtrailConfig::default();
        config
            .apply_env(env(&[
                (ENV_DATABASE_PATH, "/var/lib/medtrail/audit.db"),
                (ENV_BUSY_TIMEOUT_MS, " 1200 "),
            ]))
            .unwrap();
        assert_eq!(
            config.storage.database_path,
            PathBuf::from("/var/lib/medtrail/audit.db")
        );
        assert_eq!(config.storage.busy_timeout_ms, 1_200);
    }

    #[test]
    fn test_unparsable_timeout_override_is_rejected() {
        let mut config = MedtrailConfig::default();
        let err = config
            .apply_env(env(&[(ENV_BUSY_TIMEOUT_MS, "five seconds")]))
            .unwrap_err();
        assert!(matches!(err, MedtrailError::Config { .. }));
        assert!(err.to_string().contains(ENV_BUSY_TIMEOUT_MS));
    }

    #[test]
    fn test_keypair_comes_from_named_variables() {
        let config = MedtrailConfig::default();
        let keys = config
            .keypair(env(&[
                ("ED25519_PRIVATE_KEY", SEED_HEX),
                ("ED25519_PUBLIC_KEY", PUBLIC_HEX),
            ]))
            .unwrap();
        assert_eq!(keys.public_key_hex(), PUBLIC_HEX);

        let verifier = config
            .verifier(env(&[("ED25519_PUBLIC_KEY", PUBLIC_HEX)]))
            .unwrap();
        assert_eq!(verifier.public_key_hex(), PUBLIC_HEX);
    }

    #[test]
    fn test_missing_key_variable_names_it() {
        let config = MedtrailConfig::default();
        let err = config
            .keypair(env(&[("ED25519_PUBLIC_KEY", PUBLIC_HEX)]))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Config);
        assert!(err.to_string().contains("ED25519_PRIVATE_KEY"));

        let err = config.verifier(env(&[("ED25519_PUBLIC_KEY", "  ")])).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Config);
    }

    #[test]
    fn test_bad_key_hex_is_key_error() {
        let config = MedtrailConfig::default();
        let err = config
            .keypair(env(&[
                ("ED25519_PRIVATE_KEY", "not hex"),
                ("ED25519_PUBLIC_KEY", PUBLIC_HEX),
            ]))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Key);
    }
}
