use crate::error::ConfigError;
use crate::sink::LogSinkConfig;
use crate::size::{SizeLimit, parse_byte_size};
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Raw options for the response logger, as they appear in a config file.
///
/// Sizes stay as strings until [`ResponseLoggerConfig::resolve`] so a bad
/// value is reported with the text the operator wrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseLoggerConfig {
    /// Destination log file.
    pub filename: PathBuf,
    /// Logged-body truncation threshold. "0KB" logs whole bodies.
    #[serde(default = "default_max_bodylen", deserialize_with = "string_or_integer")]
    pub max_bodylen: String,
    /// Rotation threshold for the log file.
    #[serde(default = "default_max_logsize", deserialize_with = "string_or_integer")]
    pub max_logsize: String,
    /// Rotated backups to keep.
    #[serde(default = "default_backup_count", deserialize_with = "string_or_integer")]
    pub backup_count: String,
}

/// Options after size parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggerSettings {
    pub body_limit: SizeLimit,
    pub sink: LogSinkConfig,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_max_bodylen() -> String { "0KB".into() }
fn default_max_logsize() -> String { "100MB".into() }
fn default_backup_count() -> String { "10".into() }

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    Text(String),
    Integer(u64),
}

fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawOption::deserialize(deserializer)? {
        RawOption::Text(s) => s,
        RawOption::Integer(n) => n.to_string(),
    })
}

// ── Impls ─────────────────────────────────────────────────────

impl ResponseLoggerConfig {
    /// Options for `filename` with every other option at its default.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            max_bodylen: default_max_bodylen(),
            max_logsize: default_max_logsize(),
            backup_count: default_backup_count(),
        }
    }

    /// Load from a YAML (or `.toml`) file, then `REQLOG_*` env overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Figment::from(Toml::file(path)),
            _ => Figment::from(Yaml::file(path)),
        };
        let config: ResponseLoggerConfig = file.merge(Env::prefixed("REQLOG_")).extract()?;
        Ok(config)
    }

    /// Parse sizes and counts into their typed form.
    pub fn resolve(&self) -> Result<LoggerSettings, ConfigError> {
        let backup_count: usize =
            self.backup_count
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidInteger {
                    name: "backup_count",
                    value: self.backup_count.clone(),
                    source,
                })?;
        let max_bytes = parse_byte_size(&self.max_logsize)?;
        let body_limit = SizeLimit::new(parse_byte_size(&self.max_bodylen)?);

        tracing::debug!(
            filename = %self.filename.display(),
            body_limit = %body_limit,
            max_bytes,
            backup_count,
            "Resolved response logger options"
        );

        Ok(LoggerSettings {
            body_limit,
            sink: LogSinkConfig {
                path: self.filename.clone(),
                max_bytes,
                backup_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // ── Default values ────────────────────────────────────────────

    #[test]
    fn new_config_has_expected_defaults() {
        let cfg = ResponseLoggerConfig::new("/var/log/app/responses.log");
        assert_eq!(cfg.filename, PathBuf::from("/var/log/app/responses.log"));
        assert_eq!(cfg.max_bodylen, "0KB");
        assert_eq!(cfg.max_logsize, "100MB");
        assert_eq!(cfg.backup_count, "10");
    }

    #[test]
    fn defaults_resolve_to_unlimited_body_and_100mb_rotation() {
        let settings = ResponseLoggerConfig::new("responses.log").resolve().unwrap();
        assert!(settings.body_limit.is_unlimited());
        assert_eq!(settings.sink.max_bytes, 100 * 1024 * 1024);
        assert_eq!(settings.sink.backup_count, 10);
        assert_eq!(settings.sink.path, PathBuf::from("responses.log"));
    }

    // ── resolve() ─────────────────────────────────────────────────

    #[test]
    fn resolve_parses_custom_sizes() {
        let mut cfg = ResponseLoggerConfig::new("responses.log");
        cfg.max_bodylen = "2kb".into();
        cfg.max_logsize = "1GB".into();
        cfg.backup_count = " 3 ".into();
        let settings = cfg.resolve().unwrap();
        assert_eq!(settings.body_limit.bytes(), 2048);
        assert_eq!(settings.sink.max_bytes, 1024 * 1024 * 1024);
        assert_eq!(settings.sink.backup_count, 3);
    }

    #[test]
    fn resolve_rejects_bad_body_limit() {
        let mut cfg = ResponseLoggerConfig::new("responses.log");
        cfg.max_bodylen = "lotsKB".into();
        let err = cfg.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSize { ref value, .. } if value == "lotsKB"));
    }

    #[test]
    fn resolve_rejects_bad_backup_count() {
        let mut cfg = ResponseLoggerConfig::new("responses.log");
        cfg.backup_count = "ten".into();
        let err = cfg.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInteger { name: "backup_count", .. }));
        assert!(err.to_string().contains("backup_count"));
    }

    // ── load() ────────────────────────────────────────────────────

    #[test]
    fn load_yaml_applies_defaults_for_missing_options() {
        let mut tmpfile = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(tmpfile, "filename: /tmp/reqlog/responses.log\nmax_bodylen: 4KB\n").unwrap();
        let cfg = ResponseLoggerConfig::load(tmpfile.path()).unwrap();
        assert_eq!(cfg.filename, PathBuf::from("/tmp/reqlog/responses.log"));
        assert_eq!(cfg.max_bodylen, "4KB");
        assert_eq!(cfg.max_logsize, "100MB");
        assert_eq!(cfg.backup_count, "10");
    }

    #[test]
    fn load_yaml_accepts_integer_options() {
        let mut tmpfile = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(
            tmpfile,
            "filename: responses.log\nmax_bodylen: 512\nmax_logsize: 1048576\nbackup_count: 2\n"
        )
        .unwrap();
        let cfg = ResponseLoggerConfig::load(tmpfile.path()).unwrap();
        assert_eq!(cfg.max_bodylen, "512");
        assert_eq!(cfg.backup_count, "2");
        let settings = cfg.resolve().unwrap();
        assert_eq!(settings.body_limit.bytes(), 512);
        assert_eq!(settings.sink.max_bytes, 1_048_576);
        assert_eq!(settings.sink.backup_count, 2);
    }

    #[test]
    fn load_toml_by_extension() {
        let mut tmpfile = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            tmpfile,
            "filename = \"responses.log\"\nmax_logsize = \"5MB\"\nbackup_count = 4\n"
        )
        .unwrap();
        let cfg = ResponseLoggerConfig::load(tmpfile.path()).unwrap();
        assert_eq!(cfg.max_logsize, "5MB");
        assert_eq!(cfg.backup_count, "4");
    }

    #[test]
    fn load_without_filename_fails() {
        let mut tmpfile = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(tmpfile, "max_bodylen: 1KB\n").unwrap();
        let err = ResponseLoggerConfig::load(tmpfile.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
