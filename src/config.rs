//! Hub configuration file
//!
//! One `directive value` pair per line. Directive names are matched
//! case-insensitively, `#` starts a comment line and unknown directives are
//! ignored. The value is the rest of the line, so passwords may contain spaces.
//!
//! ```text
//! dbUser              hostmon
//! dbPass              secret
//! dbHost              db.example.org
//! dbName              hostmon
//! eMailTo             ops@example.org
//! eMailFrom           hostmon@example.org
//! loadThreshold       4
//! loadFirstDThreshold 1
//! swapThreshold       30
//! swapFirstDThreshold 5
//! diskThreshold       90
//! diskReportInterval  3600
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{trace, warn};

use crate::codec::Protocol;
use crate::evaluator::Thresholds;

/// Directives that must be present in every configuration file
pub const REQUIRED_DIRECTIVES: [&str; 12] = [
    "dbUser",
    "dbPass",
    "dbHost",
    "dbName",
    "eMailTo",
    "eMailFrom",
    "loadThreshold",
    "swapThreshold",
    "loadFirstDThreshold",
    "swapFirstDThreshold",
    "diskThreshold",
    "diskReportInterval",
];

const OPTIONAL_DIRECTIVES: [&str; 5] = ["dbBackend", "smtpHost", "smtpPort", "sweepInterval", "protocol"];

const DEFAULT_SMTP_HOST: &str = "localhost";
const DEFAULT_SMTP_PORT: u16 = 25;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing config directive `{0}`")]
    MissingDirective(&'static str),

    #[error("invalid value `{value}` for directive `{directive}`")]
    InvalidValue { directive: &'static str, value: String },
}

/// Which storage engine backs the report store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbBackend {
    #[default]
    MySql,
    Sqlite,
    Memory,
}

impl FromStr for DbBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(DbBackend::MySql),
            "sqlite" => Ok(DbBackend::Sqlite),
            "memory" => Ok(DbBackend::Memory),
            other => Err(format!("unknown database backend `{other}`")),
        }
    }
}

impl fmt::Display for DbBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbBackend::MySql => "mysql",
            DbBackend::Sqlite => "sqlite",
            DbBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Database connection settings
///
/// For the SQLite backend `name` is the path of the database file.
#[derive(Clone, PartialEq)]
pub struct DatabaseConfig {
    pub backend: DbBackend,
    pub user: String,
    pub password: String,
    pub host: String,
    pub name: String,
}

impl DatabaseConfig {
    /// Settings for an in-memory store
    pub fn memory() -> Self {
        Self {
            backend: DbBackend::Memory,
            user: String::new(),
            password: String::new(),
            host: String::new(),
            name: String::new(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailConfig {
    pub to: String,
    pub from: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub mail: MailConfig,
    pub thresholds: Thresholds,
    pub sweep_interval: Duration,

    /// Line protocol spoken on the TCP listener
    pub protocol: Protocol,
}

/// Directive name -> value, keyed by lowercase name
struct Directives(HashMap<String, String>);

impl Directives {
    fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, value) = line
                .split_once(char::is_whitespace)
                .map(|(name, value)| (name, value.trim()))
                .unwrap_or((line, ""));

            let known = REQUIRED_DIRECTIVES
                .iter()
                .chain(OPTIONAL_DIRECTIVES.iter())
                .any(|directive| directive.eq_ignore_ascii_case(name));

            if !known {
                warn!("ignoring unknown config directive `{name}`");
                continue;
            }

            entries.insert(name.to_ascii_lowercase(), value.to_string());
        }

        Self(entries)
    }

    fn optional(&self, directive: &'static str) -> Option<&str> {
        self.0
            .get(&directive.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn required(&self, directive: &'static str) -> Result<&str, ConfigError> {
        self.optional(directive)
            .ok_or(ConfigError::MissingDirective(directive))
    }

    fn required_parsed<T: FromStr>(&self, directive: &'static str) -> Result<T, ConfigError> {
        let value = self.required(directive)?;
        parse_value(directive, value)
    }

    fn optional_parsed<T: FromStr>(&self, directive: &'static str) -> Result<Option<T>, ConfigError> {
        self.optional(directive)
            .map(|value| parse_value(directive, value))
            .transpose()
    }
}

fn parse_value<T: FromStr>(directive: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        directive,
        value: value.to_string(),
    })
}

fn non_negative(directive: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            directive,
            value: value.to_string(),
        })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let directives = Directives::parse(content);

        // first missing directive wins, in canonical order
        for directive in REQUIRED_DIRECTIVES {
            directives.required(directive)?;
        }

        let database = DatabaseConfig {
            backend: directives.optional_parsed("dbBackend")?.unwrap_or_default(),
            user: directives.required("dbUser")?.to_string(),
            password: directives.required("dbPass")?.to_string(),
            host: directives.required("dbHost")?.to_string(),
            name: directives.required("dbName")?.to_string(),
        };

        let mail = MailConfig {
            to: directives.required("eMailTo")?.to_string(),
            from: directives.required("eMailFrom")?.to_string(),
            smtp_host: directives
                .optional("smtpHost")
                .unwrap_or(DEFAULT_SMTP_HOST)
                .to_string(),
            smtp_port: directives
                .optional_parsed("smtpPort")?
                .unwrap_or(DEFAULT_SMTP_PORT),
        };

        let thresholds = Thresholds {
            load_abs: non_negative("loadThreshold", directives.required_parsed("loadThreshold")?)?,
            load_delta: non_negative(
                "loadFirstDThreshold",
                directives.required_parsed("loadFirstDThreshold")?,
            )?,
            swap_abs_pct: non_negative("swapThreshold", directives.required_parsed("swapThreshold")?)?,
            swap_delta_pct: non_negative(
                "swapFirstDThreshold",
                directives.required_parsed("swapFirstDThreshold")?,
            )?,
            disk_pct: directives.required_parsed("diskThreshold")?,
            disk_report_interval_secs: directives.required_parsed::<u32>("diskReportInterval")?.into(),
        };

        let sweep_interval = match directives.optional_parsed::<u64>("sweepInterval")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    directive: "sweepInterval",
                    value: "0".to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_SWEEP_INTERVAL,
        };

        let protocol = match directives.optional_parsed::<Protocol>("protocol")? {
            Some(Protocol::Form) => {
                return Err(ConfigError::InvalidValue {
                    directive: "protocol",
                    value: Protocol::Form.to_string(),
                });
            }
            Some(protocol) => protocol,
            None => Protocol::default(),
        };

        Ok(Config {
            database,
            mail,
            thresholds,
            sweep_interval,
            protocol,
        })
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    content
        .parse::<Config>()
        .inspect(|config| trace!("loaded config: {config:?}"))
}
