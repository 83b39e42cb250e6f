use std::{env, error::Error, fmt, num::ParseIntError, path::PathBuf};

use machine_learning::{DevicePreference, ModelSource};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_CORS_ORIGIN: &str = "https://localhost:5000";
// 64 MiB leaves room for a few ResNet-18 split activations per request.
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Failures reading the server configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigErr {
    Missing(&'static str),
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::Missing(var) => write!(f, "missing environment variable {var}"),
            ConfigErr::Invalid { var, value, reason } => {
                write!(f, "invalid {var}={value:?}: {reason}")
            }
        }
    }
}

impl Error for ConfigErr {}

/// Everything the server reads from its environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model: ModelSource,
    pub class_index: PathBuf,
    pub static_dir: PathBuf,
    pub cors_origin: String,
    pub device: DevicePreference,
    /// The largest request body the server buffers.
    pub max_body_bytes: usize,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigErr> {
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Reads the configuration through `get`.
    ///
    /// # Arguments
    /// * `get` - Returns the value of a variable, if set.
    ///
    /// # Returns
    /// The configuration or an error naming the first missing or invalid variable.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigErr>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| get(var).ok_or(ConfigErr::Missing(var));

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|e: ParseIntError| ConfigErr::Invalid {
                var: "PORT",
                reason: e.to_string(),
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let device = match get("DEVICE") {
            Some(value) => value.parse().map_err(|reason| ConfigErr::Invalid {
                var: "DEVICE",
                value,
                reason,
            })?,
            None => DevicePreference::default(),
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(value) => value.parse().map_err(|e: ParseIntError| ConfigErr::Invalid {
                var: "MAX_BODY_BYTES",
                reason: e.to_string(),
                value,
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            model: ModelSource {
                weights: required("MODEL_WEIGHTS")?.into(),
                split: get("SPLIT_CONFIG").map(PathBuf::from),
                arch: get("ARCH_SPEC").map(PathBuf::from),
            },
            class_index: required("CLASS_INDEX")?.into(),
            static_dir: get("STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            device,
            max_body_bytes,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
