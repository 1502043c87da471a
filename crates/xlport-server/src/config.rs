use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Package to seed exports from instead of the built-in template
    pub template: Option<PathBuf>,
    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            template: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let host = env::var("HOST").unwrap_or(defaults.host);
        let port = match env::var("PORT") {
            Ok(port) => port.parse()?,
            Err(_) => defaults.port,
        };
        let template = env::var_os("XLPORT_TEMPLATE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let max_body_bytes = match env::var("XLPORT_MAX_BODY_BYTES") {
            Ok(limit) => limit.parse()?,
            Err(_) => defaults.max_body_bytes,
        };

        Ok(Self {
            host,
            port,
            template,
            max_body_bytes,
        })
    }
}
