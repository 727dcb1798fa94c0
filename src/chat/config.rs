//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, an optional YAML
//! configuration file, and the resolved [`ChatConfig`].
//!
//! Values are layered, later sources winning: built-in defaults, the
//! `PALAVER_API_BASE_URL` environment variable, the YAML file, and finally the
//! command line.

use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default address of the chat service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Environment variable that overrides the default service address.
pub const BASE_URL_ENV: &str = "PALAVER_API_BASE_URL";

/// Default transport timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Command-line arguments for the palaver-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat service.
    #[arrrg(optional, "Chat service base URL (default: http://127.0.0.1:5000)", "URL")]
    pub endpoint: Option<String>,

    /// Transport timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 120)", "SECONDS")]
    pub timeout_secs: Option<u32>,

    /// Path to a YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Settings read from a YAML configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base URL of the chat service.
    pub base_url: Option<String>,
    /// Transport timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Whether to use ANSI colors and styles.
    pub use_color: Option<bool>,
}

impl ConfigFile {
    /// Parse a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Base URL of the chat service; requests go to `{base_url}/api/chat`.
    pub base_url: String,

    /// Transport timeout for a whole exchange.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: http://127.0.0.1:5000
    /// - Timeout: 120 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
        }
    }

    /// Sets the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Resolve the configuration from the process environment and `args`.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    /// Resolve the configuration using `env` to look up environment variables.
    pub fn resolve(args: ChatArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new();
        if let Some(base_url) = env(BASE_URL_ENV).filter(|value| !value.trim().is_empty()) {
            config.base_url = base_url;
        }
        if let Some(path) = &args.config {
            config = config.merge_file(ConfigFile::from_file(path)?)?;
        }
        if let Some(endpoint) = args.endpoint {
            config.base_url = endpoint;
        }
        if let Some(secs) = args.timeout_secs {
            config.timeout = timeout_from_secs(u64::from(secs))?;
        }
        if args.no_color {
            config.use_color = false;
        }
        Ok(config)
    }

    /// Overlay the values present in `file`.
    pub fn merge_file(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = timeout_from_secs(secs)?;
        }
        if let Some(use_color) = file.use_color {
            self.use_color = use_color;
        }
        Ok(self)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn timeout_from_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::config("timeout must be at least one second"));
    }
    Ok(Duration::from_secs(secs))
}
