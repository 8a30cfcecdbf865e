// config.rs - Run configuration shared by the interpreter and the JIT

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_TAPE_SIZE: usize = 30000;
pub const DEFAULT_MAX_NESTING: usize = 100;

/// How a cursor move that leaves the tape is handled, by either engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// The tape is a ring: moves wrap modulo the capacity.
    #[default]
    Wrap,
    /// A move outside `[0, capacity)` is reported as an error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tape_size: usize,
    pub max_nesting: usize,
    pub cursor: CursorMode,
    /// Descriptor `,` reads from.
    pub input_fd: i32,
    /// Descriptor `.` writes to.
    pub output_fd: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tape_size: DEFAULT_TAPE_SIZE,
            max_nesting: DEFAULT_MAX_NESTING,
            cursor: CursorMode::Wrap,
            input_fd: 0,
            output_fd: 1,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tape_size == 0 {
            return Err(Error::Config("tape_size must be at least 1".to_string()));
        }
        if self.max_nesting == 0 {
            return Err(Error::Config("max_nesting must be at least 1".to_string()));
        }
        if self.input_fd < 0 || self.output_fd < 0 {
            return Err(Error::Config("file descriptors must be non-negative".to_string()));
        }
        Ok(())
    }
}
