/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    config.rs

    Controller configuration. Loaded from the [hfdc] table of a machine
    configuration file, or built directly by the host.
*/

use serde_derive::Deserialize;

pub const DEFAULT_COMMAND_LOG_LEN: usize = 1000;

const fn _default_command_log_len() -> usize {
    DEFAULT_COMMAND_LOG_LEN
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error parsing controller configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid controller configuration: {0}")]
    InvalidValue(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Hdc9234Config {
    /// Emit the index address mark (sync, IAM and gap 1) when formatting or
    /// synthesizing a track. Most sector image formats expect this to be off.
    #[serde(default)]
    pub full_track_layout: bool,
    /// Collapse every mechanical delay to a single microsecond.
    #[serde(default)]
    pub fast_timing: bool,
    #[serde(default = "_default_command_log_len")]
    pub command_log_len: usize,
}

impl Default for Hdc9234Config {
    fn default() -> Self {
        Self {
            full_track_layout: false,
            fast_timing: false,
            command_log_len: DEFAULT_COMMAND_LOG_LEN,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    hfdc: Option<Hdc9234Config>,
}

impl Hdc9234Config {
    /// Parse a configuration from TOML. Accepts either a bare table or one
    /// nested under `[hfdc]`.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        let config = match file.hfdc {
            Some(config) => config,
            None => toml::from_str::<Hdc9234Config>(toml_str)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_log_len > 1_000_000 {
            return Err(ConfigError::InvalidValue(format!(
                "command_log_len {} is out of range",
                self.command_log_len
            )));
        }
        Ok(())
    }
}
