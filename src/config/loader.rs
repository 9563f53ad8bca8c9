//! TOML configuration files (std only).

use std::fs;
use std::path::Path;

use heapless::String;

use crate::error::{ConfigError, Error, Result};

use super::{validate_config, ControllerConfig};

/// Read a controller configuration file and validate it.
///
/// A file that cannot be read gives [`ConfigError::IoError`]; otherwise the
/// result is that of [`parse_config`].
///
/// ```rust,ignore
/// let config = stepper_io::load_config("controller.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ControllerConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(ConfigError::IoError(truncated(&e.to_string()))))?;
    parse_config(&content)
}

/// Parse and validate TOML text.
pub fn parse_config(content: &str) -> Result<ControllerConfig> {
    let config = toml::from_str::<ControllerConfig>(content)
        .map_err(|e| Error::Config(ConfigError::ParseError(truncated(e.message()))))?;
    validate_config(&config)?;
    Ok(config)
}

/// Keep as much of `msg` as fits.
fn truncated<const N: usize>(msg: &str) -> String<N> {
    let mut out = String::new();
    for c in msg.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
