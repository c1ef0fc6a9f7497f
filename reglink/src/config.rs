//! Configuration for peripheral links.
//!
//! This module handles loading and validating link settings from TOML
//! files. A host program typically keeps one `[link]`-style table per
//! attached peripheral and hands the parsed [`LinkConfig`] to
//! [`Device::open`](crate::device::Device::open).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// How session bootstrap treats a malformed identify response.
///
/// Peripherals answer READ_IFVER and READ_PROJID with a SINGLE reply once
/// their register file is up; during early bring-up they may answer with
/// anything. Tolerant mode records nothing and carries on, strict mode
/// refuses to construct the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapPolicy {
    /// A non-SINGLE identify response leaves the field unset.
    #[default]
    Tolerant,
    /// A non-SINGLE identify response fails construction.
    Strict,
}

/// Connection settings for one peripheral link.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Serial device path (e.g. `/dev/ttyUSB0`)
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Identify-response handling during session bootstrap
    #[serde(default)]
    pub bootstrap: BootstrapPolicy,
}

fn default_baud() -> u32 {
    921_600
}

impl LinkConfig {
    /// Settings for `port` with the default baud rate and bootstrap policy.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: default_baud(),
            bootstrap: BootstrapPolicy::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}
