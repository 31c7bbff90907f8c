//! Worker hostname resolution.
//!
//! The hostname identifies this worker instance to the store: claims are
//! keyed by it, and peer workers use it to tell claims apart. Resolution
//! order: explicit configuration, the `HOSTNAME` environment variable, then
//! the OS hostname.

use crate::error::ConfigError;

/// Resolves the worker hostname, preferring an explicit override.
pub(crate) fn resolve(explicit: Option<String>) -> Result<String, ConfigError> {
    if let Some(hostname) = explicit
        && !hostname.is_empty()
    {
        return Ok(hostname);
    }

    // Container runtimes conventionally inject HOSTNAME; it is more stable
    // than the kernel hostname inside some sandboxes.
    if let Ok(hostname) = std::env::var("HOSTNAME")
        && !hostname.is_empty()
    {
        return Ok(hostname);
    }

    let hostname = hostname::get().map_err(ConfigError::Hostname)?;
    Ok(hostname.to_string_lossy().into_owned())
}
