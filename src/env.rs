// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Helpers for environment variables.

use anyhow::anyhow;
use std::env;

use crate::errors::Result;

/// Environment variable overriding the package-manager command.
pub const NPM_COMMAND_VAR: &str = "SNAPWRAP_NPM";

/// Get an optional environment variable as a string.
///
/// If the variable is not present or is empty, return `Ok(None)`. If the
/// variable is present but cannot be converted into a string, return an `Err`.
pub fn maybe_var(key: &str) -> Result<Option<String>> {
    match env::var_os(key) {
        None => Ok(None),

        Some(os_str) => {
            let s = os_str
                .into_string()
                .map_err(|_| anyhow!("could not parse environment variable {} as Unicode", key))?;

            Ok(if s.is_empty() { None } else { Some(s) })
        }
    }
}
