// Copyright 2020-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! The snapwrap configuration file.
//!
//! Everything has a sensible default, so the file is optional. When present
//! it lives next to the manifest as `snapwrap.toml`.

use std::{fs::File, io::Read, path::Path};

use crate::{atry, errors::Result};

/// The name of the configuration file, relative to the working directory.
pub const CONFIG_FILE_NAME: &str = "snapwrap.toml";

/// The configuration file structures as explicitly serialized into the TOML
/// format.
mod syntax {
    use serde::{Deserialize, Serialize};

    /// The toplevel configuration structure.
    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct SerializedConfiguration {
        #[serde(default)]
        pub files: FilesConfiguration,

        #[serde(default)]
        pub npm: NpmConfiguration,
    }

    /// Locations of the files that get rewritten, relative to the working
    /// directory.
    #[derive(Clone, Debug, Deserialize, Serialize)]
    #[serde(default)]
    pub struct FilesConfiguration {
        pub manifest: String,
        pub lockfile: String,
    }

    impl Default for FilesConfiguration {
        fn default() -> Self {
            FilesConfiguration {
                manifest: "package.json".to_owned(),
                lockfile: "npm-shrinkwrap.json".to_owned(),
            }
        }
    }

    /// Configuration of the external package manager.
    #[derive(Clone, Debug, Deserialize, Serialize)]
    #[serde(default)]
    pub struct NpmConfiguration {
        /// The program to run.
        pub command: String,

        /// Whether a failing `install` or `shrinkwrap` aborts the run. By
        /// default the failure is only reported, since the package manager
        /// has already told the user what went wrong.
        pub fail_on_install_error: bool,
    }

    impl Default for NpmConfiguration {
        fn default() -> Self {
            NpmConfiguration {
                command: "npm".to_owned(),
                fail_on_install_error: false,
            }
        }
    }
}

pub use syntax::{FilesConfiguration, NpmConfiguration};

#[derive(Clone, Debug, Default)]
pub struct ConfigurationFile {
    pub files: FilesConfiguration,
    pub npm: NpmConfiguration,
}

impl ConfigurationFile {
    /// Load the configuration file, falling back to the defaults if it does
    /// not exist.
    pub fn get<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut f = match File::open(path) {
            Ok(f) => f,

            Err(e) => {
                return if e.kind() == std::io::ErrorKind::NotFound {
                    Ok(Self::default())
                } else {
                    Err(anyhow::Error::new(e)
                        .context(format!("failed to open config file `{}`", path.display())))
                }
            }
        };

        let mut text = String::new();
        atry!(
            f.read_to_string(&mut text);
            ["failed to read config file `{}`", path.display()]
        );

        Self::from_toml(&text)
            .map_err(|e| e.context(format!("in config file `{}`", path.display())))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let sercfg: syntax::SerializedConfiguration = atry!(
            toml::from_str(text);
            ["could not parse configuration as TOML"]
        );

        Ok(ConfigurationFile {
            files: sercfg.files,
            npm: sercfg.npm,
        })
    }
}
