// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! State for the snapwrap CLI application.

use log::warn;
use std::{
    env,
    path::{Path, PathBuf},
    process::ExitStatus,
};

use crate::{
    atry,
    config::{ConfigurationFile, CONFIG_FILE_NAME},
    env::{maybe_var, NPM_COMMAND_VAR},
    errors::{Error, Result},
    npm::NpmCli,
};

/// The main application state structure.
#[derive(Debug)]
pub struct AppSession {
    /// The directory containing the manifest, which all relative paths are
    /// resolved against.
    root: PathBuf,

    /// The loaded configuration.
    config: ConfigurationFile,
}

impl AppSession {
    /// Initialize a new application session rooted in the current directory.
    pub fn initialize() -> Result<AppSession> {
        let root = atry!(
            env::current_dir();
            ["cannot determine the current working directory"]
        );
        Self::initialize_in(root)
    }

    /// Initialize a new application session rooted in the given directory.
    pub fn initialize_in<P: Into<PathBuf>>(root: P) -> Result<AppSession> {
        let root = root.into();
        let mut config = ConfigurationFile::get(root.join(CONFIG_FILE_NAME))?;

        if let Some(cmd) = maybe_var(NPM_COMMAND_VAR)? {
            config.npm.command = cmd;
        }

        Ok(AppSession { root, config })
    }

    /// Resolve a path given relative to the working directory.
    pub fn resolve_workdir<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root.join(path)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve_workdir(&self.config.files.manifest)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.resolve_workdir(&self.config.files.lockfile)
    }

    /// Get a handle on the configured package-manager client.
    pub fn npm(&self) -> NpmCli {
        NpmCli::new(self.config.npm.command.clone())
    }

    /// Decide what to do about the exit status of an install-like operation.
    ///
    /// The package manager has already reported any problem on the terminal,
    /// so by default a failure only gets a warning.
    pub fn check_exit(&self, operation: &str, status: ExitStatus) -> Result<()> {
        if status.success() {
            return Ok(());
        }

        let what = format!("{} {}", self.config.npm.command, operation);

        if self.config.npm.fail_on_install_error {
            Err(Error::ExternalProcess(what, status).into())
        } else {
            warn!("`{}` did not succeed ({}); continuing anyway", what, status);
            Ok(())
        }
    }
}
