// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Talking to the NPM command-line client.
//!
//! We never resolve or install anything ourselves. Everything goes through
//! the `PackageManager` trait so that the pipeline can be driven by a fake
//! in tests.

use anyhow::anyhow;
use log::debug;
use std::process::{self, ExitStatus, Stdio};

use crate::{atry, errors::Result};

/// The external operations that the snapshot pipeline needs.
pub trait PackageManager {
    /// Look up the version published under a distribution tag. Returns the
    /// trimmed output, which is empty if the tag does not exist.
    fn show_dist_tag(&mut self, name: &str, tag: &str) -> Result<String>;

    /// Install dependencies as declared in the manifest, with the user's
    /// terminal attached.
    fn install(&mut self) -> Result<ExitStatus>;

    /// Regenerate the lockfile from the installed tree.
    fn shrinkwrap(&mut self) -> Result<ExitStatus>;
}

/// The real thing: runs `npm` (or a substitute) as a subprocess.
#[derive(Debug)]
pub struct NpmCli {
    command: String,
}

impl NpmCli {
    pub fn new<S: Into<String>>(command: S) -> Self {
        NpmCli {
            command: command.into(),
        }
    }

    fn cmd(&self) -> process::Command {
        process::Command::new(&self.command)
    }

    fn run_attached(&self, subcommand: &str) -> Result<ExitStatus> {
        debug!("running `{} {}`", self.command, subcommand);

        Ok(atry!(
            self.cmd().arg(subcommand).status();
            ["could not run `{} {}`", self.command, subcommand]
        ))
    }
}

impl PackageManager for NpmCli {
    fn show_dist_tag(&mut self, name: &str, tag: &str) -> Result<String> {
        // Dist-tags may legitimately contain slashes, so the tag is passed
        // through untouched.
        let selector = format!("dist-tags.{}", tag);
        debug!("running `{} show {} {}`", self.command, name, selector);

        let output = atry!(
            self.cmd().arg("show").arg(name).arg(&selector).stdin(Stdio::null()).output();
            ["could not run `{} show`", self.command]
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            return Err(match stderr.trim() {
                "" => anyhow!("`{} show` failed ({})", self.command, output.status),
                s => anyhow!("{}", s),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn install(&mut self) -> Result<ExitStatus> {
        self.run_attached("install")
    }

    fn shrinkwrap(&mut self) -> Result<ExitStatus> {
        self.run_attached("shrinkwrap")
    }
}
