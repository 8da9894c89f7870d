// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! The main snapwrap command-line interface.
//!
//! Two unrelated helpers for CI snapshot builds of NPM packages: one stamps
//! a snapshot version into `package.json`, the other pins dependencies to
//! versions published under a dist-tag and makes the lockfile agree.

use log::{error, info, warn};
use std::path::PathBuf;
use structopt::StructOpt;

mod app;
mod config;
mod document;
mod env;
mod errors;
mod lockfile;
mod logger;
mod manifest;
mod npm;
mod snapshot;
mod version;

use errors::Result;

#[derive(Debug, PartialEq, StructOpt)]
#[structopt(about = "build testable snapshot artifacts of NPM projects")]
struct SnapwrapOptions {
    #[structopt(
        short = "v",
        long = "verbose",
        global = true,
        help = "Print debugging messages"
    )]
    verbose: bool,

    #[structopt(subcommand)]
    command: Commands,
}

trait Command {
    fn execute(self) -> Result<i32>;
}

#[derive(Debug, PartialEq, StructOpt)]
enum Commands {
    #[structopt(name = "install-snapshots", alias = "installSnapshots")]
    /// Install snapshot versions of dependencies published under a tag
    ///
    /// Every dependency named in the <dependencies-path> file that has a
    /// version published under <tag> is pinned to that version in
    /// package.json, then the project is installed and its lockfile updated
    /// to match.
    ///
    /// NOTE: this overwrites package.json and npm-shrinkwrap.json. Do NOT
    /// commit these changes to your repository.
    InstallSnapshots(InstallSnapshotsCommand),

    #[structopt(name = "snapshot-project", alias = "snapshotProject")]
    /// Set the project version to a snapshot version
    ///
    /// By default the new version is a prerelease of the next patch version,
    /// identified by the tag and build number: if the current version is
    /// 1.2.3, `snapshot-project 3 alpha` gives 1.2.4-alpha.3. With --patch
    /// the build number replaces the patch number instead, giving 1.2.3.
    ///
    /// NOTE: this overwrites the version in package.json. Do NOT commit this
    /// change to your repository.
    SnapshotProject(SnapshotProjectCommand),
}

impl Command for Commands {
    fn execute(self) -> Result<i32> {
        match self {
            Commands::InstallSnapshots(o) => o.execute(),
            Commands::SnapshotProject(o) => o.execute(),
        }
    }
}

fn main() {
    let opts = SnapwrapOptions::from_args();

    if let Err(e) = logger::Logger::init() {
        eprintln!("error: cannot initialize logging backend: {}", e);
        std::process::exit(1);
    }

    log::set_max_level(if opts.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let exitcode = match opts.command.execute() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            e.chain()
                .skip(1)
                .for_each(|cause| logger::Logger::print_cause(cause));
            1
        }
    };

    std::process::exit(exitcode);
}

// install-snapshots

#[derive(Debug, PartialEq, StructOpt)]
struct InstallSnapshotsCommand {
    #[structopt(
        help = "Path to a JSON file containing an array of the dependencies to install",
        parse(from_os_str)
    )]
    dependencies_path: PathBuf,

    #[structopt(help = "The dist-tag used when publishing snapshots of the dependencies")]
    tag: String,
}

impl Command for InstallSnapshotsCommand {
    fn execute(self) -> Result<i32> {
        let sess = app::AppSession::initialize()?;
        let mut npm = sess.npm();

        let report =
            snapshot::install_snapshots(&sess, &mut npm, &self.dependencies_path, &self.tag)?;

        let n_pinned = report.resolution.modified.len();

        if n_pinned == 0 {
            warn!(
                "no dependencies have a version published under the tag `{}`",
                self.tag
            );
        } else {
            info!(
                "{} of {} dependencies pinned to `{}` snapshots{}",
                n_pinned,
                n_pinned + report.resolution.skipped.len(),
                self.tag,
                if report.transitives_updated {
                    ", including transitive dependencies"
                } else {
                    ""
                }
            );
            warn!("do not commit the modified manifest or lockfile");
        }

        Ok(0)
    }
}

// snapshot-project

#[derive(Debug, PartialEq, StructOpt)]
struct SnapshotProjectCommand {
    #[structopt(
        long = "prerelease",
        conflicts_with = "patch",
        help = "Generate a snapshot as a prerelease version (the default; requires a tag)"
    )]
    prerelease: bool,

    #[structopt(long = "patch", help = "Generate a snapshot as a patch version")]
    patch: bool,

    #[structopt(help = "The build number that uniquely identifies this snapshot")]
    build_number: u64,

    #[structopt(help = "The tag that identifies this snapshot in the registry")]
    tag: Option<String>,
}

impl SnapshotProjectCommand {
    fn mode(&self) -> version::SnapshotMode {
        if self.patch {
            version::SnapshotMode::Patch
        } else {
            version::SnapshotMode::Prerelease
        }
    }
}

impl Command for SnapshotProjectCommand {
    fn execute(self) -> Result<i32> {
        let sess = app::AppSession::initialize()?;

        if self.patch && self.tag.is_some() {
            warn!("the tag is ignored for patch snapshots");
        }

        version::stamp_manifest(
            sess.manifest_path(),
            self.build_number,
            self.tag.as_deref(),
            self.mode(),
        )?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<SnapwrapOptions, structopt::clap::Error> {
        SnapwrapOptions::from_iter_safe(std::iter::once("snapwrap").chain(args.iter().copied()))
    }

    #[test]
    fn snapshot_project_defaults_to_prerelease() {
        let opts = parse(&["snapshot-project", "4", "feature/alpha"]).unwrap();

        match opts.command {
            Commands::SnapshotProject(c) => {
                assert_eq!(c.mode(), version::SnapshotMode::Prerelease);
                assert_eq!(c.build_number, 4);
                assert_eq!(c.tag.as_deref(), Some("feature/alpha"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn snapshot_project_patch_and_alias() {
        let opts = parse(&["-v", "snapshotProject", "--patch", "12"]).unwrap();
        assert!(opts.verbose);

        match opts.command {
            Commands::SnapshotProject(c) => {
                assert_eq!(c.mode(), version::SnapshotMode::Patch);
                assert_eq!(c.tag, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn mode_flags_conflict() {
        assert!(parse(&["snapshot-project", "--patch", "--prerelease", "4", "alpha"]).is_err());
        assert!(parse(&["snapshot-project", "four", "alpha"]).is_err());
    }

    #[test]
    fn install_snapshots_arguments() {
        let opts = parse(&["installSnapshots", "deps.json", "my/feature/alpha"]).unwrap();

        assert_eq!(
            opts.command,
            Commands::InstallSnapshots(InstallSnapshotsCommand {
                dependencies_path: PathBuf::from("deps.json"),
                tag: "my/feature/alpha".to_owned(),
            })
        );
    }
}
