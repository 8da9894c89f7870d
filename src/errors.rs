// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Error handling for the CLI application.
//!
//! Most fallible operations just return an `anyhow` error with some context
//! attached via `atry!`. The `Error` enum names the failures that callers
//! actually need to tell apart: configuration problems abort a run, while
//! tag-lookup problems are recorded and skipped.

use thiserror::Error;

/// The result type used throughout the application.
pub type Result<T> = anyhow::Result<T>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A prerelease snapshot was requested without a tag.
    #[error("a tag is necessary for prerelease snapshots")]
    TagRequired,

    /// The computed snapshot version is not valid semver, usually because
    /// the tag contains characters that semver does not allow.
    #[error("cannot form a valid snapshot version from \"{0}\": {1}")]
    InvalidSnapshotVersion(String, semver::Error),

    #[error("the dependency list `{0}` must be a JSON array of package names")]
    InvalidDependencyList(String),

    #[error("JSON file `{0}` does not have a {1} field")]
    MissingField(String, String),

    #[error("error checking tags for `{name}`: {message}")]
    TagQuery { name: String, message: String },

    #[error("no version specified for tag `{tag}` in dependency `{name}`")]
    NoTaggedVersion { name: String, tag: String },

    #[error("the command `{0}` failed ({1})")]
    ExternalProcess(String, std::process::ExitStatus),
}

/// "Annotated try": like `?`, but attaches a formatted context message to
/// the error on the way out.
///
/// ```ignore
/// let f = atry!(
///     File::open(&path);
///     ["failed to open `{}`", path.display()]
/// );
/// ```
#[macro_export]
macro_rules! atry {
    ($op:expr ; [ $($annotation:tt)+ ]) => {{
        use anyhow::Context;
        $op.with_context(|| format!($($annotation)+))?
    }};
}
