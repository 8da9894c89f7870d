// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Snapshot version numbers.
//!
//! A snapshot build gets a version derived from the manifest's current one
//! plus a CI build number. Neither scheme guarantees a sensible ordering
//! against real releases: a prerelease of the next patch sorts above the
//! current release, but a patch snapshot may sort anywhere.

use log::info;
use std::path::Path;

use crate::{
    atry,
    errors::{Error, Result},
    manifest::ManifestDocument,
};

/// How the snapshot version is formed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SnapshotMode {
    /// `{major}.{minor}.{patch + 1}-{tag}.{build}`. Requires a tag.
    Prerelease,

    /// `{major}.{minor}.{build}`. Any tag is ignored.
    Patch,
}

/// Reduce a branch-like tag such as `feature/sub/alpha` to its last path
/// component, since slashes are not allowed in semver identifiers.
pub fn normalize_tag(tag: &str) -> &str {
    tag.rsplit('/').next().unwrap_or(tag)
}

/// The next patch version, following npm's rules: a prerelease of `x.y.z`
/// bumps to `x.y.z` itself, anything else to `x.y.(z+1)`. Build metadata is
/// dropped.
pub fn next_patch(v: &semver::Version) -> semver::Version {
    if v.pre.is_empty() {
        semver::Version::new(v.major, v.minor, v.patch + 1)
    } else {
        semver::Version::new(v.major, v.minor, v.patch)
    }
}

/// The tag that prerelease mode will use. Patch mode needs none, and an
/// empty tag counts as no tag.
fn required_tag(tag: Option<&str>, mode: SnapshotMode) -> Result<Option<&str>> {
    let tag = tag.filter(|t| !t.is_empty());

    match mode {
        SnapshotMode::Patch => Ok(None),
        SnapshotMode::Prerelease => match tag {
            Some(tag) => Ok(Some(tag)),
            None => Err(Error::TagRequired.into()),
        },
    }
}

/// Compute a snapshot version from the current version text.
pub fn snapshot_version(
    current: &str,
    build_number: u64,
    tag: Option<&str>,
    mode: SnapshotMode,
) -> Result<semver::Version> {
    let tag = required_tag(tag, mode)?;

    let current = atry!(
        semver::Version::parse(current);
        ["cannot parse version \"{}\" as a semver version", current]
    );

    match tag {
        None => Ok(semver::Version::new(
            current.major,
            current.minor,
            build_number,
        )),

        Some(tag) => {
            let text = format!(
                "{}-{}.{}",
                next_patch(&current),
                normalize_tag(tag),
                build_number
            );

            semver::Version::parse(&text)
                .map_err(|e| Error::InvalidSnapshotVersion(text, e).into())
        }
    }
}

/// Rewrite the manifest's version to a snapshot version, returning the new
/// version.
///
/// A missing tag in prerelease mode is reported before the manifest is even
/// opened.
pub fn stamp_manifest<P: AsRef<Path>>(
    path: P,
    build_number: u64,
    tag: Option<&str>,
    mode: SnapshotMode,
) -> Result<String> {
    required_tag(tag, mode)?;
    let mut manifest = ManifestDocument::load(path)?;
    stamp(&mut manifest, build_number, tag, mode)
}

/// Stamp an already-loaded manifest and write it back.
fn stamp(
    manifest: &mut ManifestDocument,
    build_number: u64,
    tag: Option<&str>,
    mode: SnapshotMode,
) -> Result<String> {
    let new_version = snapshot_version(manifest.version()?, build_number, tag, mode)?.to_string();

    manifest.set_version(&new_version);
    manifest.persist()?;

    info!(
        "updated version in `{}` to: {}",
        manifest.path().display(),
        new_version
    );
    Ok(new_version)
}
