// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Installing tagged snapshots of a project's dependencies.
//!
//! The pipeline is:
//!
//! 1. Ask the package manager which version each listed dependency has
//!    published under the tag, and pin the manifest to it.
//! 2. Write the manifest (only if something was pinned) and install.
//! 3. Regenerate the lockfile.
//! 4. Point nested lockfile entries of pinned packages at the pinned
//!    versions, and install again if anything changed.
//!
//! The set of pinned dependencies found in step 1 is the only state passed
//! between the steps. Nothing is rolled back if a later step fails, so the
//! working tree may be left modified.

use log::{debug, error, info};
use std::{collections::HashSet, fs, path::Path};

use crate::{
    app::AppSession,
    atry,
    errors::{Error, Result},
    lockfile::LockfileDocument,
    manifest::ManifestDocument,
    npm::PackageManager,
};

/// A dependency whose manifest requirement was pinned to a published
/// version during this run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModifiedDependency {
    pub name: String,
    pub version: String,
}

impl ModifiedDependency {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        ModifiedDependency {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// The outcome of looking up a tag for a list of dependencies.
#[derive(Debug, Default)]
pub struct TagResolution {
    /// Dependencies that were pinned, in input order.
    pub modified: Vec<ModifiedDependency>,

    /// Dependencies that were left alone, with the reason why.
    pub skipped: Vec<Error>,
}

/// A summary of a complete `install-snapshots` run.
#[derive(Debug)]
pub struct InstallReport {
    pub resolution: TagResolution,
    pub transitives_updated: bool,
}

/// Load the list of dependency names to consider: a JSON array of strings.
pub fn load_dependency_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();

    let text = atry!(
        fs::read_to_string(path);
        ["failed to open dependency list `{}`", path.display()]
    );
    let value: serde_json::Value = atry!(
        serde_json::from_str(&text);
        ["failed to parse dependency list `{}` as JSON", path.display()]
    );

    let invalid = || Error::InvalidDependencyList(path.display().to_string());

    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(|s| s.to_owned()).ok_or_else(invalid))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| e.into())
}

/// Look up the version published under `tag` for each named dependency and
/// pin the manifest's requirement to it.
///
/// Each name is queried once, in order. A failed or empty lookup is logged
/// and recorded, and that dependency is left alone; it never aborts the
/// rest of the run.
pub fn resolve_tagged_versions<P: PackageManager + ?Sized>(
    manifest: &mut ManifestDocument,
    npm: &mut P,
    names: &[String],
    tag: &str,
) -> TagResolution {
    let mut resolution = TagResolution::default();
    let mut seen = HashSet::new();

    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }

        let failure = match npm.show_dist_tag(name, tag) {
            Err(e) => Error::TagQuery {
                name: name.clone(),
                message: format!("{:#}", e),
            },

            Ok(ref version) if version.trim().is_empty() => Error::NoTaggedVersion {
                name: name.clone(),
                tag: tag.to_owned(),
            },

            Ok(version) => {
                let version = version.trim();
                debug!(
                    "previous requirement for {}: {}",
                    name,
                    manifest.dependency(name).unwrap_or("(none)")
                );
                info!("updating dependency {} to version {}", name, version);
                manifest.pin_dependency(name, version);
                resolution
                    .modified
                    .push(ModifiedDependency::new(name.as_str(), version));
                continue;
            }
        };

        error!("{}", failure);

        if let Error::NoTaggedVersion { .. } = failure {
            error!("... no modification was made to the manifest for this dependency");
        }

        resolution.skipped.push(failure);
    }

    resolution
}

/// Write the manifest if, and only if, some dependency was pinned.
///
/// Returns whether the file was written.
pub fn patch_manifest(manifest: &ManifestDocument, modified: &[ModifiedDependency]) -> Result<bool> {
    if modified.is_empty() {
        return Ok(false);
    }

    manifest.persist()?;
    Ok(true)
}

/// Rewrite nested lockfile entries for the pinned dependencies, and if
/// anything changed, save the lockfile and install again so the new
/// versions land on disk.
///
/// Returns whether the lockfile was rewritten.
pub fn update_transitive_dependencies<P: PackageManager + ?Sized>(
    sess: &AppSession,
    npm: &mut P,
    modified: &[ModifiedDependency],
) -> Result<bool> {
    if modified.is_empty() {
        return Ok(false);
    }

    let mut lockfile = LockfileDocument::load(sess.lockfile_path())?;
    rewrite_and_reinstall(sess, npm, &mut lockfile, modified)
}

fn rewrite_and_reinstall<P: PackageManager + ?Sized>(
    sess: &AppSession,
    npm: &mut P,
    lockfile: &mut LockfileDocument,
    modified: &[ModifiedDependency],
) -> Result<bool> {
    if !lockfile.rewrite_transitives(modified) {
        info!("no transitive dependencies needed updating");
        return Ok(false);
    }

    lockfile.persist()?;

    info!("installing updated transitive dependencies");
    sess.check_exit("install", npm.install()?)?;
    Ok(true)
}

/// Run the whole `install-snapshots` pipeline.
pub fn install_snapshots<P: PackageManager + ?Sized>(
    sess: &AppSession,
    npm: &mut P,
    dependencies_path: &Path,
    tag: &str,
) -> Result<InstallReport> {
    let mut manifest = ManifestDocument::load(sess.manifest_path())?;
    let names = load_dependency_names(sess.resolve_workdir(dependencies_path))?;

    let resolution = resolve_tagged_versions(&mut manifest, &mut *npm, &names, tag);
    patch_manifest(&manifest, &resolution.modified)?;

    info!("installing new modules");
    sess.check_exit("install", npm.install()?)?;

    info!("regenerating the lockfile");
    sess.check_exit("shrinkwrap", npm.shrinkwrap()?)?;

    let transitives_updated = update_transitive_dependencies(sess, &mut *npm, &resolution.modified)?;

    Ok(InstallReport {
        resolution,
        transitives_updated,
    })
}
