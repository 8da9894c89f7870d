// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! The resolved dependency tree, `npm-shrinkwrap.json`.
//!
//! After the pinned dependencies are installed, any of them that depends on
//! another pinned package may still carry its own nested copy at the old
//! version. We find those nested entries and point them at the pinned
//! version too, so that a second install materializes a consistent tree.
//!
//! Only one level of nesting is examined: the direct children of each
//! top-level entry belonging to a pinned package. Deeper entries are left
//! alone.

use serde_json::Value;
use std::path::Path;

use crate::{
    document::{JsonDocument, JsonMap},
    errors::Result,
    snapshot::ModifiedDependency,
};

/// Fields of a lock entry that embed the version as text.
const VERSIONED_TEXT_FIELDS: &[&str] = &["from", "resolved"];

#[derive(Debug)]
pub struct LockfileDocument {
    doc: JsonDocument,
}

impl LockfileDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(LockfileDocument {
            doc: JsonDocument::load(path)?,
        })
    }

    /// Rewrite nested entries for the pinned packages. Returns true if any
    /// entry was rewritten.
    ///
    /// Every pinned package is considered as a potential parent of every
    /// pinned package, itself included. Besides the classic nested
    /// `dependencies` tree, the flat `packages` table of newer lockfile
    /// formats is updated at the equivalent
    /// `node_modules/<parent>/node_modules/<name>` keys.
    pub fn rewrite_transitives(&mut self, modified: &[ModifiedDependency]) -> bool {
        let data = self.doc.data_mut();
        let mut changed = false;

        if let Some(top) = data.get_mut("dependencies").and_then(|v| v.as_object_mut()) {
            for dep in modified {
                for holder in modified {
                    let nested = match top
                        .get_mut(&holder.name)
                        .and_then(|e| e.get_mut("dependencies"))
                        .and_then(|v| v.as_object_mut())
                    {
                        Some(n) => n,
                        None => continue,
                    };

                    if let Some(entry) = nested.get_mut(&dep.name).and_then(|v| v.as_object_mut()) {
                        pin_entry(entry, &dep.version);
                        changed = true;
                    }
                }
            }
        }

        if let Some(packages) = data.get_mut("packages").and_then(|v| v.as_object_mut()) {
            for dep in modified {
                for holder in modified {
                    let key = format!("node_modules/{}/node_modules/{}", holder.name, dep.name);

                    if let Some(entry) = packages.get_mut(&key).and_then(|v| v.as_object_mut()) {
                        // A stale hash fails npm's integrity check.
                        if pin_entry(entry, &dep.version) {
                            entry.retain(|k, _| k != "integrity");
                        }
                        changed = true;
                    }
                }
            }
        }

        changed
    }

    pub fn persist(&self) -> Result<()> {
        self.doc.persist()
    }
}

/// Point a single lock entry at a new version, updating the textual fields
/// that mention the old one. Returns true if `resolved` now names a
/// different tarball.
fn pin_entry(entry: &mut JsonMap, new_version: &str) -> bool {
    let old_version = entry
        .get("version")
        .and_then(|v| v.as_str())
        .map(|s| s.to_owned());

    entry.insert("version".to_owned(), Value::String(new_version.to_owned()));

    let old_version = match old_version {
        Some(v) => v,
        None => return false,
    };

    let mut resolved_changed = false;

    for key in VERSIONED_TEXT_FIELDS {
        if let Some(Value::String(text)) = entry.get_mut(*key) {
            if let Some(updated) = replace_version_token(text, &old_version, new_version) {
                resolved_changed |= *key == "resolved" && *text != updated;
                *text = updated;
            }
        }
    }

    resolved_changed
}

/// Replace the first occurrence of `old` in `text` that stands on its own as
/// a version token, so that `1.1` is not found inside `11.1.0` or `1.1.0`.
/// Returns None if there is no such occurrence.
pub fn replace_version_token(text: &str, old: &str, new: &str) -> Option<String> {
    if old.is_empty() {
        return None;
    }

    for (start, _) in text.match_indices(old) {
        let end = start + old.len();

        let before_ok = match text[..start].chars().next_back() {
            Some(c) => !(c.is_ascii_alphanumeric() || c == '.'),
            None => true,
        };

        let rest = &text[end..];
        let mut after = rest.chars();
        let after_ok = match (after.next(), after.next()) {
            (None, _) => true,
            (Some(c), _) if c.is_ascii_alphanumeric() => false,
            (Some('.'), Some(d)) if d.is_ascii_digit() => false,
            (Some('-'), Some('0')) => is_prerelease_floor(rest),
            (Some('-'), Some(d)) | (Some('+'), Some(d)) if d.is_ascii_alphanumeric() => false,
            _ => true,
        };

        if before_ok && after_ok {
            let mut result = String::with_capacity(text.len() - old.len() + new.len());
            result.push_str(&text[..start]);
            result.push_str(new);
            result.push_str(&text[end..]);
            return Some(result);
        }
    }

    None
}

/// Whether `rest` opens with the `-0` suffix of a range like `^1.1.0-0`,
/// which admits prereleases but names no version of its own.
fn is_prerelease_floor(rest: &str) -> bool {
    match rest.strip_prefix("-0").and_then(|r| r.chars().next()) {
        None => rest.starts_with("-0"),
        Some(c) => !(c.is_ascii_alphanumeric() || c == '.'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn pinned() -> Vec<ModifiedDependency> {
        vec![
            ModifiedDependency::new("dep1", "1.1.1-alpha.1"),
            ModifiedDependency::new("dep2", "2.2.2-alpha.2"),
            ModifiedDependency::new("dep3", "3.3.3-alpha.3"),
        ]
    }

    fn lockfile(value: serde_json::Value) -> (tempfile::TempDir, LockfileDocument) {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("npm-shrinkwrap.json");
        fs::write(&p, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        let lf = LockfileDocument::load(&p).unwrap();
        (dir, lf)
    }

    fn dep1_entry() -> serde_json::Value {
        serde_json::json!({
            "version": "1.1.0",
            "from": "dep1@>=1.1.0 <2.0.0",
            "resolved": "http://my.npm.repo/dep1/-/dep1-1.1.0.tgz"
        })
    }

    fn other_entry() -> serde_json::Value {
        serde_json::json!({
            "version": "2.3.4",
            "from": "otherDep@>=1.0.0 <2.0.0",
            "resolved": "http://my.npm.repo/otherDep/-/otherDep-1.1.0.tgz"
        })
    }

    fn nested(lf: &LockfileDocument, holder: &str, name: &str) -> serde_json::Value {
        lf.doc.data()["dependencies"][holder]["dependencies"][name].clone()
    }

    #[test]
    fn no_transitives_means_no_change() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": { "dep1": {}, "dep2": {}, "dep3": {} }
        }));
        assert!(!lf.rewrite_transitives(&pinned()));
    }

    #[test]
    fn unrelated_transitives_mean_no_change() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": {
                "dep1": {},
                "dep3": { "dependencies": { "otherDep": other_entry() } }
            }
        }));
        assert!(!lf.rewrite_transitives(&pinned()));
        assert_eq!(nested(&lf, "dep3", "otherDep"), other_entry());
    }

    #[test]
    fn single_transitive_is_rewritten() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": {
                "dep1": {},
                "dep2": {},
                "dep3": { "dependencies": { "dep1": dep1_entry(), "otherDep": other_entry() } }
            }
        }));

        assert!(lf.rewrite_transitives(&pinned()));
        assert_eq!(
            nested(&lf, "dep3", "dep1"),
            serde_json::json!({
                "version": "1.1.1-alpha.1",
                "from": "dep1@>=1.1.1-alpha.1 <2.0.0",
                "resolved": "http://my.npm.repo/dep1/-/dep1-1.1.1-alpha.1.tgz"
            })
        );
        assert_eq!(nested(&lf, "dep3", "otherDep"), other_entry());
    }

    #[test]
    fn multiple_transitives_under_one_parent() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": {
                "dep3": { "dependencies": {
                    "dep1": dep1_entry(),
                    "dep2": {
                        "version": "2.2.1",
                        "from": "dep2@>=2.2.1 <2.0.0",
                        "resolved": "http://my.npm.repo/dep2/-/dep2-2.2.1.tgz"
                    },
                    "otherDep": other_entry()
                } }
            }
        }));

        assert!(lf.rewrite_transitives(&pinned()));
        assert_eq!(nested(&lf, "dep3", "dep1")["from"], "dep1@>=1.1.1-alpha.1 <2.0.0");
        assert_eq!(nested(&lf, "dep3", "dep2")["version"], "2.2.2-alpha.2");
        assert_eq!(nested(&lf, "dep3", "dep2")["from"], "dep2@>=2.2.2-alpha.2 <2.0.0");
        assert_eq!(
            nested(&lf, "dep3", "dep2")["resolved"],
            "http://my.npm.repo/dep2/-/dep2-2.2.2-alpha.2.tgz"
        );
        assert_eq!(nested(&lf, "dep3", "otherDep"), other_entry());
    }

    #[test]
    fn unpinned_parents_are_left_alone() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": {
                "dep2": { "dependencies": { "dep1": dep1_entry() } },
                "dep4": { "dependencies": { "dep1": dep1_entry(), "otherDep": other_entry() } }
            }
        }));

        assert!(lf.rewrite_transitives(&pinned()));
        assert_eq!(nested(&lf, "dep2", "dep1")["version"], "1.1.1-alpha.1");
        assert_eq!(nested(&lf, "dep4", "dep1"), dep1_entry());
        assert_eq!(nested(&lf, "dep4", "otherDep"), other_entry());
    }

    #[test]
    fn self_nested_entry_is_rewritten() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": { "dep1": { "dependencies": { "dep1": dep1_entry() } } }
        }));

        assert!(lf.rewrite_transitives(&pinned()[..1]));
        assert_eq!(nested(&lf, "dep1", "dep1")["version"], "1.1.1-alpha.1");
    }

    #[test]
    fn deeper_nesting_is_not_walked() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": {
                "dep3": { "dependencies": {
                    "otherDep": { "version": "2.3.4", "dependencies": { "dep1": dep1_entry() } }
                } }
            }
        }));

        assert!(!lf.rewrite_transitives(&pinned()));
        assert_eq!(
            lf.doc.data()["dependencies"]["dep3"]["dependencies"]["otherDep"]["dependencies"]["dep1"],
            dep1_entry()
        );
    }

    #[test]
    fn entries_without_text_fields() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "dependencies": {
                "dep3": { "dependencies": {
                    "dep1": { "version": "1.1.0" },
                    "dep2": { "resolved": "http://my.npm.repo/dep2/-/dep2-2.2.1.tgz" }
                } }
            }
        }));

        assert!(lf.rewrite_transitives(&pinned()));
        assert_eq!(nested(&lf, "dep3", "dep1"), serde_json::json!({ "version": "1.1.1-alpha.1" }));
        assert_eq!(
            nested(&lf, "dep3", "dep2"),
            serde_json::json!({
                "resolved": "http://my.npm.repo/dep2/-/dep2-2.2.1.tgz",
                "version": "2.2.2-alpha.2"
            })
        );
    }

    #[test]
    fn flat_packages_table_is_rewritten() {
        let (_dir, mut lf) = lockfile(serde_json::json!({
            "lockfileVersion": 2,
            "packages": {
                "node_modules/dep1": { "version": "1.1.1-alpha.1" },
                "node_modules/dep3/node_modules/dep1": {
                    "version": "1.1.0",
                    "resolved": "http://my.npm.repo/dep1/-/dep1-1.1.0.tgz",
                    "integrity": "sha512-abc"
                },
                "node_modules/dep4/node_modules/dep1": { "version": "1.1.0" },
                "node_modules/dep3/node_modules/dep2": {
                    "version": "2.2.1",
                    "resolved": "file:vendor/dep2.tgz",
                    "integrity": "sha512-def"
                }
            }
        }));

        assert!(lf.rewrite_transitives(&pinned()));
        let packages = &lf.doc.data()["packages"];
        assert_eq!(
            packages["node_modules/dep3/node_modules/dep1"],
            serde_json::json!({
                "version": "1.1.1-alpha.1",
                "resolved": "http://my.npm.repo/dep1/-/dep1-1.1.1-alpha.1.tgz"
            })
        );
        assert_eq!(packages["node_modules/dep4/node_modules/dep1"]["version"], "1.1.0");

        // `resolved` did not move, so its hash still holds.
        assert_eq!(
            packages["node_modules/dep3/node_modules/dep2"],
            serde_json::json!({
                "version": "2.2.2-alpha.2",
                "resolved": "file:vendor/dep2.tgz",
                "integrity": "sha512-def"
            })
        );
    }

    #[test]
    fn version_token_boundaries() {
        assert_eq!(
            replace_version_token("dep1@>=1.1.0 <2.0.0", "1.1.0", "1.1.1-alpha.1").as_deref(),
            Some("dep1@>=1.1.1-alpha.1 <2.0.0")
        );
        assert_eq!(
            replace_version_token("http://r/dep1/-/dep1-1.1.0.tgz", "1.1.0", "9.9.9").as_deref(),
            Some("http://r/dep1/-/dep1-9.9.9.tgz")
        );
        assert_eq!(replace_version_token("x@11.1.0", "1.1", "2.0"), None);
        assert_eq!(replace_version_token("x@1.1.0", "1.1", "2.0"), None);
        assert_eq!(replace_version_token("x@1.1.0-beta.1", "1.1.0", "2.0.0"), None);
        assert_eq!(
            replace_version_token("dep1@^1.1.0-0", "1.1.0", "2.0.0").as_deref(),
            Some("dep1@^2.0.0-0")
        );
        assert_eq!(
            replace_version_token("dep1@>=1.1.0-0 <2.0.0", "1.1.0", "2.0.0").as_deref(),
            Some("dep1@>=2.0.0-0 <2.0.0")
        );
        assert_eq!(replace_version_token("x@1.1.0-0a", "1.1.0", "2.0.0"), None);
        assert_eq!(replace_version_token("x@1.1.0-0.1", "1.1.0", "2.0.0"), None);
        assert_eq!(
            replace_version_token("lib1@1 <2", "1", "3").as_deref(),
            Some("lib1@3 <2")
        );
        assert_eq!(replace_version_token("anything", "", "1.0.0"), None);
    }

    #[test]
    fn persisted_output_matches_pretty_print() {
        let (dir, mut lf) = lockfile(serde_json::json!({
            "name": "app",
            "dependencies": { "dep3": { "version": "3.3.3-alpha.3", "dependencies": { "dep1": dep1_entry() } } }
        }));

        assert!(lf.rewrite_transitives(&pinned()));
        lf.persist().unwrap();

        let text = fs::read_to_string(dir.path().join("npm-shrinkwrap.json")).unwrap();
        assert_eq!(text, serde_json::to_string_pretty(lf.doc.data()).unwrap());
        assert!(text.starts_with("{\n  \"name\": \"app\",\n  \"dependencies\""));
    }
}
