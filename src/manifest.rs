// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! The project manifest, `package.json`.

use std::path::Path;

use crate::{
    document::{JsonDocument, JsonMap},
    errors::{Error, Result},
};

/// A `package.json` file, loaded once and written back at most once.
#[derive(Debug)]
pub struct ManifestDocument {
    doc: JsonDocument,
}

impl ManifestDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(ManifestDocument {
            doc: JsonDocument::load(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    /// The textual `version` field.
    pub fn version(&self) -> Result<&str> {
        self.doc
            .data()
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::MissingField(
                    self.doc.path().display().to_string(),
                    "string-typed `version`".to_owned(),
                )
                .into()
            })
    }

    pub fn set_version(&mut self, version: &str) {
        self.doc.data_mut().insert(
            "version".to_owned(),
            serde_json::Value::String(version.to_owned()),
        );
    }

    /// The current version requirement for a runtime dependency, if it has
    /// one.
    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.doc
            .data()
            .get("dependencies")
            .and_then(|v| v.as_object())
            .and_then(|deps| deps.get(name))
            .and_then(|v| v.as_str())
    }

    /// Pin a runtime dependency to an exact version, replacing whatever
    /// requirement it had. The `dependencies` table is created if needed.
    pub fn pin_dependency(&mut self, name: &str, version: &str) {
        let data = self.doc.data_mut();

        if !data.get("dependencies").map_or(false, |v| v.is_object()) {
            data.insert(
                "dependencies".to_owned(),
                serde_json::Value::Object(JsonMap::new()),
            );
        }

        if let Some(deps) = data.get_mut("dependencies").and_then(|v| v.as_object_mut()) {
            deps.insert(
                name.to_owned(),
                serde_json::Value::String(version.to_owned()),
            );
        }
    }

    pub fn persist(&self) -> Result<()> {
        self.doc.persist()
    }
}
