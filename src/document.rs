// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Loading and storing JSON files that we only partially understand.
//!
//! Both `package.json` and `npm-shrinkwrap.json` contain far more than we
//! touch, so they're held as ordered `serde_json` maps and written back in
//! the same key order, pretty-printed with two-space indentation. There's
//! still no format-preserving JSON library, so hand-formatted files may pick
//! up whitespace diffs.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{atry, errors::Result};

pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A JSON object loaded from a file.
#[derive(Debug)]
pub struct JsonDocument {
    path: PathBuf,
    data: JsonMap,
    trailing_newline: bool,
}

impl JsonDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();

        let text = atry!(
            fs::read_to_string(&path);
            ["failed to open file `{}`", path.display()]
        );
        let data: JsonMap = atry!(
            serde_json::from_str(&text);
            ["failed to parse file `{}` as a JSON object", path.display()]
        );

        Ok(JsonDocument {
            trailing_newline: text.ends_with('\n'),
            path,
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &JsonMap {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut JsonMap {
        &mut self.data
    }

    /// Render the document the way it will be written to disk.
    pub fn to_pretty_string(&self) -> Result<String> {
        let mut text = atry!(
            serde_json::to_string_pretty(&self.data);
            ["failed to serialize JSON for `{}`", self.path.display()]
        );

        if self.trailing_newline {
            text.push('\n');
        }

        Ok(text)
    }

    /// Overwrite the backing file with the current contents.
    ///
    /// The write goes through a temporary file that is renamed into place,
    /// so a failure leaves the previous contents intact.
    pub fn persist(&self) -> Result<()> {
        let text = self.to_pretty_string()?;

        let af = atomicwrites::AtomicFile::new(
            &self.path,
            atomicwrites::OverwriteBehavior::AllowOverwrite,
        );

        let r = af.write(|f| f.write_all(text.as_bytes()));

        match r {
            Err(atomicwrites::Error::Internal(e)) | Err(atomicwrites::Error::User(e)) => {
                Err(anyhow::Error::new(e)
                    .context(format!("failed to overwrite JSON file `{}`", self.path.display())))
            }
            Ok(()) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_keeps_order_and_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("package.json");
        let text = "{\n  \"name\": \"demo\",\n  \"zeta\": [\n    1,\n    true,\n    null\n  ],\n  \"alpha\": {\n    \"nested\": \"x\"\n  },\n  \"version\": \"1.0.0\"\n}\n";
        fs::write(&p, text).unwrap();

        let doc = JsonDocument::load(&p).unwrap();
        doc.persist().unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), text);
    }

    #[test]
    fn missing_trailing_newline_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.json");
        fs::write(&p, "{\"a\":1}").unwrap();

        let doc = JsonDocument::load(&p).unwrap();
        assert_eq!(doc.to_pretty_string().unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn non_object_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.json");
        fs::write(&p, "[1, 2]").unwrap();
        assert!(JsonDocument::load(&p).is_err());
    }
}
