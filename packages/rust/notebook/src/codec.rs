//! Whole-document read/write for `.ipynb` files.
//!
//! Loading is all-or-nothing: any encoding or shape problem aborts before a
//! document exists. Saving writes to a temporary sibling and renames it into
//! place, so a failed save never leaves a partial file behind.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use nbmend_shared::{NbmendError, Result};

use crate::model::Document;

/// A document together with the fingerprint of the bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    /// SHA-256 (hex) of the file contents.
    pub fingerprint: String,
}

/// Parse notebook bytes into a [`Document`].
pub fn parse_document(bytes: &[u8]) -> Result<Document> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| NbmendError::structural(format!("notebook is not valid UTF-8: {e}")))?;

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| NbmendError::structural(format!("invalid JSON: {e}")))?;

    Document::from_json(value)
}

/// Serialize a document the way Jupyter writes it: one-space indentation,
/// key order preserved, trailing newline.
pub fn to_bytes(document: &Document) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);

    document
        .to_json()
        .serialize(&mut serializer)
        .map_err(|e| NbmendError::Serialization(format!("notebook serialization failed: {e}")))?;

    buf.push(b'\n');
    Ok(buf)
}

/// SHA-256 hex digest of raw bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read and parse a notebook file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<LoadedDocument> {
    let bytes = std::fs::read(path).map_err(|e| NbmendError::io(path, e))?;
    let document = parse_document(&bytes)?;

    debug!(blocks = document.len(), size = bytes.len(), "loaded notebook");

    Ok(LoadedDocument {
        document,
        fingerprint: fingerprint(&bytes),
    })
}

/// Write a notebook atomically. Returns the fingerprint of the written bytes.
#[instrument(skip_all, fields(path = %path.display(), blocks = document.len()))]
pub fn save(path: &Path, document: &Document) -> Result<String> {
    let bytes = to_bytes(document)?;
    write_atomic(path, &bytes)?;
    debug!(size = bytes.len(), "wrote notebook");
    Ok(fingerprint(&bytes))
}

/// Write bytes to a temporary sibling, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| NbmendError::config(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| NbmendError::io(&temp, e))?;

    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(NbmendError::io(path, e));
    }
    Ok(())
}

/// Find every notebook under `root`, skipping Jupyter checkpoint copies.
pub fn find_notebooks(root: &Path) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = format!("{escaped}/**/*.ipynb");

    let entries = glob::glob(&pattern)
        .map_err(|e| NbmendError::config(format!("invalid search root {}: {e}", root.display())))?;

    let mut notebooks = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            NbmendError::io(path, e.into_error())
        })?;
        if path
            .components()
            .any(|c| c.as_os_str() == ".ipynb_checkpoints")
        {
            continue;
        }
        notebooks.push(path);
    }

    notebooks.sort();
    debug!(root = %root.display(), count = notebooks.len(), "discovered notebooks");
    Ok(notebooks)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A notebook exactly as Jupyter writes it to disk.
    const JUPYTER_FILE: &str = r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": [
    "# Título\n",
    "Intro"
   ]
  },
  {
   "cell_type": "code",
   "execution_count": 2,
   "id": "b1c2",
   "metadata": {
    "tags": []
   },
   "outputs": [
    {
     "name": "stdout",
     "output_type": "stream",
     "text": [
      "0.30000000000000004\n"
     ]
    }
   ],
   "source": [
    "x = 0.1 + 0.2\n",
    "print(x)"
   ]
  }
 ],
 "metadata": {
  "kernelspec": {
   "display_name": "Python 3",
   "language": "python",
   "name": "python3"
  },
  "language_info": {
   "name": "python",
   "version": "3.11.4"
  },
  "zeta": 1.50
 },
 "nbformat": 4,
 "nbformat_minor": 5
}
"##;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nbmend-codec-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn unchanged_document_serializes_bit_for_bit() {
        let doc = parse_document(JUPYTER_FILE.as_bytes()).expect("parse");
        let bytes = to_bytes(&doc).expect("serialize");
        assert_eq!(String::from_utf8(bytes).unwrap(), JUPYTER_FILE);
    }

    #[test]
    fn invalid_utf8_is_structural() {
        let err = parse_document(&[0x7b, 0xff, 0xfe, 0x7d]).unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn invalid_json_is_structural() {
        let err = parse_document(b"{\"cells\": [").unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn save_then_load_keeps_fingerprint() {
        let tmp = temp_dir();
        let path = tmp.join("analysis.ipynb");
        let doc = parse_document(JUPYTER_FILE.as_bytes()).unwrap();

        let written = save(&path, &doc).expect("save");
        let loaded = load(&path).expect("load");

        assert_eq!(written, loaded.fingerprint);
        assert_eq!(loaded.fingerprint, fingerprint(JUPYTER_FILE.as_bytes()));
        assert!(!tmp.join(".analysis.ipynb.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn find_notebooks_skips_checkpoints() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("a/.ipynb_checkpoints")).unwrap();
        std::fs::write(tmp.join("a/one.ipynb"), "{}").unwrap();
        std::fs::write(tmp.join("a/.ipynb_checkpoints/one-checkpoint.ipynb"), "{}").unwrap();
        std::fs::write(tmp.join("two.ipynb"), "{}").unwrap();
        std::fs::write(tmp.join("notes.md"), "# notes").unwrap();

        let found = find_notebooks(&tmp).expect("glob");
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(&tmp).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a/one.ipynb", "two.ipynb"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
