use directories::ProjectDirs;
use doc_model::Annotation;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::PathBuf;

const ANNOTATIONS_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("stored annotations belong to document {found}, expected {expected}")]
    KeyMismatch { expected: String, found: String },
}

/// Content-derived key for a document's saved annotations.
///
/// Hex SHA-256 of the source bytes, so annotations made on one file are never
/// offered for another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

/// A document's saved annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAnnotations {
    /// Pixels per point the annotations' screen coordinates were measured at.
    /// `None` for sets written before the scale was recorded.
    pub display_scale: Option<f32>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnnotationsEnvelope {
    version: u32,
    document_key: DocumentKey,
    #[serde(default)]
    display_scale: Option<f32>,
    annotations: Vec<Annotation>,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfAnnotator", "PdfAnnotator")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Saved annotations for `key`, or `None` when nothing was saved.
    pub fn load_annotations(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<SavedAnnotations>, StorageError> {
        let path = self.annotations_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let envelope: AnnotationsEnvelope = serde_json::from_slice(&bytes)?;

        if envelope.document_key != *key {
            return Err(StorageError::KeyMismatch {
                expected: key.to_string(),
                found: envelope.document_key.to_string(),
            });
        }

        tracing::debug!(
            key = %key,
            version = envelope.version,
            count = envelope.annotations.len(),
            "loaded annotations"
        );
        Ok(Some(SavedAnnotations {
            display_scale: envelope.display_scale,
            annotations: envelope.annotations,
        }))
    }

    /// Replaces the whole saved set for `key`.
    ///
    /// `display_scale` is the scale the annotations' screen coordinates were
    /// measured at.
    pub fn save_annotations(
        &self,
        key: &DocumentKey,
        display_scale: f32,
        annotations: &[Annotation],
    ) -> Result<(), StorageError> {
        let path = self.annotations_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = AnnotationsEnvelope {
            version: ANNOTATIONS_SCHEMA_VERSION,
            document_key: key.clone(),
            display_scale: Some(display_scale),
            annotations: annotations.to_vec(),
        };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(key = %key, count = annotations.len(), "saved annotations");
        Ok(())
    }

    pub fn clear_annotations(&self, key: &DocumentKey) -> Result<(), StorageError> {
        let path = self.annotations_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn annotations_path(&self, key: &DocumentKey) -> PathBuf {
        self.root.join("annotations").join(format!("{key}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{FontSize, ScreenPoint};

    fn sample_annotations() -> Vec<Annotation> {
        let mut first = Annotation::new(0, ScreenPoint::new(100.0, 50.0));
        first.text = "Reviewed".to_owned();
        let mut second = Annotation::new(1, ScreenPoint::new(12.5, 600.0));
        second.font_size = FontSize::Large;
        vec![first, second]
    }

    #[test]
    fn annotations_round_trip_in_order() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let key = DocumentKey::from_bytes(b"%PDF-1.7 one");
        let annotations = sample_annotations();

        store.save_annotations(&key, 1.5, &annotations).expect("save should succeed");
        let loaded = store.load_annotations(&key).expect("load should succeed");

        assert_eq!(loaded, Some(SavedAnnotations { display_scale: Some(1.5), annotations }));
    }

    #[test]
    fn load_empty_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded =
            store.load_annotations(&DocumentKey::from_bytes(b"never saved")).expect("load");
        assert_eq!(loaded, None);
    }

    #[test]
    fn documents_do_not_share_annotations() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let first = DocumentKey::from_bytes(b"first document");
        let second = DocumentKey::from_bytes(b"second document");

        store.save_annotations(&first, 1.0, &sample_annotations()).expect("save");

        assert_ne!(first, second);
        assert_eq!(store.load_annotations(&second).expect("load"), None);
    }

    #[test]
    fn save_overwrites_previous_set() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let key = DocumentKey::from_bytes(b"doc");

        store.save_annotations(&key, 1.0, &sample_annotations()).expect("save");
        store.save_annotations(&key, 2.0, &[]).expect("save");

        let saved = store.load_annotations(&key).expect("load").expect("set exists");
        assert!(saved.annotations.is_empty());
        assert_eq!(saved.display_scale, Some(2.0));
    }

    #[test]
    fn clear_removes_saved_set() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let key = DocumentKey::from_bytes(b"doc");

        store.save_annotations(&key, 1.0, &sample_annotations()).expect("save");
        store.clear_annotations(&key).expect("clear");
        store.clear_annotations(&key).expect("clearing twice is fine");

        assert_eq!(store.load_annotations(&key).expect("load"), None);
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = DocumentKey::from_bytes(b"abc");

        assert_eq!(
            key.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sets_without_recorded_scale_still_load() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let key = DocumentKey::from_bytes(b"doc");
        let annotation = Annotation::new(0, ScreenPoint::new(3.0, 4.0));

        let legacy = serde_json::json!({
            "version": 1,
            "document_key": key.as_str(),
            "annotations": [annotation.clone()],
        });
        let path = store.annotations_path(&key);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, serde_json::to_vec(&legacy).expect("json")).expect("write");

        let saved = store.load_annotations(&key).expect("load").expect("set exists");
        assert_eq!(saved.display_scale, None);
        assert_eq!(saved.annotations, vec![annotation]);
    }
}
