//! In-memory document vault for the dashboard.
//!
//! Holds at most one PDF per [`DocumentCategory`]; a second upload in the
//! same category replaces the first. Nothing is written to disk and the
//! vault dies with the session that owns it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use taxes_core::document::validate_upload;
use taxes_core::{DocumentCategory, DocumentId, Error, Result, UploadedDocument};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct DocumentVault {
    docs: BTreeMap<DocumentCategory, UploadedDocument>,
    next_id: u64,
}

impl DocumentVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store `bytes` under `category`.
    pub fn upload(
        &mut self,
        category: DocumentCategory,
        display_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<&UploadedDocument> {
        validate_upload(content_type, bytes.len()).inspect_err(|e| {
            warn!(%category, file = display_name, size = bytes.len(), error = %e, "upload rejected");
        })?;

        self.next_id += 1;
        let doc = UploadedDocument {
            id: DocumentId(self.next_id),
            display_name: display_name.to_string(),
            category,
            size: bytes.len(),
            bytes,
            uploaded_at: now,
        };
        info!(%category, id = %doc.id, file = display_name, size = doc.size, "document uploaded");

        if let Some(old) = self.docs.insert(category, doc) {
            info!(%category, replaced = %old.id, "previous upload replaced");
        }
        Ok(&self.docs[&category])
    }

    /// Like [`upload`](Self::upload), guessing the category from the file name.
    pub fn upload_detected(
        &mut self,
        display_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<&UploadedDocument> {
        let category = DocumentCategory::detect(display_name).ok_or_else(|| {
            Error::validation(format!(
                "Cannot tell which document {display_name:?} is; choose aadhar, bank or form16"
            ))
        })?;
        self.upload(category, display_name, content_type, bytes, now)
    }

    pub fn get(&self, category: DocumentCategory) -> Option<&UploadedDocument> {
        self.docs.get(&category)
    }

    /// Raw PDF bytes for the preview pane.
    pub fn preview(&self, id: DocumentId) -> Option<&[u8]> {
        self.docs
            .values()
            .find(|d| d.id == id)
            .map(|d| d.bytes.as_slice())
    }

    /// Uploaded documents in dashboard order.
    pub fn list(&self) -> impl Iterator<Item = &UploadedDocument> {
        self.docs.values()
    }

    /// Categories still waiting for a file.
    pub fn pending(&self) -> Vec<DocumentCategory> {
        DocumentCategory::ALL
            .into_iter()
            .filter(|c| !self.docs.contains_key(c))
            .collect()
    }

    /// Processing can start once anything has been uploaded.
    pub fn is_ready(&self) -> bool {
        !self.docs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }
}
