//! Dashboard documents: the three categories a filer uploads and the rules
//! a file must pass before it is accepted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    Aadhar,
    Bank,
    Form16,
}

impl DocumentCategory {
    /// Display order on the dashboard.
    pub const ALL: [DocumentCategory; 3] = [Self::Aadhar, Self::Bank, Self::Form16];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aadhar => "aadhar",
            Self::Bank => "bank",
            Self::Form16 => "form16",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Aadhar => "Aadhar Card",
            Self::Bank => "Bank Statements / Passbook",
            Self::Form16 => "Form-16",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Aadhar => "Upload your Aadhar Card PDF",
            Self::Bank => "Upload bank statements or passbook PDF",
            Self::Form16 => "Upload your Form-16 PDF",
        }
    }

    /// Guess the category from a file name, e.g. `form_16_2025.pdf`.
    pub fn detect(file_name: &str) -> Option<Self> {
        let name = file_name.to_ascii_lowercase();
        if name.contains("aadhar") || name.contains("aadhaar") {
            Some(Self::Aadhar)
        } else if ["form16", "form_16", "form-16"]
            .iter()
            .any(|k| name.contains(k))
        {
            Some(Self::Form16)
        } else if ["bank", "statement", "passbook"]
            .iter()
            .any(|k| name.contains(k))
        {
            Some(Self::Bank)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aadhar" | "aadhaar" => Ok(Self::Aadhar),
            "bank" => Ok(Self::Bank),
            "form16" | "form-16" => Ok(Self::Form16),
            other => Err(Error::validation(format!(
                "unknown document category: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A PDF held in memory for the lifetime of the session.
#[derive(Clone, Serialize)]
pub struct UploadedDocument {
    pub id: DocumentId,
    pub display_name: String,
    pub category: DocumentCategory,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("size", &self.size)
            .field("uploaded_at", &self.uploaded_at)
            .finish()
    }
}

/// Reject anything that is not a PDF or is larger than 10 MiB.
pub fn validate_upload(content_type: &str, size: usize) -> Result<()> {
    if !content_type.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
        return Err(Error::validation("Please upload only PDF files"));
    }
    check_size(size as u64)
}

/// Size half of [`validate_upload`], usable on file metadata before reading.
pub fn check_size(size: u64) -> Result<()> {
    if size > MAX_UPLOAD_BYTES as u64 {
        return Err(Error::validation("File size should be less than 10MB"));
    }
    Ok(())
}

/// Content type for a local file, judged from its extension and leading bytes.
pub fn sniff_content_type(file_name: &str, head: &[u8]) -> &'static str {
    if head.starts_with(b"%PDF-") || file_name.to_ascii_lowercase().ends_with(".pdf") {
        PDF_CONTENT_TYPE
    } else {
        "application/octet-stream"
    }
}
