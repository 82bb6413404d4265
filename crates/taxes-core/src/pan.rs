//! PAN card field extraction from OCR text lines.
//!
//! Input is the line-level output of a text detector, top to bottom. The card
//! layout puts each label on its own line with the value on the next, so
//! extraction is positional rather than model-based.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{5}[0-9]{4}[A-Z]\b").expect("PAN pattern"));

static DOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{2})[/-]?(\d{2})[/-]?(\d{4})\b").expect("date pattern")
});

/// How many lines below the "Date of Birth" label to search for the date.
const DOB_LOOKAHEAD: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanDetails {
    pub pan_number: Option<String>,
    pub name: Option<String>,
    pub father_name: Option<String>,
    /// Normalised to `DD/MM/YYYY`.
    pub date_of_birth: Option<String>,
}

impl PanDetails {
    pub fn is_empty(&self) -> bool {
        self.pan_number.is_none()
            && self.name.is_none()
            && self.father_name.is_none()
            && self.date_of_birth.is_none()
    }

    /// Two-column `Field,Value` report, one row per field plus the source file.
    pub fn to_csv(&self, source_file: &str) -> String {
        let rows = [
            ("PAN Number", self.pan_number.as_deref()),
            ("Name", self.name.as_deref()),
            ("Father Name", self.father_name.as_deref()),
            ("Date of Birth", self.date_of_birth.as_deref()),
            ("Source File", Some(source_file)),
        ];
        let mut out = String::from("Field,Value\n");
        for (field, value) in rows {
            out.push_str(field);
            out.push(',');
            out.push_str(&csv_cell(value.unwrap_or_default()));
            out.push('\n');
        }
        out
    }
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Pull PAN number, holder name, father's name and date of birth out of OCR lines.
pub fn extract_pan_details<S: AsRef<str>>(lines: &[S]) -> PanDetails {
    let lines: Vec<&str> = lines.iter().map(|l| l.as_ref()).collect();

    let pan_number = lines
        .iter()
        .find_map(|line| PAN_RE.find(line).map(|m| m.as_str().to_string()));

    PanDetails {
        pan_number,
        name: value_after_label(&lines, "Name"),
        father_name: value_after_label(&lines, "Father"),
        date_of_birth: date_of_birth(&lines),
    }
}

/// Trimmed line following the first line containing `label`.
fn value_after_label(lines: &[&str], label: &str) -> Option<String> {
    let idx = lines.iter().position(|l| l.contains(label))?;
    let value = lines.get(idx + 1)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn date_of_birth(lines: &[&str]) -> Option<String> {
    let idx = lines.iter().position(|l| l.contains("Date of Birth"))?;
    lines
        .iter()
        .skip(idx + 1)
        .take(DOB_LOOKAHEAD)
        .find_map(|candidate| {
            DOB_RE
                .captures(candidate)
                .map(|c| format!("{}/{}/{}", &c[1], &c[2], &c[3]))
        })
}
