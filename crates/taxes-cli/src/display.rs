//! Vertical card display for calculator results, dashboard documents and
//! extracted PAN fields.

use taxes_core::document::MAX_UPLOAD_BYTES;
use taxes_core::{DocumentCategory, GstMode, GstRate, PanDetails, TaxBreakdown};
use taxes_store::DocumentVault;

const LABEL_WIDTH: usize = 26;

// ── GST ──

pub fn print_rates() {
    println!("=== GST Rates ===");
    for rate in GstRate::ALL {
        println!("  {:<LABEL_WIDTH$} {}", format!("{}%", rate.percent()), rate.label());
    }
}

pub fn print_breakdown(b: &TaxBreakdown, rate: GstRate, mode: GstMode) {
    let mode = match mode {
        GstMode::Inclusive => "amount including GST",
        GstMode::Exclusive => "amount excluding GST",
    };
    println!("=== GST Breakdown ===");
    println!("{rate}, {mode}");
    println!();

    row("Base Amount", &rupees(b.base_amount));
    row("Final Amount", &rupees(b.final_amount));
    println!();

    println!("Tax Breakdown");
    row(&format!("CGST ({}%)", rate.half_percent()), &rupees(b.cgst));
    row(&format!("SGST ({}%)", rate.half_percent()), &rupees(b.sgst));
    row(&format!("IGST ({}%)", rate.percent()), &rupees(b.igst));
    row("Total GST", &rupees(b.total_gst));
    println!();
    println!("Note: CGST and SGST apply for intra-state transactions.");
    println!("      IGST applies for inter-state transactions.");
}

// ── Documents ──

pub fn print_vault(vault: &DocumentVault) {
    println!("=== Documents ===");
    for category in DocumentCategory::ALL {
        match vault.get(category) {
            Some(doc) => {
                row(category.display_name(), "Uploaded");
                println!(
                    "  {:<LABEL_WIDTH$} {} ({}, uploaded on {})",
                    "",
                    doc.display_name,
                    human_size(doc.size),
                    doc.uploaded_at.format("%d/%m/%Y")
                );
            }
            None => row(category.display_name(), "Pending"),
        }
    }
    println!();
    if vault.is_ready() {
        println!("Ready to Process: documents uploaded, ready for ITR processing.");
    } else {
        println!(
            "Upload PDF documents to get started (max {}).",
            human_size(MAX_UPLOAD_BYTES)
        );
    }
}

// ── PAN ──

pub fn print_pan(details: &PanDetails, source: &str) {
    println!("=== PAN Card: {source} ===");
    if details.is_empty() {
        println!("  (no PAN fields recognised)");
        return;
    }
    row("PAN Number", details.pan_number.as_deref().unwrap_or("-"));
    row("Name", details.name.as_deref().unwrap_or("-"));
    row("Father Name", details.father_name.as_deref().unwrap_or("-"));
    row("Date of Birth", details.date_of_birth.as_deref().unwrap_or("-"));
}

// ── Helpers ──

fn row(label: &str, value: &str) {
    println!("  {:<LABEL_WIDTH$} {}", label, value);
}

fn rupees(v: f64) -> String {
    format!("₹{v:.2}")
}

fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
