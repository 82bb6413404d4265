use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn taxes() -> Command {
    let mut cmd = cargo_bin_cmd!("taxes");
    for var in [
        "TAXES_BACKEND_URL",
        "TAXES_ANON_KEY",
        "TAXES_SMS_GATEWAY",
        "TAXES_SMS_KEY",
        "TAXES_SESSION_FILE",
        "TAXES_EMAIL",
        "TAXES_PASSWORD",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_json(args: &[&str]) -> Value {
    let out = taxes()
        .arg("--json")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).expect("valid json output")
}

fn stdout_of(args: &[&str]) -> String {
    let out = taxes().args(args).assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf-8 stdout")
}

fn close(v: &Value, want: f64) -> bool {
    v.as_f64().is_some_and(|x| (x - want).abs() < 1e-9)
}

#[test]
fn gst_exclusive_json() {
    let v = run_json(&["gst", "100", "--rate", "18"]);
    assert!(close(&v["base_amount"], 100.0));
    assert!(close(&v["cgst"], 9.0));
    assert!(close(&v["sgst"], 9.0));
    assert!(close(&v["igst"], 18.0));
    assert!(close(&v["total_gst"], 18.0));
    assert!(close(&v["final_amount"], 118.0));
}

#[test]
fn gst_inclusive_json() {
    let v = run_json(&["gst", "118", "--rate", "18", "--mode", "inclusive"]);
    assert!(close(&v["base_amount"], 100.0));
    assert!(close(&v["total_gst"], 18.0));
    assert!(close(&v["final_amount"], 118.0));
}

#[test]
fn gst_card_shows_half_rates() {
    let out = stdout_of(&["gst", "1000", "--rate", "5"]);
    assert!(out.contains("=== GST Breakdown ==="));
    assert!(out.contains("CGST (2.5%)"));
    assert!(out.contains("IGST (5%)"));
    assert!(out.contains("₹1050.00"));
}

#[test]
fn gst_incomplete_input_shows_nothing() {
    assert_eq!(run_json(&["gst", "abc"]), Value::Null);
    assert_eq!(run_json(&["gst", "100", "--rate", "7"]), Value::Null);
    assert_eq!(stdout_of(&["gst", ""]), "");
}

#[test]
fn rates_listing() {
    let v = run_json(&["rates"]);
    let rates: Vec<u64> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["rate"].as_u64().unwrap())
        .collect();
    assert_eq!(rates, vec![0, 5, 12, 18, 28]);
}

#[test]
fn docs_upload_and_reject() {
    let tmp = TempDir::new().unwrap();
    let form16 = tmp.path().join("form16_2025.pdf");
    let photo = tmp.path().join("aadhar.jpg");
    fs::write(&form16, b"%PDF-1.7\nstub").unwrap();
    fs::write(&photo, [0xff, 0xd8, 0xff, 0xe0]).unwrap();

    let out = taxes()
        .arg("--json")
        .args(["docs", "upload"])
        .arg(&form16)
        .arg(&photo)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).unwrap();

    let uploaded = v["uploaded"].as_array().unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0]["category"], "form16");
    assert_eq!(uploaded[0]["display_name"], "form16_2025.pdf");
    assert_eq!(v["pending"], serde_json::json!(["aadhar", "bank"]));
    assert_eq!(v["ready"], true);
    assert_eq!(v["rejected"][0]["kind"], "validation");
    assert_eq!(v["rejected"][0]["error"], "Please upload only PDF files");
}

#[test]
fn docs_upload_fails_when_nothing_accepted() {
    let tmp = TempDir::new().unwrap();
    let scan = tmp.path().join("scan.pdf");
    fs::write(&scan, b"%PDF-1.4").unwrap();

    // No category in the name and none given.
    taxes().args(["docs", "upload"]).arg(&scan).assert().failure();

    taxes()
        .args(["docs", "upload", "--category", "bank"])
        .arg(&scan)
        .assert()
        .success();
}

#[test]
fn docs_upload_needs_sign_in_against_hosted_backend() {
    let tmp = TempDir::new().unwrap();
    let form16 = tmp.path().join("form16.pdf");
    fs::write(&form16, b"%PDF-1.7").unwrap();

    let out = taxes()
        .args(["--backend-url", "http://127.0.0.1:9", "--anon-key", "anon"])
        .args(["docs", "upload"])
        .arg(&form16)
        .assert()
        .failure()
        .get_output()
        .clone();
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("You must be signed in"), "stderr: {err}");
}

#[test]
fn oversize_file_rejected_from_metadata() {
    let tmp = TempDir::new().unwrap();
    let bank = tmp.path().join("bank_statement.pdf");
    let big = fs::File::create(&bank).unwrap();
    big.set_len(11 * 1024 * 1024).unwrap();
    let form16 = tmp.path().join("form16.pdf");
    fs::write(&form16, b"%PDF-1.7").unwrap();

    let v = {
        let out = taxes()
            .arg("--json")
            .args(["docs", "upload"])
            .arg(&bank)
            .arg(&form16)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice::<Value>(&out).unwrap()
    };
    assert_eq!(v["uploaded"].as_array().unwrap().len(), 1);
    assert_eq!(v["rejected"][0]["file"], "bank_statement.pdf");
    assert_eq!(v["rejected"][0]["error"], "File size should be less than 10MB");
}

#[test]
fn pan_extraction_csv() {
    let tmp = TempDir::new().unwrap();
    let ocr = tmp.path().join("pan.txt");
    fs::write(
        &ocr,
        "INCOME TAX DEPARTMENT\nGOVT. OF INDIA\nPermanent Account Number Card\nABCDE1234F\nName\nRAHUL SHARMA\nFather's Name\nSURESH SHARMA\nDate of Birth\n15/08/1990\n",
    )
    .unwrap();

    let out = taxes()
        .arg("pan")
        .arg(&ocr)
        .arg("--csv")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let csv = String::from_utf8(out).unwrap();
    assert!(csv.starts_with("Field,Value\n"));
    assert!(csv.contains("PAN Number,ABCDE1234F"));
    assert!(csv.contains("Date of Birth,15/08/1990"));
    assert!(csv.contains("Source File,pan.txt"));
}

#[test]
fn otp_run_skips_on_empty_input() {
    let out = taxes()
        .args(["--json", "otp", "run"])
        .write_stdin("12345\n\n")
        .assert()
        .success()
        .get_output()
        .clone();
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["outcome"], "skipped");
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("10-digit"), "stderr: {err}");
}

#[test]
fn google_handoff_in_demo_mode() {
    let v = run_json(&["auth", "google", "--redirect-to", "http://localhost:8080/dashboard"]);
    assert_eq!(v["provider"], "google");
    assert_eq!(
        v["authorize_url"],
        "memory://authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A8080%2Fdashboard"
    );
}

#[test]
fn completing_sign_in_with_unknown_token_fails() {
    taxes()
        .args(["auth", "complete", "--access-token", "not-issued"])
        .assert()
        .failure();
}

#[test]
fn sign_in_requires_valid_email() {
    taxes()
        .args(["auth", "sign-in", "--email", "not-an-email", "--password", "secret1"])
        .assert()
        .failure();
}
