mod backend;
mod cli;
mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use taxes_core::document::{check_size, sniff_content_type};
use taxes_core::gst::calculate_input;
use taxes_core::pan::extract_pan_details;
use taxes_core::{DocumentCategory, ExternalProvider, GstMode, GstRate, SystemClock};
use taxes_store::{DocumentVault, FlowOutcome, OtpFlow, SessionContext, VerificationStep};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::backend::{Backend, forget_session, save_session};
use crate::cli::{AuthCommands, Cli, Commands, Credentials, DocsCommands, OtpCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    info!("taxes v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Gst { amount, rate, mode } => cmd_gst(&amount, &rate, mode.into(), cli.json),
        Commands::Rates => cmd_rates(cli.json),
        Commands::Pan { file, csv } => cmd_pan(&file, csv, cli.json),
        Commands::Docs { command } => match command {
            DocsCommands::Upload {
                files,
                category,
                credentials,
            } => {
                let backend = Backend::connect(&cli.backend)?;
                let ctx = backend
                    .signed_in(&credentials, cli.backend.session_file.as_deref())
                    .await?;
                cmd_docs_upload(&ctx, &files, category, cli.json)
            }
            DocsCommands::List => cmd_docs_list(cli.json),
        },
        Commands::Auth { command } => {
            let backend = Backend::connect(&cli.backend)?;
            cmd_auth(&backend, command, cli.backend.session_file.as_deref(), cli.json).await
        }
        Commands::Otp { command } => {
            let backend = Backend::connect(&cli.backend)?;
            cmd_otp(&backend, command, cli.backend.session_file.as_deref(), cli.json).await
        }
    }
}

// ── GST ──

fn cmd_gst(amount: &str, rate: &str, mode: GstMode, json: bool) -> anyhow::Result<()> {
    let Some(breakdown) = calculate_input(amount, rate, mode) else {
        // Incomplete input shows nothing, like an empty calculator.
        warn!(amount, rate, "nothing to calculate");
        if json {
            println!("null");
        } else {
            eprintln!("Enter an amount and choose a GST rate to see the breakdown.");
        }
        return Ok(());
    };
    let rate: GstRate = rate.parse()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
    } else {
        display::print_breakdown(&breakdown, rate, mode);
    }
    Ok(())
}

fn cmd_rates(json: bool) -> anyhow::Result<()> {
    if json {
        let rates: Vec<_> = GstRate::ALL
            .iter()
            .map(|r| json!({ "rate": r.percent(), "label": r.label() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rates)?);
    } else {
        display::print_rates();
    }
    Ok(())
}

// ── Documents ──

fn cmd_docs_upload(
    ctx: &SessionContext,
    files: &[PathBuf],
    category: Option<DocumentCategory>,
    json: bool,
) -> anyhow::Result<()> {
    let session = ctx.require()?;
    info!(user_id = session.user_id(), files = files.len(), "uploading documents");
    let mut vault = DocumentVault::new();
    let mut failures = Vec::new();

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let meta = std::fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;

        let result = match check_size(meta.len()) {
            Err(e) => Err(e),
            Ok(()) => {
                let bytes =
                    std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
                let content_type = sniff_content_type(&name, &bytes);
                match category {
                    Some(c) => vault.upload(c, &name, content_type, bytes, Utc::now()).map(|_| ()),
                    None => vault
                        .upload_detected(&name, content_type, bytes, Utc::now())
                        .map(|_| ()),
                }
            }
        };
        if let Err(e) = result {
            eprintln!("{name}: {e}");
            failures.push(json!({ "file": name, "error": e.to_string(), "kind": e.kind() }));
        }
    }

    if json {
        let uploaded: Vec<_> = vault.list().collect();
        let out = json!({
            "uploaded": uploaded,
            "pending": vault.pending(),
            "ready": vault.is_ready(),
            "rejected": &failures,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        display::print_vault(&vault);
    }
    if !failures.is_empty() && vault.is_empty() {
        bail!("no documents were accepted");
    }
    Ok(())
}

fn cmd_docs_list(json: bool) -> anyhow::Result<()> {
    if json {
        let cats: Vec<_> = DocumentCategory::ALL
            .iter()
            .map(|c| {
                json!({
                    "category": c,
                    "name": c.display_name(),
                    "description": c.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&cats)?);
    } else {
        println!("=== Document Categories ===");
        for c in DocumentCategory::ALL {
            println!("  {:<26} {}", format!("{} ({c})", c.display_name()), c.description());
        }
    }
    Ok(())
}

// ── PAN ──

fn cmd_pan(file: &Path, csv: bool, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let lines: Vec<&str> = text.lines().collect();
    let details = extract_pan_details(&lines);
    let source = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    info!(file = %source, found = !details.is_empty(), "PAN extraction");

    if csv {
        print!("{}", details.to_csv(&source));
    } else if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        display::print_pan(&details, &source);
    }
    Ok(())
}

// ── Auth ──

async fn cmd_auth(
    backend: &Backend,
    command: AuthCommands,
    session_file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        AuthCommands::SignUp {
            email,
            password,
            name,
        } => {
            let mut ctx = SessionContext::new(backend.auth.clone());
            match ctx.sign_up(&email, &password, &name).await? {
                Some(session) => {
                    if let Some(path) = session_file {
                        save_session(path, session)?;
                    }
                    report_identity(&ctx, json)?;
                }
                None => println!("Check your e-mail to confirm the account, then sign in."),
            }
        }
        AuthCommands::SignIn { email, password } => {
            let mut ctx = SessionContext::new(backend.auth.clone());
            let session = ctx.sign_in(&email, &password).await?;
            if let Some(path) = session_file {
                save_session(path, session)?;
            }
            report_identity(&ctx, json)?;
        }
        AuthCommands::Google { redirect_to } => {
            let ctx = SessionContext::new(backend.auth.clone());
            let handoff = ctx
                .sign_in_with_provider(ExternalProvider::Google, &redirect_to)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&handoff)?);
            } else {
                println!("Open this URL to continue with Google:");
                println!("{}", handoff.authorize_url);
            }
        }
        AuthCommands::Complete {
            access_token,
            refresh_token,
        } => {
            let mut ctx = SessionContext::new(backend.auth.clone());
            let session = ctx.adopt(access_token, refresh_token).await?;
            if let Some(path) = session_file {
                save_session(path, session)?;
            }
            report_identity(&ctx, json)?;
        }
        AuthCommands::Whoami => {
            let ctx = backend.signed_in(&Credentials::default(), session_file).await?;
            report_identity(&ctx, json)?;
        }
        AuthCommands::SignOut => {
            let Some(path) = session_file else {
                bail!("sign-out needs --session-file");
            };
            let restored = backend::load_session(path)?;
            let mut ctx = SessionContext::acquire(backend.auth.clone(), restored).await?;
            forget_session(path)?;
            ctx.sign_out().await?;
            println!("Signed out.");
        }
    }
    Ok(())
}

fn report_identity(ctx: &SessionContext, json: bool) -> anyhow::Result<()> {
    let identity = ctx.identity().context("not signed in")?;
    if json {
        println!("{}", serde_json::to_string_pretty(identity)?);
    } else {
        let name = identity.display_name.as_deref().unwrap_or("-");
        println!("Signed in as {name} <{}>", identity.email);
    }
    Ok(())
}

// ── OTP ──

async fn cmd_otp(
    backend: &Backend,
    command: OtpCommands,
    session_file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let mut flow = OtpFlow::new(
        backend.profiles.clone(),
        backend.delivery.clone(),
        Arc::new(SystemClock),
    );
    match command {
        OtpCommands::Send {
            mobile,
            credentials,
        } => {
            demo_state_warning(backend);
            let ctx = backend.signed_in(&credentials, session_file).await?;
            flow.send(ctx.require()?, &mobile).await?;
            report_step(&flow, json)?;
        }
        OtpCommands::Verify { code, credentials } => {
            demo_state_warning(backend);
            let ctx = backend.signed_in(&credentials, session_file).await?;
            flow.verify(ctx.require()?, &code).await?;
            report_outcome(FlowOutcome::Verified, json)?;
        }
        OtpCommands::Run {
            mobile,
            credentials,
        } => {
            let ctx = backend.signed_in(&credentials, session_file).await?;
            let outcome = run_interactive(&mut flow, &ctx, mobile).await?;
            report_outcome(outcome, json)?;
        }
    }
    Ok(())
}

fn demo_state_warning(backend: &Backend) {
    if backend.demo {
        warn!("demo mode keeps codes in memory only; use `taxes otp run` to send and verify in one go");
    }
}

/// Drive the two-step flow from stdin until verified, skipped or EOF.
async fn run_interactive(
    flow: &mut OtpFlow,
    ctx: &SessionContext,
    mobile: Option<String>,
) -> anyhow::Result<FlowOutcome> {
    let session = ctx.require()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(mobile) = mobile {
        if let Err(e) = flow.send(session, &mobile).await {
            eprintln!("{e}");
        }
    }

    loop {
        match flow.step() {
            VerificationStep::AwaitingMobile => {
                eprintln!("Mobile number (10 digits, empty line to skip):")
            }
            VerificationStep::AwaitingCode { mobile } => eprintln!(
                "Enter the 6-digit code sent to {} (`resend`, `change`, or empty line to skip):",
                mobile.masked()
            ),
        }
        let Some(line) = lines.next_line().await? else {
            return Ok(flow.skip());
        };
        let input = line.trim();
        if input.is_empty() {
            return Ok(flow.skip());
        }

        let awaiting_code = matches!(flow.step(), VerificationStep::AwaitingCode { .. });
        let result = match input {
            "resend" if awaiting_code => flow.resend(session).await,
            "change" if awaiting_code => {
                flow.change_number();
                Ok(())
            }
            code if awaiting_code => flow.verify(session, code).await,
            mobile => flow.send(session, mobile).await,
        };
        match result {
            Ok(()) => {
                if let Some(outcome) = flow.outcome() {
                    return Ok(outcome);
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}

fn report_step(flow: &OtpFlow, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(flow.step())?);
    } else if let VerificationStep::AwaitingCode { mobile } = flow.step() {
        println!("Verification code sent to {}", mobile.masked());
    }
    Ok(())
}

fn report_outcome(outcome: FlowOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", json!({ "outcome": outcome }));
    } else {
        match outcome {
            FlowOutcome::Verified => println!("Mobile number verified."),
            FlowOutcome::Skipped => println!("Mobile verification skipped."),
        }
    }
    Ok(())
}
