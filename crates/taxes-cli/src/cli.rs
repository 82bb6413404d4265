use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use taxes_core::{DocumentCategory, GstMode};

#[derive(Parser, Debug)]
#[command(name = "taxes", version, about = "TaxES: GST calculator, mobile verification and ITR documents")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[command(flatten)]
    pub backend: BackendArgs,
    #[command(subcommand)]
    pub command: Commands,
}

/// Where accounts and profiles live. Without a URL everything runs in memory.
#[derive(Args, Debug, Clone, Default)]
pub struct BackendArgs {
    #[arg(long, global = true, env = "TAXES_BACKEND_URL", help = "Backend project URL")]
    pub backend_url: Option<String>,
    #[arg(long, global = true, env = "TAXES_ANON_KEY", hide_env_values = true)]
    pub anon_key: Option<String>,
    #[arg(long, global = true, env = "TAXES_SMS_GATEWAY", help = "SMS gateway endpoint for OTP delivery")]
    pub sms_gateway: Option<String>,
    #[arg(long, global = true, env = "TAXES_SMS_KEY", hide_env_values = true)]
    pub sms_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "TAXES_SESSION_FILE",
        help = "Keep the signed-in session in this file between runs"
    )]
    pub session_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split an amount into base, CGST/SGST, IGST and total.
    Gst {
        amount: String,
        #[arg(long, default_value = "18")]
        rate: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Exclusive)]
        mode: ModeArg,
    },
    /// List the GST slabs.
    Rates,
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },
    Docs {
        #[command(subcommand)]
        command: DocsCommands,
    },
    /// Pull PAN fields out of OCR text.
    Pan {
        file: PathBuf,
        #[arg(long, help = "Print as Field,Value CSV")]
        csv: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct Credentials {
    #[arg(long, env = "TAXES_EMAIL")]
    pub email: Option<String>,
    #[arg(long, env = "TAXES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TAXES_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: String,
    },
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TAXES_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the URL that starts Google sign-in.
    Google {
        #[arg(long, default_value = "http://localhost:8080/dashboard")]
        redirect_to: String,
    },
    /// Finish an external sign-in with the tokens from the redirect.
    Complete {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: Option<String>,
    },
    Whoami,
    SignOut,
}

#[derive(Subcommand, Debug)]
pub enum OtpCommands {
    /// Send a code to a mobile number.
    Send {
        mobile: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Check a code received by SMS.
    Verify {
        code: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Interactive flow on stdin: number, then code. `resend` and `change`
    /// are accepted while waiting for a code; an empty line skips.
    Run {
        #[arg(long)]
        mobile: Option<String>,
        #[command(flatten)]
        credentials: Credentials,
    },
}

#[derive(Subcommand, Debug)]
pub enum DocsCommands {
    /// Upload PDFs and show the dashboard. Requires a signed-in account.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, help = "Category for every file; guessed from the name when omitted")]
        category: Option<DocumentCategory>,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Show the document categories.
    List,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Inclusive,
    Exclusive,
}

impl From<ModeArg> for GstMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Inclusive => GstMode::Inclusive,
            ModeArg::Exclusive => GstMode::Exclusive,
        }
    }
}
