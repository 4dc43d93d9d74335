use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use siwa_client_secret::config::{self, Config, Overrides, Settings};
use siwa_client_secret::inspect::{self, Inspection};
use siwa_client_secret::{secret, Clock, FixedClock, SystemClock};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "siwa-client-secret",
    version,
    about = "Generate Sign in with Apple client secrets",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: Format,

    /// Config file (default: ./siwa-secret.toml or ~/.config/siwa-secret/config.toml).
    #[arg(long, global = true, env = "SIWA_SECRET_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    generate: GenerateArgs,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Clone, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Args, Clone, Default)]
struct GenerateArgs {
    /// Apple developer team ID (the `iss` claim).
    #[arg(long, env = "APPLE_TEAM_ID")]
    team_id: Option<String>,

    /// Services ID or bundle ID (the `sub` claim).
    #[arg(long, env = "APPLE_CLIENT_ID")]
    client_id: Option<String>,

    /// ID of the signing key (the `kid` header).
    #[arg(long, env = "APPLE_KEY_ID")]
    key_id: Option<String>,

    /// Path to the .p8 private key (default: AuthKey_<KEY_ID>.p8).
    #[arg(long, env = "APPLE_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Token lifetime in seconds (default 15552000, max 15777000).
    #[arg(long)]
    lifetime_secs: Option<u64>,

    /// Issue at this Unix time instead of now.
    #[arg(long)]
    issued_at: Option<i64>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Sign a client secret and print it (the default).
    Generate(GenerateArgs),

    /// Write a template config file.
    Init {
        /// Write ~/.config/siwa-secret/config.toml instead of ./siwa-secret.toml.
        #[arg(long)]
        global: bool,
    },

    /// Decode a client secret and show its claims.
    Inspect {
        /// Token to inspect (read from stdin when omitted).
        token: Option<String>,
        /// Verify the signature with this PEM public key.
        #[arg(long)]
        public_key: Option<PathBuf>,
    },
}

// ─── Entry ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siwa_client_secret=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd.unwrap_or(Cmd::Generate(cli.generate)) {
        Cmd::Generate(args) => cmd_generate(&args, cli.config.as_deref(), &cli.format),
        Cmd::Init { global } => cmd_init(global),
        Cmd::Inspect { token, public_key } => {
            cmd_inspect(token, public_key.as_deref(), &cli.format)
        }
    }
}

// ─── generate ────────────────────────────────────────────────────────────────

fn cmd_generate(args: &GenerateArgs, explicit_config: Option<&Path>, fmt: &Format) -> Result<()> {
    let config_path = config::resolve_config_path(explicit_config);
    let cfg = config_path.as_deref().map(Config::load).transpose()?;

    let overrides = Overrides {
        team_id: args.team_id.clone(),
        client_id: args.client_id.clone(),
        key_id: args.key_id.clone(),
        key_file: args.key_file.clone(),
        lifetime_secs: args.lifetime_secs,
    };
    let settings = Settings::resolve(cfg.as_ref(), config_path.as_deref(), &overrides)?;
    settings.params.validate().context("invalid settings")?;

    let key = settings.key.load().context("failed to load private key")?;
    let clock = make_clock(args.issued_at)?;
    let secret = secret::issue(&key, &settings.params, clock.as_ref())
        .context("failed to sign client secret")?;

    info!(
        kid = %secret.key_id,
        iss = %secret.claims.iss,
        sub = %secret.claims.sub,
        exp = secret.claims.exp,
        "generated client secret"
    );

    match fmt {
        Format::Json => {
            let expires_at = chrono::DateTime::from_timestamp(secret.claims.exp, 0)
                .map(|d| d.to_rfc3339());
            let out = serde_json::json!({
                "token": secret.token,
                "kid": secret.key_id,
                "iss": secret.claims.iss,
                "sub": secret.claims.sub,
                "aud": secret.claims.aud,
                "iat": secret.claims.iat,
                "exp": secret.claims.exp,
                "expires_at": expires_at,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => println!("{}", secret.token),
    }
    Ok(())
}

// ─── init ────────────────────────────────────────────────────────────────────

fn cmd_init(global: bool) -> Result<()> {
    let cfg_path = config::init_config_path(global)?;
    if let Some(dir) = cfg_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create {}", dir.display()))?;
    }

    if cfg_path.exists() {
        eprintln!("Config already exists: {}", cfg_path.display());
        return Ok(());
    }
    std::fs::write(&cfg_path, config::CONFIG_TEMPLATE)
        .with_context(|| format!("could not write {}", cfg_path.display()))?;

    eprintln!("Created {}", cfg_path.display());
    eprintln!();
    eprintln!("Next steps:");
    eprintln!("  1. Fill in team_id, client_id and key_id");
    eprintln!("  2. Put AuthKey_<key_id>.p8 next to the config (or set private_key)");
    eprintln!("  3. Run `siwa-client-secret` to print a client secret");
    Ok(())
}

// ─── inspect ─────────────────────────────────────────────────────────────────

fn cmd_inspect(token: Option<String>, public_key: Option<&Path>, fmt: &Format) -> Result<()> {
    let token = match token {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("could not read token from stdin")?;
            buf
        }
    };

    let public_key = public_key
        .map(|p| {
            std::fs::read_to_string(p)
                .with_context(|| format!("could not read public key {}", p.display()))
        })
        .transpose()?;

    let report = inspect::inspect(&token, &SystemClock, public_key.as_deref())?;

    match fmt {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print_inspection(&report),
    }
    Ok(())
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("-")
}

fn print_inspection(r: &Inspection) {
    println!("Key ID:     {}", str_field(&r.header, "kid"));
    println!("Algorithm:  {}", str_field(&r.header, "alg"));
    println!("Issuer:     {}", str_field(&r.claims, "iss"));
    println!("Subject:    {}", str_field(&r.claims, "sub"));
    println!("Audience:   {}", str_field(&r.claims, "aud"));
    if let Some(t) = r.issued_at {
        println!("Issued:     {}", t.to_rfc3339());
    }
    match r.expires_at {
        Some(t) if r.expired => println!("Expires:    {} (EXPIRED)", t.to_rfc3339()),
        Some(t) => println!("Expires:    {}", t.to_rfc3339()),
        None => println!("Expires:    -"),
    }
    if let Some(secs) = r.lifetime_secs {
        println!("Lifetime:   {secs}s ({:.1} days)", secs as f64 / 86_400.0);
    }
    if r.signature_verified {
        println!("Signature:  valid");
    } else {
        println!("Signature:  not checked");
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn make_clock(issued_at: Option<i64>) -> Result<Box<dyn Clock>> {
    match issued_at {
        Some(secs) => {
            let clock = FixedClock::from_unix(secs)
                .with_context(|| format!("--issued-at {secs} is out of range"))?;
            Ok(Box::new(clock))
        }
        None => Ok(Box::new(SystemClock)),
    }
}
