//! ACME account tool - Main entry point
//!
//! Offline helpers around ACME account provisioning: configuration checks,
//! key generation and inspection of a stored account.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};

use acme_account::{load_stored_account, AccountSigner, FileAccountStore, UriSource};
use acme_account_config::AccountConfig;

/// ACME account provisioning tool
#[derive(Parser, Debug)]
#[command(name = "acme-account")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(
        short = 'c',
        long = "config",
        env = "ACME_ACCOUNT_CONFIG",
        default_value = "/etc/acme-account/account.kdl",
        global = true
    )]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file and exit
    Check,
    /// Generate an account key as configured and print it as PEM
    Keygen {
        /// Write the key to this file instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Show the account stored in the configured storage directory
    Inspect,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check => check_config(&cli.config, &config),
        Commands::Keygen { output } => keygen(&config, output.as_deref()),
        Commands::Inspect => inspect(&config),
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load the configuration file and apply environment overrides
fn load_config(path: &Path) -> Result<AccountConfig> {
    debug!(path = %path.display(), "Loading configuration");

    let config = AccountConfig::from_file(path).and_then(AccountConfig::apply_env);
    match config {
        Ok(config) => Ok(config),
        Err(e) => {
            // Render KDL syntax errors with source spans
            eprintln!("{:?}", miette::Report::new(e));
            bail!("Failed to load configuration from {}", path.display())
        }
    }
}

/// Validate configuration, logging warnings and failing on errors
fn check_config(path: &Path, config: &AccountConfig) -> Result<()> {
    let result = config.validate();

    for warning in &result.warnings {
        warn!("{}", warning);
    }
    for error in &result.errors {
        tracing::error!("{}", error);
    }

    if !result.is_ok() {
        bail!(
            "Configuration validation failed with {} error(s)",
            result.errors.len()
        );
    }

    info!(
        directory = %config.directory_url,
        email = %config.email,
        key_type = %config.key,
        storage = %config.storage.display(),
        "Configuration test successful"
    );
    println!(
        "acme-account: configuration file {} test is successful",
        path.display()
    );
    Ok(())
}

/// Generate a key without touching the account store
fn keygen(config: &AccountConfig, output: Option<&Path>) -> Result<()> {
    let key = acme_account::generate(&config.key).context("Failed to generate account key")?;

    match output {
        Some(path) => {
            write_key_file(path, &key.pem)?;
            info!(
                path = %path.display(),
                key_type = %config.key,
                "Wrote account key"
            );
        }
        None => print!("{}", key.pem),
    }
    Ok(())
}

/// Write a PEM key to a new file, readable by the owner only
fn write_key_file(path: &Path, pem: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create key file {}", path.display()))?;
    file.write_all(pem.as_bytes())
        .with_context(|| format!("Failed to write key file {}", path.display()))?;
    file.sync_all()?;
    Ok(())
}

/// Decode and describe the stored account, without network access
fn inspect(config: &AccountConfig) -> Result<()> {
    let Some(summary) = describe_stored_account(config)? else {
        println!("No ACME account stored in {}", config.storage.display());
        return Ok(());
    };

    print!("{}", summary);
    Ok(())
}

fn describe_stored_account(config: &AccountConfig) -> Result<Option<String>> {
    if !config.storage.exists() {
        return Ok(None);
    }

    let store = FileAccountStore::open(&config.storage)
        .with_context(|| format!("Failed to open storage {}", config.storage.display()))?;
    let data = store.load().context("Failed to read stored account")?;
    if data.is_empty() {
        return Ok(None);
    }

    let account = load_stored_account(&data, &config.directory_url)
        .context("Stored account is unusable")?;
    let signer = account.session.signer();

    let source = match account.uri_source {
        UriSource::RegistrationUrl => "registration URL",
        UriSource::LegacyRegistration => "legacy registration document",
    };

    let mut summary = String::new();
    summary.push_str(&format!("key type:      {}\n", signer.key_type()));
    summary.push_str(&format!("jws algorithm: {}\n", jws_algorithm(signer)));
    summary.push_str(&format!("account uri:   {}\n", account.uri));
    summary.push_str(&format!("uri source:    {}\n", source));
    Ok(Some(summary))
}

fn jws_algorithm(signer: &AccountSigner) -> &'static str {
    signer.jws_algorithm().unwrap_or("none (key cannot sign ACME requests)")
}
