//! FaceLock Vault - CLI
//!
//! Command-line interface for vault operations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use facelock_vault::{
    AppConfig, ErrorResponse, MasterKey, NativePicker, PayloadFile, PickResult, VaultApi,
    VaultStatus, VerifierKind,
};

#[derive(Parser)]
#[command(name = "facelock")]
#[command(version = facelock_vault::VERSION)]
#[command(about = "FaceLock Vault - face-gated encrypted folder that destroys itself after repeated mismatches")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured biometric comparator
    #[arg(long, value_enum)]
    verifier: Option<VerifierArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum VerifierArg {
    Mock,
    Perceptual,
}

impl From<VerifierArg> for VerifierKind {
    fn from(arg: VerifierArg) -> Self {
        match arg {
            VerifierArg::Mock => VerifierKind::Mock,
            VerifierArg::Perceptual => VerifierKind::Perceptual,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a vault in TARGET/SecureVault
    Create {
        /// Existing target directory
        #[arg(short, long)]
        target: PathBuf,

        /// Reference face image
        #[arg(short, long)]
        face: PathBuf,

        /// Secret text stored as message.txt
        #[arg(long)]
        text: Option<String>,

        /// Files to seal
        files: Vec<PathBuf>,
    },

    /// Unlock a vault with a probe face image
    Unlock {
        /// Vault directory or the directory containing it
        #[arg(short, long)]
        source: PathBuf,

        /// Probe face image
        #[arg(short, long)]
        face: PathBuf,

        /// Write decrypted files here instead of printing the response
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the failure counter of a vault
    Status {
        /// Vault directory or the directory containing it
        path: PathBuf,
    },

    /// Pick a target directory with the native dialog
    Browse,

    /// Initialise the master key if it does not exist yet
    Keygen,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref()).context("loading configuration")?;
    if let Some(verifier) = cli.verifier {
        config.verifier = verifier.into();
    }

    match cli.command {
        Commands::Create {
            target,
            face,
            text,
            files,
        } => {
            let api = VaultApi::from_config(config)?;
            let reference = read(&face)?;

            let mut payload = Vec::with_capacity(files.len());
            for path in &files {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("{} has no usable file name", path.display()))?;
                payload.push(PayloadFile::new(name, read(path)?));
            }

            let created = api.create_vault(&target, &reference, text.as_deref(), payload)?;
            println!(
                "Vault created at {} ({} entries)",
                created.vault_path.display(),
                created.entries
            );
        }

        Commands::Unlock { source, face, output } => {
            let api = VaultApi::from_config(config)?;
            let probe = read(&face)?;

            match output {
                Some(output) => {
                    let entries = api.manager().unlock(&source, &probe).map_err(report)?;
                    fs::create_dir_all(&output)
                        .with_context(|| format!("creating {}", output.display()))?;

                    for entry in &entries {
                        let Some(name) = Path::new(&entry.filename).file_name() else {
                            log::warn!("Skipping entry without a file name: {:?}", entry.filename);
                            continue;
                        };
                        let dest = output.join(name);
                        fs::write(&dest, entry.content.as_slice())
                            .with_context(|| format!("writing {}", dest.display()))?;
                        println!("{} ({})", dest.display(), entry.kind.mime_type);
                    }
                }
                None => {
                    let response = api.unlock_vault(&source, &probe).map_err(report)?;
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
            }
        }

        Commands::Status { path } => {
            let api = VaultApi::from_config(config)?;
            match api.status(&path)? {
                VaultStatus::Locked {
                    failure_count,
                    attempts_remaining,
                    entries,
                } => println!(
                    "Locked: {} entries, {} failed attempt(s), {} remaining",
                    entries, failure_count, attempts_remaining
                ),
                VaultStatus::Absent => println!("No vault at {}", path.display()),
            }
        }

        Commands::Browse => {
            let api = VaultApi::from_config(config)?;
            match api.browse(&NativePicker) {
                PickResult::Selected(path) => println!("{}", path.display()),
                PickResult::Cancelled => bail!("folder selection cancelled"),
                PickResult::Unavailable => bail!("no native folder dialog on this platform"),
            }
        }

        Commands::Keygen => {
            config.validate()?;
            MasterKey::load_or_generate(&config.master_key_path)?;
            println!("Master key ready at {}", config.master_key_path.display());
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

/// Print the transport-shaped error body before bailing out
fn report(err: facelock_vault::VaultError) -> anyhow::Error {
    if let Ok(body) = serde_json::to_string_pretty(&ErrorResponse::from(&err)) {
        println!("{}", body);
    }
    err.into()
}
