//! NoContact CLI
//!
//! A terminal front end for the NoContact core:
//!
//! 1. **Registration**: claim one of the two seats and receive
//!    `private.pgp` / `public.pgp` in an output directory.
//!
//! 2. **Login**: present the key files and passphrase; the identity embedded
//!    in the public key is checked against the stored hashes.
//!
//! 3. **Chat**: send messages encrypted to the other party and read the
//!    conversation back, decrypted with your own key. Without keys, `read`
//!    shows what an onlooker sees.
//!
//! **Privacy**: the database holds salted hashes and ciphertext only. Key
//! files never leave the directory you point the CLI at.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

use nocontact_core::crypto::{generate_key_pair, KeyGenConfig, KeyPair};
use nocontact_core::time::format_millis;
use nocontact_core::{
    extract_identity, CoreConfig, MessageStatus, NoContact, RegistrationState, RenderedMessage,
    Session,
};

const PRIVATE_KEY_FILE: &str = "private.pgp";
const PUBLIC_KEY_FILE: &str = "public.pgp";

/// Log filter used when `RUST_LOG` is unset
fn default_log_filter() -> String {
    format!("{}=info,nocontact_core=info", env!("CARGO_CRATE_NAME"))
}

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nocontact", version, about = "Two-party encrypted chat")]
struct Cli {
    /// SQLite database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "NOCONTACT_DB")]
    database: Option<PathBuf>,

    /// RSA modulus size for generated keys
    #[arg(long, global = true, default_value_t = 4096, env = "NOCONTACT_RSA_BITS")]
    rsa_bits: u32,

    /// Require the private key to unlock and match the public key at login
    #[arg(long, global = true, env = "NOCONTACT_REQUIRE_KEY_POSSESSION")]
    require_key_possession: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how many seats are left
    Status,

    /// Register and write a new key pair
    Register {
        #[command(flatten)]
        user: UserArgs,

        /// Directory to write the key files into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Generate a key pair without registering
    Keygen {
        #[command(flatten)]
        user: UserArgs,

        /// Directory to write the key files into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Register an identity whose keys were made elsewhere
    Enroll {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,
    },

    /// Check key files against the registered identities
    Login {
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Print the identity embedded in a public key
    Whoami {
        /// Public key file
        #[arg(long, default_value = PUBLIC_KEY_FILE)]
        public_key: PathBuf,
    },

    /// Encrypt and send a message
    Send {
        #[command(flatten)]
        keys: KeyArgs,

        /// The other party's public key file
        #[arg(long)]
        to: PathBuf,

        /// Message text
        text: String,
    },

    /// Show the conversation
    Read {
        #[command(flatten)]
        keys: KeyArgs,

        /// Show what someone without keys sees
        #[arg(long)]
        observer: bool,

        /// Print one JSON object per message
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct UserArgs {
    /// Display name
    #[arg(long)]
    name: String,

    /// Email address
    #[arg(long)]
    email: String,

    /// Passphrase protecting the private key
    #[arg(long, env = "NOCONTACT_PASSPHRASE", hide_env_values = true)]
    passphrase: String,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Public key file
    #[arg(long, default_value = PUBLIC_KEY_FILE)]
    public_key: PathBuf,

    /// Private key file
    #[arg(long, default_value = PRIVATE_KEY_FILE)]
    private_key: PathBuf,

    /// Passphrase for the private key
    #[arg(long, env = "NOCONTACT_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let database = database_path(cli.database.as_deref());
    tracing::debug!("Using database {}", database);

    let config = CoreConfig {
        database_path: Some(database),
        key_generation: KeyGenConfig {
            rsa_bits: cli.rsa_bits,
        },
        require_key_possession: cli.require_key_possession,
        ..Default::default()
    };

    let core = NoContact::open(config)
        .await
        .wrap_err("failed to open the NoContact database")?;

    run(&core, cli.command).await
}

async fn run(core: &NoContact, command: Command) -> Result<()> {
    match command {
        Command::Status => match core.registration_state().await? {
            RegistrationState::Open { remaining } => {
                println!("Registration open: {} seat(s) left", remaining)
            }
            RegistrationState::Full => println!("Registration closed: both seats are taken"),
        },

        Command::Register { user, out } => {
            check_key_paths(&out)?;
            println!("Registering {}, generating keys...", user.name);

            // Both files are on disk before the seat is taken
            let (_keys, staged) = core
                .registry()
                .register_staged(&user.name, &user.email, &user.passphrase, |keys| {
                    Ok(StagedKeys::write(&out, keys)?)
                })
                .await?;
            tracing::info!("Registered {}", user.email);

            let written = staged.commit().wrap_err_with(|| {
                format!(
                    "registered, but the key files in {} could not be renamed; \
                     they are kept as {} and {}",
                    out.display(),
                    staging_name(PRIVATE_KEY_FILE),
                    staging_name(PUBLIC_KEY_FILE)
                )
            })?;
            print_written(&written);
            println!("Keep {} safe. It cannot be recovered.", PRIVATE_KEY_FILE);
        }

        Command::Enroll { name, email } => {
            let record = core.registry().enroll(&name, &email).await?;
            println!("Registered as {}", record.id);
        }

        Command::Login { keys } => {
            let session = login(core, &keys).await?;
            println!("Logged in as {}", session.identity());
        }

        Command::Whoami { public_key } => {
            let armored = read_key_file(&public_key)?;
            match extract_identity(&armored) {
                Some(identity) => println!("{}", identity),
                None => bail!("{} does not carry a usable identity", public_key.display()),
            }
        }

        Command::Send { keys, to, text } => {
            let session = login(core, &keys).await?;
            let recipient = read_key_file(&to)?;
            tracing::debug!("Encrypting to {}", to.display());
            let message = core.chat().send(&session, &recipient, &text).await?;
            println!("Sent {}", message.id);
        }

        Command::Read {
            keys,
            observer,
            json,
        } => {
            let rendered = if observer {
                core.chat().observer_view().await?
            } else {
                let session = login(core, &keys).await?;
                core.chat().conversation(&session).await?
            };

            if json {
                for message in &rendered {
                    println!("{}", message.to_json()?);
                }
            } else if rendered.is_empty() {
                println!("No messages yet.");
            } else {
                for message in &rendered {
                    println!("{}", format_message(message));
                }
            }
        }

        Command::Keygen { user, out } => {
            check_key_paths(&out)?;
            let config = &core.registry().config().key_generation;
            println!(
                "Generating {}-bit key pair, this can take a while...",
                config.rsa_bits
            );
            let keys =
                generate_key_pair(&user.name, &user.email, &user.passphrase, config).await?;
            let written = StagedKeys::write(&out, &keys)?.commit()?;
            print_written(&written);
        }
    }

    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn login(core: &NoContact, keys: &KeyArgs) -> Result<Session> {
    let Some(passphrase) = keys.passphrase.as_deref() else {
        bail!("a passphrase is required (--passphrase or NOCONTACT_PASSPHRASE)");
    };

    let public_key = read_key_file(&keys.public_key)?;
    let private_key = read_key_file(&keys.private_key)?;

    Ok(core
        .registry()
        .login(&public_key, &private_key, passphrase)
        .await?)
}

fn database_path(explicit: Option<&Path>) -> String {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nocontact")
            .join("nocontact.db"),
    };

    path.to_string_lossy().into_owned()
}

fn read_key_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

fn staging_name(file: &str) -> String {
    format!(".{}.tmp", file)
}

/// Fail before any key is generated if a key file, or a leftover staged
/// copy of one, is already in the way
fn check_key_paths(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).wrap_err_with(|| format!("failed to create {}", dir.display()))?;

    for file in [PRIVATE_KEY_FILE, PUBLIC_KEY_FILE] {
        for path in [dir.join(file), dir.join(staging_name(file))] {
            // symlink_metadata also catches dangling links and directories
            if path.symlink_metadata().is_ok() {
                bail!("{} already exists, refusing to overwrite it", path.display());
            }
        }
    }
    Ok(())
}

/// Key files written under temporary names
///
/// `commit` renames them into place. Dropping an uncommitted value removes
/// the temporary files.
struct StagedKeys {
    /// (temporary, final) path pairs
    files: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl StagedKeys {
    fn write(dir: &Path, keys: &KeyPair) -> std::io::Result<Self> {
        use std::io::Write;

        let mut staged = Self {
            files: Vec::new(),
            committed: false,
        };

        for (file, contents, private) in [
            (PRIVATE_KEY_FILE, &keys.private_key, true),
            (PUBLIC_KEY_FILE, &keys.public_key, false),
        ] {
            let temp = dir.join(staging_name(file));
            let mut handle = create_new(&temp, private)?;
            staged.files.push((temp, dir.join(file)));

            handle.write_all(contents.as_bytes())?;
            handle.sync_all()?;
        }

        tracing::debug!("Staged key files in {}", dir.display());
        Ok(staged)
    }

    /// Move the files into place, never over an existing file
    ///
    /// On failure the remaining temporary files are kept so the keys are
    /// not lost.
    fn commit(mut self) -> std::io::Result<Vec<PathBuf>> {
        self.committed = true;

        for (temp, dest) in &self.files {
            if dest.symlink_metadata().is_ok() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", dest.display()),
                ));
            }
            std::fs::rename(temp, dest)?;
        }

        Ok(self.files.iter().map(|(_, dest)| dest.clone()).collect())
    }
}

impl Drop for StagedKeys {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (temp, _) in &self.files {
            if let Err(e) = std::fs::remove_file(temp) {
                tracing::warn!("Failed to remove {}: {}", temp.display(), e);
            }
        }
    }
}

#[cfg(unix)]
fn create_new(path: &Path, private: bool) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(if private { 0o600 } else { 0o644 })
        .open(path)
}

#[cfg(not(unix))]
fn create_new(path: &Path, _private: bool) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

fn print_written(paths: &[PathBuf]) {
    let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    println!("Wrote {}", names.join(" and "));
}

fn format_message(message: &RenderedMessage) -> String {
    let marker = match message.status {
        MessageStatus::Decrypted | MessageStatus::Plaintext => "",
        MessageStatus::Scrambled => " [scrambled]",
        MessageStatus::Failed => " [unreadable]",
    };
    let author = if message.is_own {
        "you"
    } else {
        message.user.name.as_str()
    };

    format!(
        "[{}] {}{}: {}",
        format_millis(message.sent_at),
        author,
        marker,
        message.body
    )
}
