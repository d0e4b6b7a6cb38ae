//! # Keygen Subcommand
//!
//! Generates an Ed25519 signing key in Nix's `name:base64` format and
//! writes the secret and public halves next to each other:
//!
//! ```text
//! {output}/{name}.key   secret key, for NITS_CACHE_PRIVATE_KEY_FILE
//! {output}/{name}.pub   public key, for a client's trusted-public-keys
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use nits_crypto::SigningIdentity;

/// Arguments for the `nits keygen` subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Key name, conventionally `{host}-{n}` such as `cache.example.org-1`.
    #[arg(long)]
    pub name: String,

    /// Output directory for the key files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,

    /// Replace existing key files.
    #[arg(long)]
    pub force: bool,
}

/// Execute the keygen subcommand.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let (secret_path, public_path) = write_key_pair(&args.name, &args.output, args.force)?;
    println!("generated signing key {}", args.name);
    println!("  secret key: {}", secret_path.display());
    println!("  public key: {}", public_path.display());
    Ok(0)
}

/// Generate a key named `name` and write it under `output_dir`.
pub fn write_key_pair(name: &str, output_dir: &Path, force: bool) -> Result<(PathBuf, PathBuf)> {
    let identity = SigningIdentity::generate(name).context("generating signing key")?;

    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory: {}", output_dir.display())
    })?;

    let secret_path = output_dir.join(format!("{name}.key"));
    let public_path = output_dir.join(format!("{name}.pub"));
    if !force {
        for path in [&secret_path, &public_path] {
            if path.exists() {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
        }
    }

    write_secret(&secret_path, identity.to_nix_secret_key().as_bytes())
        .with_context(|| format!("failed to write secret key: {}", secret_path.display()))?;
    std::fs::write(&public_path, identity.public().to_nix_public_key())
        .with_context(|| format!("failed to write public key: {}", public_path.display()))?;

    tracing::debug!(name, path = %secret_path.display(), "wrote signing key");
    Ok((secret_path, public_path))
}

#[cfg(unix)]
fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
