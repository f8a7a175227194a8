//! License issuance tool.
//!
//! Runs in the vendor's issuance environment. The private key stays there;
//! only the public key is handed to product builds via `DDUI_LICENSE_PUBKEYS`.
//!
//! ```bash
//! ddui-license generate-keypair --output keys/
//! ddui-license sign --key-file keys/private.key --customer "ACME Corp" \
//!     --email ops@acme.example --tier business --days 365 \
//!     --feature scim --limit max_users=250 --output acme.license
//! ddui-license inspect --key-file keys/private.key --license acme.license
//! DDUI_LICENSE_PUBKEYS=$(ddui-license print-public-key --key-file keys/private.key) cargo build --release
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ddui_licensing::license::verifier::decode_public_key;
use ddui_licensing::license::{Feature, LicenseClaims, LicenseType, Limits, Signer, Tier, Verifier};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ddui-license")]
#[command(author, version)]
#[command(about = "Issue and inspect signed DDUI license keys")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new Ed25519 keypair
    GenerateKeypair {
        /// Output directory for keypair files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Sign a license and print or write the distributable key
    Sign {
        /// Path to the private key file
        #[arg(short, long)]
        key_file: PathBuf,

        /// Customer name
        #[arg(long)]
        customer: String,

        /// Customer contact email
        #[arg(long)]
        email: String,

        /// Customer ID (generated if not provided)
        #[arg(long)]
        customer_id: Option<String>,

        /// License ID (generated if not provided)
        #[arg(long)]
        license_id: Option<String>,

        /// Tier: free, pro, business, enterprise
        #[arg(long)]
        tier: Tier,

        /// License type: trial, subscription, perpetual, enterprise_custom
        #[arg(long = "type", default_value = "subscription")]
        license_type: LicenseType,

        /// Explicitly granted feature (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Usage ceiling as name=value, 0 for unlimited (repeatable)
        #[arg(long = "limit")]
        limits: Vec<String>,

        /// Opaque metadata as key=value (repeatable)
        #[arg(long = "meta")]
        metadata: Vec<String>,

        /// Start of the validity window (RFC 3339, default: now)
        #[arg(long)]
        issued_at: Option<String>,

        /// End of the validity window (RFC 3339)
        #[arg(long, conflicts_with = "days", required_unless_present = "days")]
        expires: Option<String>,

        /// Validity in days from the start of the window
        #[arg(long)]
        days: Option<i64>,

        /// Write the key to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a license key and print its identifiers and window
    Inspect {
        /// Private key file to derive the public key from
        #[arg(short, long, conflicts_with = "public_key", required_unless_present = "public_key")]
        key_file: Option<PathBuf>,

        /// Base64 public key
        #[arg(long)]
        public_key: Option<String>,

        /// File containing the license key
        #[arg(short, long)]
        license: PathBuf,
    },

    /// Print the base64 public key for DDUI_LICENSE_PUBKEYS
    PrintPublicKey {
        /// Path to the private key file
        #[arg(short, long)]
        key_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::GenerateKeypair { output } => generate_keypair(&output),
        Command::Sign {
            key_file,
            customer,
            email,
            customer_id,
            license_id,
            tier,
            license_type,
            features,
            limits,
            metadata,
            issued_at,
            expires,
            days,
            output,
        } => {
            let issued_at = match issued_at {
                Some(raw) => parse_time(&raw, "--issued-at")?,
                None => OffsetDateTime::now_utc(),
            };
            let expires_at = match (expires, days) {
                (Some(raw), _) => parse_time(&raw, "--expires")?,
                (None, Some(days)) => issued_at + Duration::days(days),
                (None, None) => bail!("one of --expires or --days is required"),
            };
            let claims = LicenseClaims {
                id: license_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                customer_id: customer_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                customer_name: customer,
                email,
                license_type,
                tier,
                issued_at,
                expires_at,
                features: features.into_iter().map(Feature::new).collect::<BTreeSet<_>>(),
                limits: parse_limits(&limits)?,
                metadata: parse_pairs(&metadata, "--meta")?,
            };
            sign_license(&key_file, &claims, output.as_deref())
        }
        Command::Inspect { key_file, public_key, license } => {
            let verifier = match (key_file, public_key) {
                (Some(path), _) => Verifier::new(load_signer(&path)?.verifying_key()),
                (None, Some(encoded)) => Verifier::new(decode_public_key(&encoded)?),
                (None, None) => bail!("one of --key-file or --public-key is required"),
            };
            inspect_license(&verifier, &license)
        }
        Command::PrintPublicKey { key_file } => {
            println!("{}", load_signer(&key_file)?.public_key_base64());
            Ok(())
        }
    }
}

fn generate_keypair(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).context("Failed to create output directory")?;

    let signer = Signer::generate();
    let private_key_path = output_dir.join("private.key");
    fs::write(&private_key_path, signer.secret_key_base64()).context("Failed to write private key")?;
    let public_key_path = output_dir.join("public.key");
    fs::write(&public_key_path, signer.public_key_base64()).context("Failed to write public key")?;

    println!("Generated keypair:");
    println!("  Private key: {}", private_key_path.display());
    println!("  Public key:  {}", public_key_path.display());
    println!();
    println!("Keep the private key in the issuance environment. Never commit it or ship it.");
    println!("Build the product with DDUI_LICENSE_PUBKEYS set to the public key.");
    Ok(())
}

fn sign_license(key_file: &Path, claims: &LicenseClaims, output: Option<&Path>) -> Result<()> {
    let signer = load_signer(key_file)?;
    let key = signer.sign(claims).context("Failed to sign license")?;

    match output {
        Some(path) => {
            fs::write(path, format!("{key}\n")).context("Failed to write license key")?;
            eprintln!("License {} ({}) written to {}", claims.id, claims.tier, path.display());
        }
        None => println!("{key}"),
    }
    Ok(())
}

fn inspect_license(verifier: &Verifier, license_file: &Path) -> Result<()> {
    let key = fs::read_to_string(license_file).context("Failed to read license key file")?;
    let license = verifier
        .verify(&key, OffsetDateTime::now_utc())
        .map_err(|err| anyhow!("license rejected ({}): {err}", err.kind()))?;

    println!("License is VALID");
    println!();
    println!("  License ID: {}", license.id());
    println!("  Type:       {}", license.license_type());
    println!("  Tier:       {}", license.tier());
    println!("  Issued:     {}", license.issued_at().format(&Rfc3339)?);
    println!("  Expires:    {}", license.expires_at().format(&Rfc3339)?);
    let features: Vec<&str> = license.explicit_features().iter().map(Feature::as_str).collect();
    println!("  Granted:    {}", if features.is_empty() { "-".to_string() } else { features.join(", ") });
    for (name, max) in license.limits().iter() {
        let max = if max == Limits::UNLIMITED { "unlimited".to_string() } else { max.to_string() };
        println!("  Limit:      {name} = {max}");
    }
    Ok(())
}

fn load_signer(key_file: &Path) -> Result<Signer> {
    let encoded = fs::read_to_string(key_file).context("Failed to read private key file")?;
    Signer::from_base64(&encoded).context("Failed to decode private key")
}

fn parse_time(raw: &str, flag: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("{flag} must be RFC 3339, got '{raw}'"))
}

fn parse_pairs(raw: &[String], flag: &str) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|pair| {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("{flag} expects key=value, got '{pair}'"))?;
            let k = k.trim();
            if k.is_empty() {
                bail!("{flag} expects key=value, got '{pair}'");
            }
            Ok((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

fn parse_limits(raw: &[String]) -> Result<Limits> {
    let mut limits = Limits::new();
    for (name, max) in parse_pairs(raw, "--limit")? {
        let max: u64 = max
            .parse()
            .with_context(|| format!("--limit {name} must be a non-negative integer"))?;
        if max > Limits::MAX_VALUE {
            bail!("--limit {name} must not exceed {}", Limits::MAX_VALUE);
        }
        limits.set(name, max);
    }
    Ok(limits)
}
