//! mdm-enroll - inspect DEP enrollment requests and enrollment configuration.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr as _;
use mdm_crypto::{SignerPolicy, VerifyOptions};

#[derive(Parser)]
#[command(name = "mdm-enroll")]
#[command(about = "Verify DEP enrollment requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a signed enrollment request and print the device it describes
    Verify {
        /// Request body: BER or DER signed-data, or its base64 encoding
        file: PathBuf,

        /// Content signed by a detached envelope
        #[arg(long)]
        detached: Option<PathBuf>,

        /// Only accept the first signer
        #[arg(long)]
        strict: bool,

        /// Reject SHA-1 signatures
        #[arg(long)]
        no_sha1: bool,
    },

    /// Check enrollment configuration and print the derived values
    Config {
        /// Payload identifier prefix
        #[arg(long)]
        prefix: String,

        /// Public hostname of the MDM server
        #[arg(long)]
        hostname: String,

        #[arg(long, default_value_t = 443)]
        port: u16,

        /// APNs push certificate (PEM)
        #[arg(long)]
        push_certificate: PathBuf,
    },
}

fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            file,
            detached,
            strict,
            no_sha1,
        } => {
            let options = VerifyOptions {
                policy: if strict {
                    SignerPolicy::PrimaryOnly
                } else {
                    SignerPolicy::FirstValid
                },
                allow_sha1: !no_sha1,
            };
            cmd_verify(&file, detached.as_deref(), &options)
        }
        Commands::Config {
            prefix,
            hostname,
            port,
            push_certificate,
        } => {
            let push_certificate_pem = std::fs::read_to_string(&push_certificate)
                .wrap_err_with(|| format!("failed to read {}", push_certificate.display()))?;
            cmd_config(&mdm_core::EnrollmentConfig {
                payload_prefix: prefix,
                public_hostname: hostname,
                port,
                push_certificate_pem,
            })
        }
    }
}

/// Read a request body, accepting raw DER or base64.
fn read_envelope(path: &Path) -> color_eyre::eyre::Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;

    // Binary signed-data always starts with a SEQUENCE tag.
    if bytes.first() == Some(&0x30) {
        return Ok(bytes);
    }

    let text: Vec<u8> = bytes
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .wrap_err("request body is neither DER nor base64")
}

fn cmd_verify(
    file: &Path,
    detached: Option<&Path>,
    options: &VerifyOptions,
) -> color_eyre::eyre::Result<()> {
    let envelope = read_envelope(file)?;

    let identity = match detached {
        Some(path) => {
            let content = std::fs::read(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            mdm_crypto::verify_detached(&envelope, &content, options)
        }
        None => mdm_crypto::verify_signed_data(&envelope, options),
    }
    .wrap_err("enrollment request rejected")?;

    let certificate = identity.parse_certificate()?;
    let fingerprint = mdm_crypto::cert_fingerprint(&identity.certificate);

    println!("=== Signer ===\n");
    println!("Subject:     {}", certificate.subject());
    println!("Issuer:      {}", certificate.issuer());
    println!("Fingerprint: {}", mdm_crypto::fingerprint_hex(&fingerprint));
    println!("Index:       {}", identity.signer_index);

    let info = mdm_core::parse_machine_info(&identity.content)?;

    println!("\n=== Device ===\n");
    println!("UDID:        {}", info.udid);
    let optional = [
        ("Serial", &info.serial),
        ("Product", &info.product),
        ("Version", &info.version),
        ("IMEI", &info.imei),
        ("MEID", &info.meid),
        ("Language", &info.language),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("{:<12} {}", format!("{label}:"), value);
        }
    }

    Ok(())
}

fn cmd_config(config: &mdm_core::EnrollmentConfig) -> color_eyre::eyre::Result<()> {
    config.validate()?;

    println!("=== Enrollment ===\n");
    println!("Profile:     {}", config.payload_identifier("enroll"));
    println!("Topic:       {}", config.push_topic()?);
    println!("Server URL:  {}", config.server_url());
    println!("Check-in:    {}", config.check_in_url());

    Ok(())
}
