use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use smimer::cert::params::NameFields;
use smimer::pfx::Pkcs12Options;
use smimer::pipeline::{IssuanceConfig, file_stem, issue_bundle};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smimer")]
#[command(about = "Issue an S/MIME certificate with its own mail CA and export it as PKCS#12")]
#[command(version)]
struct Cli {
    /// Email address the certificate is issued for
    #[arg(long)]
    email: String,
    /// Password protecting the PKCS#12 archive
    #[arg(long, env = "SMIMER_PASSWORD", hide_env_values = true)]
    password: String,
    /// Two-letter country code
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    org_unit: Option<String>,
    #[arg(long)]
    organization: Option<String>,
    /// CA validity in days
    #[arg(long, default_value_t = 3650)]
    ca_days: u32,
    /// Leaf certificate validity in days
    #[arg(long, default_value_t = 365)]
    leaf_days: u32,
    /// RSA modulus length
    #[arg(long, default_value_t = smimer::key::DEFAULT_RSA_BITS)]
    key_bits: usize,
    /// Friendly name shown by mail clients for the imported key
    #[arg(long)]
    friendly_name: Option<String>,
    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let stem = file_stem(&cli.email)?;

    let organization = NameFields::builder()
        .maybe_country(cli.country)
        .maybe_locality(cli.city)
        .maybe_organizational_unit(cli.org_unit)
        .maybe_organization(cli.organization)
        .build();
    let config = IssuanceConfig::builder()
        .key_bits(cli.key_bits)
        .ca_validity_days(cli.ca_days)
        .leaf_validity_days(cli.leaf_days)
        .pkcs12(
            Pkcs12Options::builder()
                .maybe_friendly_name(cli.friendly_name)
                .build(),
        )
        .build();

    let bundle = issue_bundle(&config, &cli.email, &organization, &cli.password)?;

    fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating {}", cli.out.display()))?;
    let outputs = [
        (cli.out.join(format!("{stem}.p12")), bundle.pkcs12.clone()),
        (
            cli.out.join("ca.pem"),
            bundle.ca_certificate.to_pem()?.into_bytes(),
        ),
        (
            cli.out.join(format!("{stem}.pem")),
            bundle.leaf_certificate.to_pem()?.into_bytes(),
        ),
    ];
    for (path, contents) in outputs {
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote");
    }

    Ok(())
}
