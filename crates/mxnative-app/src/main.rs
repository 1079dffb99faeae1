// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mxnative developer CLI.
//
// Entry point. Initialises logging, builds the native services over the
// platform bridge, and runs one command against them.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};
use mxnative_core::RuntimeConfig;
use mxnative_core::error::{MxNativeError, Result};
use mxnative_core::types::{DownloadConfig, OtaDeployConfig, OtaDownloadConfig};
use mxnative_net::{CookieEncryptionInterceptor, SetCookie};
use mxnative_ota::BundleSource;
use mxnative_security::AesGcmCipher;

use services::data_dir;
use services::native_services::NativeServices;

#[derive(Debug, Parser)]
#[command(name = "mxnative", version, about = "Drive the mxnative runtime bridge from a desktop shell")]
struct Cli {
    /// Runtime configuration file (JSON). Defaults to `mxnative.json` in the
    /// documents directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the bundle the runtime would boot from.
    Resolve {
        /// Developer bundle URL used when no OTA bundle is usable.
        #[arg(long = "override")]
        override_url: Option<String>,
    },
    /// Download an OTA package from the runtime origin.
    Download { url: String },
    /// Deploy a previously downloaded OTA package.
    Deploy {
        #[arg(long)]
        id: String,
        /// Package file name returned by `download`.
        #[arg(long)]
        package: String,
        /// Directory under the OTA root to extract into.
        #[arg(long)]
        dir: String,
    },
    /// Download any file into the app's accessible directories.
    Fetch {
        url: String,
        destination: PathBuf,
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u32>,
    },
    /// Show what an older runtime version cannot handle.
    Compat { runtime_version: String },
    /// Print the constant map handed to the JS runtime.
    Constants,
    /// Encrypt or decrypt cookies the way the interceptor does.
    Cookie {
        /// Trusted runtime host.
        #[arg(long)]
        host: String,
        /// Base64 AES-256 key. A fresh key is generated and printed if omitted.
        #[arg(long)]
        key: Option<String>,
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Debug, Subcommand)]
enum CookieAction {
    /// Turn a `Set-Cookie` value into its encrypted and expired pair.
    Encrypt { set_cookie: String },
    /// Decrypt a request `Cookie` header.
    Decrypt { header: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "command failed");
            eprintln!("{}: {e}", e.code());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Cookie { host, key, action } = cli.command {
        return run_cookie(&host, key.as_deref(), action);
    }

    let bridge = mxnative_bridge::platform_bridge();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => data_dir::load_config(&bridge.documents_dir()?),
    };
    let services = NativeServices::init(bridge.as_ref(), config)?;

    match cli.command {
        Command::Resolve { override_url } => {
            let services = match override_url {
                Some(url) => services.with_bundle_override(url),
                None => services,
            };
            match services.resolve_bundle() {
                BundleSource::Ota(url) => println!("ota {url}"),
                BundleSource::Override(url) => println!("override {url}"),
                BundleSource::Bundled(name) => println!("bundled {name}"),
            }
        }
        Command::Download { url } => {
            let response = services.ota_download(&OtaDownloadConfig::new(url)).await?;
            print_json(&response)?;
        }
        Command::Deploy { id, package, dir } => {
            let manifest = services
                .ota_deploy(&OtaDeployConfig::new(id, package, dir))
                .await?;
            print_json(&manifest)?;
        }
        Command::Fetch {
            url,
            destination,
            mime,
            timeout_ms,
        } => {
            let config = DownloadConfig {
                connection_timeout: timeout_ms,
                mime_type: mime,
            };
            services
                .download(&url, &destination, &config, |progress| {
                    tracing::info!(
                        received = progress.received_bytes,
                        total = progress.total_bytes,
                        "progress"
                    );
                })
                .await?;
            println!("{}", destination.display());
        }
        Command::Compat { runtime_version } => {
            print_json(&services.unsupported_features(&runtime_version))?;
        }
        Command::Constants => match services.constants()? {
            Some(constants) => print_json(&constants)?,
            None => println!("{{}}"),
        },
        Command::Cookie { .. } => {}
    }
    Ok(())
}

fn run_cookie(host: &str, key: Option<&str>, action: CookieAction) -> Result<()> {
    let key = match key {
        Some(encoded) => BASE64
            .decode(encoded.trim())
            .map_err(|e| MxNativeError::Decryption(format!("key is not Base64: {e}")))?,
        None => {
            let key = AesGcmCipher::generate_key()?;
            eprintln!("key: {}", BASE64.encode(key));
            key.to_vec()
        }
    };
    let interceptor = CookieEncryptionInterceptor::new(host, Arc::new(AesGcmCipher::new(&key)?));

    match action {
        CookieAction::Encrypt { set_cookie } => {
            let (encrypted, expired) = interceptor.encrypt_cookie(&SetCookie::parse(&set_cookie)?)?;
            println!("Set-Cookie: {encrypted}");
            println!("Set-Cookie: {expired}");
        }
        CookieAction::Decrypt { header } => match interceptor.decrypt_cookie_header(&header)? {
            Some(decrypted) => println!("Cookie: {decrypted}"),
            None => println!("Cookie: {header}"),
        },
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
