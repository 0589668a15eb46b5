//! bucketdav command-line driver.
//!
//! Runs one verb against the mounts described by a TOML config, with buckets
//! stored as directories under the config's `store_root`.
//!
//! Usage:
//!   bucketdav --config bucketdav.toml mounts
//!   bucketdav --config bucketdav.toml propfind /media/ --depth 1
//!   bucketdav --config bucketdav.toml copy /media/a/ /media/b/
//!   bucketdav --config bucketdav.toml move /media/a.txt /media/z.txt --no-overwrite
//!   bucketdav --config bucketdav.toml mkcol /media/new/
//!   bucketdav --config bucketdav.toml delete /media/old/
//!
//! Set `RUST_LOG=bucketdav_kernel=debug` to see per-verb spans.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bucketdav_kernel::{Config, Dav, DavRequest, DavResponse, LocalObjectStore, Principal};

/// Filesystem verbs over object-storage buckets.
#[derive(Parser, Debug)]
#[command(name = "bucketdav")]
#[command(about = "Run WebDAV-style verbs against bucket mounts")]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "bucketdav.toml")]
    config: PathBuf,

    /// Override the config's store_root
    #[arg(long)]
    store_root: Option<PathBuf>,

    /// Principal to act as (defaults to the login name)
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy a file or directory within a mount
    Copy {
        source: String,
        destination: String,
        /// 0 or infinity
        #[arg(long)]
        depth: Option<String>,
        /// Fail instead of replacing an existing destination
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Move a file or directory within a mount
    Move {
        source: String,
        destination: String,
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Create a directory
    Mkcol { path: String },
    /// Delete a file or directory
    Delete {
        path: String,
        /// 0 or infinity
        #[arg(long)]
        depth: Option<String>,
    },
    /// List a path as a multistatus document
    Propfind {
        path: String,
        /// 0, 1 or infinity
        #[arg(long)]
        depth: Option<String>,
    },
    /// List configured mounts
    Mounts,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let store_root = args
        .store_root
        .clone()
        .or_else(|| config.store_root.clone())
        .context("no store_root in config and none given with --store-root")?;
    tracing::debug!(root = %store_root.display(), "using local object store");

    let store = Arc::new(LocalObjectStore::new(store_root));
    let dav = Dav::from_config(&config, store).await?;

    if let Command::Mounts = args.command {
        for mount in dav.mounts().list_mounts().await {
            println!("{}\t{}\t{}", mount.path, mount.id, mount.backend_id);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let principal = Principal::named(args.user.clone().unwrap_or_else(whoami::username));
    let request = build_request(&args.command, &dav, principal)?;
    let response = dav.handle(&request).await;
    Ok(report(&response))
}

fn build_request(command: &Command, dav: &Dav, principal: Principal) -> Result<DavRequest> {
    let base_path = dav.settings().base_path.as_str();
    let request = match command {
        Command::Copy {
            source,
            destination,
            depth,
            no_overwrite,
        } => {
            let copy = DavRequest::named("COPY", source.as_str(), principal)?;
            let request = transfer(copy, destination, base_path, *no_overwrite)?;
            with_depth(request, depth.as_deref())?
        }
        Command::Move {
            source,
            destination,
            no_overwrite,
        } => {
            let moved = DavRequest::named("MOVE", source.as_str(), principal)?;
            transfer(moved, destination, base_path, *no_overwrite)?
        }
        Command::Mkcol { path } => DavRequest::named("MKCOL", path.as_str(), principal)?,
        Command::Delete { path, depth } => {
            let request = DavRequest::named("DELETE", path.as_str(), principal)?;
            with_depth(request, depth.as_deref())?
        }
        Command::Propfind { path, depth } => {
            let request = DavRequest::named("PROPFIND", path.as_str(), principal)?;
            with_depth(request, depth.as_deref())?
        }
        Command::Mounts => anyhow::bail!("mounts is not a verb"),
    };
    Ok(request)
}

fn transfer(
    request: DavRequest,
    destination: &str,
    base_path: &str,
    no_overwrite: bool,
) -> Result<DavRequest> {
    // Destination headers carry the public URL path, base path included
    let target = format!("{base_path}{destination}");
    let mut request = request.with_header("destination", &target)?;
    if no_overwrite {
        request = request.with_header("overwrite", "F")?;
    }
    Ok(request)
}

fn with_depth(request: DavRequest, depth: Option<&str>) -> Result<DavRequest> {
    Ok(match depth {
        Some(depth) => request.with_header("depth", depth)?,
        None => request,
    })
}

/// Print the status line and body; non-2xx exits with failure.
fn report(response: &DavResponse) -> ExitCode {
    let status = response.status;
    println!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    if let Some(body) = &response.body {
        println!("{body}");
    }
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
