//! CLI entry point for the httpdispatch tool.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use httpdispatch_core::{CachePolicy, HttpDispatcher, ProgressSink, RequestBody, RequestSpec};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::Args;
use progress::DownloadProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let dispatcher = HttpDispatcher::with_data_dir(&args.data_dir)
        .with_context(|| format!("cannot set up dispatcher in {}", args.data_dir.display()))?;
    let spec = build_spec(&args)?;

    let cancellation = spec.cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling request");
            cancellation.cancel();
        }
    });

    if args.download {
        let progress = Arc::new(DownloadProgress::new(!args.quiet && io::stderr().is_terminal()));
        let sink: Arc<dyn ProgressSink> = Arc::clone(&progress) as Arc<dyn ProgressSink>;
        let spec = spec.with_progress(sink);
        let result = dispatcher.download_to_temp_file(&spec).await;
        progress.finish();

        let response = result?;
        if let Some(path) = response.temp_file_path() {
            info!(status = response.status.as_u16(), bytes = ?response.content_length, "download complete");
            println!("{}", path.display());
        }
        return Ok(());
    }

    let body = if args.form.is_empty() {
        let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method: {}", args.method))?;
        let response = dispatcher.send(&spec, method).await?;
        info!(
            status = response.status.as_u16(),
            content_type = ?response.content_type,
            url = %response.response_url,
            "response received"
        );
        response.body
    } else {
        dispatcher.post_form(&spec, args.form.as_slice()).await?
    };

    let bytes = body.bytes().await.context("failed to read response body")?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&bytes).await?;
    stdout.flush().await?;
    Ok(())
}

/// Translates CLI flags into a request description.
fn build_spec(args: &Args) -> Result<RequestSpec> {
    let mut spec =
        RequestSpec::new(args.url.clone()).with_timeout(Duration::from_secs(args.timeout_secs));

    for (name, value) in &args.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name: {name}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header {name}"))?;
        spec.headers.append(name, value);
    }

    if let Some(data) = &args.data {
        spec.body = Some(RequestBody::Text(data.clone()));
    }
    if let Some(ttl) = args.cache_ttl_secs {
        spec.cache_policy = CachePolicy::Ttl(Duration::from_secs(ttl));
    }
    if let Some(size) = args.concurrency {
        spec = spec.with_admission(Arc::new(Semaphore::new(usize::from(size))));
    }
    spec.enable_compression = !args.no_compression;
    spec.buffer_content = !args.no_buffer;

    Ok(spec)
}
