//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Send one HTTP request through the dispatcher.
///
/// Responses are written to stdout. With `--download` the body is saved to a
/// temp file under the data directory and its path is printed instead.
#[derive(Parser, Debug)]
#[command(name = "httpdispatch")]
#[command(author, version, about)]
pub struct Args {
    /// URL to request (credentials in the URL are sent as Basic auth)
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short = 'd', long, conflicts_with = "form")]
    pub data: Option<String>,

    /// Form field as key=value, sent form-urlencoded with POST (repeatable)
    #[arg(short = 'F', long, value_parser = parse_form_field)]
    pub form: Vec<(String, String)>,

    /// Request deadline in seconds (1-3600)
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: u64,

    /// Serve GET responses from the disk cache when younger than this many seconds
    #[arg(long)]
    pub cache_ttl_secs: Option<u64>,

    /// Directory holding the cache and temp downloads
    #[arg(long, default_value = ".httpdispatch")]
    pub data_dir: PathBuf,

    /// Save the body to a temp file and show a progress bar
    #[arg(long, conflicts_with_all = ["form", "no_buffer"])]
    pub download: bool,

    /// Do not negotiate gzip/deflate content encoding
    #[arg(long)]
    pub no_compression: bool,

    /// Stream the response instead of buffering it
    #[arg(long)]
    pub no_buffer: bool,

    /// Admission pool size for the request (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got \"{raw}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in \"{raw}\""));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_form_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got \"{raw}\""))?;
    Ok((key.to_string(), value.to_string()))
}
