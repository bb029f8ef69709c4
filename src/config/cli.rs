//! Command-line surface.

use clap::{ArgAction, Parser};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "live-serve")]
#[command(about = "Serve the current directory with proxy fallthrough and live reload", long_about = None)]
pub struct CliArgs {
    /// Port to listen on; the next free port is used if it is taken
    #[arg(short, long, default_value_t = 8080)]
    pub port: u32,

    /// Upstream URL for requests that do not match a local file
    #[arg(long)]
    pub proxy: Option<String>,

    /// JSON object of extra headers sent with proxied requests
    #[arg(long, default_value = "{}")]
    pub headers: String,

    /// Disable live reload
    #[arg(long = "noHot", alias = "no-hot")]
    pub no_hot: bool,

    /// Extra files or folders the live-reload watcher ignores
    #[arg(long, num_args = 1.., action = ArgAction::Append)]
    pub ignore: Vec<String>,

    /// Verbose request logging
    #[arg(long)]
    pub debug: bool,

    /// Serve over HTTPS (only applied together with --noHot)
    #[arg(long)]
    pub https: bool,

    /// PEM private key to use instead of a generated one
    #[arg(long, requires_all = ["https", "https_cert"])]
    pub https_key: Option<PathBuf>,

    /// PEM certificate to use instead of a generated one
    #[arg(long, requires_all = ["https", "https_key"])]
    pub https_cert: Option<PathBuf>,

    /// Directory to serve (defaults to the working directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
}
