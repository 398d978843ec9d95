//! Provisioning entrypoint for a freshly started Tomcat/WPS/GeoServer stack.
//!
//! Each invocation resolves its configuration, checks the fixed step list and
//! applies it in order. All log output goes to stderr; `plan` prints to stdout.
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod env;
mod geoserver;
mod http;
mod model;
mod provision;
mod state;
mod styles;
mod tasks;
mod tomcat;
mod wps;
mod xml;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_logging();
    match args.command {
        cli::Command::Run(args) => provision::run(&args),
        cli::Command::Plan(args) => provision::plan(&args),
    }
}
