//! CLI argument parsing for the provisioning run.
//!
//! Paths, URLs and timing come from flags (or their `STACK_INIT_*`
//! variables); credentials stay in the service environment variables and are
//! resolved in `config`.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "stack-init",
    version,
    about = "Provision a freshly started Tomcat/WPS/GeoServer stack",
    after_help = "Commands:\n  run    Apply every provisioning step in order\n  plan   Print the step list without touching anything\n\nExamples:\n  stack-init run\n  stack-init run --skip geoserver-upload-styles\n  stack-init plan --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Plan(PlanArgs),
}

/// Run command inputs.
#[derive(Parser, Debug, Clone)]
#[command(about = "Apply every provisioning step in order")]
pub struct RunArgs {
    /// Tomcat installation root (contains conf/ and webapps/)
    #[arg(long, value_name = "DIR", env = "STACK_INIT_TOMCAT_BASE", default_value = "/tomcat")]
    pub tomcat_base: PathBuf,

    /// GeoServer web application root (contains data/)
    #[arg(
        long,
        value_name = "DIR",
        env = "STACK_INIT_GEOSERVER_BASE",
        default_value = "/tomcat/webapps/geoserver"
    )]
    pub geoserver_base: PathBuf,

    /// Directory scanned for *.sld style files
    #[arg(long, value_name = "DIR", env = "STACK_INIT_STYLES_DIR", default_value = "/styles")]
    pub styles_dir: PathBuf,

    /// JSON record of values carried between runs
    #[arg(
        long,
        value_name = "PATH",
        env = "STACK_INIT_STATE_FILE",
        default_value = "/tomcat/webapps/wps/WEB-INF/classes/init_wps.json"
    )]
    pub state_file: PathBuf,

    /// Base URL of the WPS web console
    #[arg(long, value_name = "URL", env = "STACK_INIT_WPS_URL", default_value = "http://localhost:8080/wps")]
    pub wps_url: String,

    /// Base URL of GeoServer
    #[arg(
        long,
        value_name = "URL",
        env = "STACK_INIT_GEOSERVER_URL",
        default_value = "http://localhost:8080/geoserver"
    )]
    pub geoserver_url: String,

    /// Style upload script template; without it styles are only installed on disk
    #[arg(long, value_name = "PATH", env = "STACK_INIT_STYLE_UPLOAD_SCRIPT")]
    pub style_upload_script: Option<PathBuf>,

    /// Web application to reload after configuration changes (repeatable)
    #[arg(long = "reload-app", value_name = "APP", default_values_t = [String::from("geoserver"), String::from("wps")])]
    pub reload_apps: Vec<String>,

    /// Seconds between readiness probes
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub retry_interval_secs: u64,

    /// Give up after this many failed readiness probes (default: wait forever)
    #[arg(long, value_name = "N")]
    pub max_probes: Option<u32>,

    /// Timeout for a single HTTP request
    #[arg(long, value_name = "N", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Step to leave out of this run (repeatable)
    #[arg(long = "skip", value_name = "STEP")]
    pub skip: Vec<String>,
}

/// Plan command inputs.
#[derive(Parser, Debug, Clone)]
#[command(about = "Print the ordered step list and its failure policies")]
pub struct PlanArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Step the run would leave out (repeatable)
    #[arg(long = "skip", value_name = "STEP")]
    pub skip: Vec<String>,
}
