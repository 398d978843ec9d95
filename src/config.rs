//! Run configuration: CLI locations plus credentials from the environment.
use crate::cli::RunArgs;
use crate::env::Env;
use crate::http::readiness::RetryPolicy;
use crate::model::{Credential, ServerSettings, SingleAdmin};
use crate::wps::{FACTORY_PASSWORD, FACTORY_USERNAME};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const TOMCAT_USERNAME: &str = "RIESGOS_WPS_TOMCAT_USERNAME";
pub const TOMCAT_PASSWORD: &str = "RIESGOS_WPS_TOMCAT_PASSWORD";
pub const TOMCAT_CONNECTION_TIMEOUT: &str = "RIESGOS_WPS_TOMCAT_CONNECTION_TIMEOUT";
pub const WPS_USERNAME: &str = "RIESGOS_WPS_USERNAME";
/// Also the key under which the applied WPS password is recorded.
pub const WPS_PASSWORD: &str = "RIESGOS_WPS_PASSWORD";
pub const WPS_ACCESS_PROTOCOL: &str = "RIESGOS_WPS_ACCESS_SERVER_PROTOCOL";
pub const WPS_ACCESS_HOST: &str = "RIESGOS_WPS_ACCESS_SERVER_HOST";
pub const WPS_ACCESS_PORT: &str = "RIESGOS_WPS_ACCESS_SERVER_PORT";
pub const WPS_ACCESS_PATH: &str = "RIESGOS_WPS_ACCESS_SERVER_PATH";
pub const GEOSERVER_USERNAME: &str = "RIESGOS_GEOSERVER_USERNAME";
pub const GEOSERVER_PASSWORD: &str = "RIESGOS_GEOSERVER_PASSWORD";
pub const UPLOAD_SHELL: &str = "STACK_INIT_UPLOAD_SHELL";

pub const DEFAULT_CONNECTION_TIMEOUT_MS: &str = "180000";
pub const TOMCAT_ADMIN_ROLE: &str = "manager-gui";
pub const GEOSERVER_ADMIN_ROLE: &str = "ADMIN";

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub tomcat_base: PathBuf,
    pub geoserver_base: PathBuf,
    pub styles_dir: PathBuf,
    pub state_file: PathBuf,
    pub wps_url: String,
    pub geoserver_url: String,
    pub style_upload_script: Option<PathBuf>,
    pub reload_apps: Vec<String>,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub tomcat_admin: SingleAdmin,
    pub connection_timeout_ms: String,
    pub wps_username: String,
    /// The password WPS should end up with.
    pub wps_password: String,
    pub server_settings: ServerSettings,
    pub geoserver_admin: SingleAdmin,
    pub upload_shell: Vec<String>,
}

impl ProvisionConfig {
    pub fn from_args(args: &RunArgs, env: &Env) -> Result<Self> {
        let tomcat_username = env.read_or(TOMCAT_USERNAME, "");
        let tomcat_password = env.read_or(TOMCAT_PASSWORD, "");
        if tomcat_username.is_empty() || tomcat_password.is_empty() {
            tracing::warn!(
                username_var = TOMCAT_USERNAME,
                password_var = TOMCAT_PASSWORD,
                "Tomcat admin credential not set; writing empty values"
            );
        }

        let connection_timeout_ms =
            env.read_or(TOMCAT_CONNECTION_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT_MS);
        connection_timeout_ms.parse::<u64>().with_context(|| {
            format!("{TOMCAT_CONNECTION_TIMEOUT}={connection_timeout_ms} is not a number of milliseconds")
        })?;

        let upload_shell_raw = env.read_or(UPLOAD_SHELL, "sh");
        let upload_shell = shell_words::split(&upload_shell_raw)
            .with_context(|| format!("parse {UPLOAD_SHELL}"))?;
        if upload_shell.is_empty() {
            return Err(anyhow!("{UPLOAD_SHELL} is empty"));
        }

        Ok(Self {
            tomcat_base: args.tomcat_base.clone(),
            geoserver_base: args.geoserver_base.clone(),
            styles_dir: args.styles_dir.clone(),
            state_file: args.state_file.clone(),
            wps_url: args.wps_url.clone(),
            geoserver_url: args.geoserver_url.clone(),
            style_upload_script: args.style_upload_script.clone(),
            reload_apps: args.reload_apps.clone(),
            retry: retry_policy(args),
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            tomcat_admin: SingleAdmin {
                credential: Credential::new(tomcat_username, tomcat_password),
                role: TOMCAT_ADMIN_ROLE.to_string(),
            },
            connection_timeout_ms,
            wps_username: env.read_or(WPS_USERNAME, FACTORY_USERNAME),
            wps_password: env.read_or(WPS_PASSWORD, FACTORY_PASSWORD),
            server_settings: ServerSettings {
                protocol: env.read_or(WPS_ACCESS_PROTOCOL, "http"),
                hostname: env.read_or(WPS_ACCESS_HOST, "localhost"),
                port: env.read_or(WPS_ACCESS_PORT, "8082"),
                webapp_path: env.read_or(WPS_ACCESS_PATH, "wps"),
            },
            geoserver_admin: SingleAdmin {
                credential: Credential::new(
                    env.read_or(GEOSERVER_USERNAME, "admin"),
                    env.read_or(GEOSERVER_PASSWORD, "geoserver"),
                ),
                role: GEOSERVER_ADMIN_ROLE.to_string(),
            },
            upload_shell,
        })
    }
}

fn retry_policy(args: &RunArgs) -> RetryPolicy {
    let interval = Duration::from_secs(args.retry_interval_secs);
    match args.max_probes {
        Some(max_attempts) => RetryPolicy::bounded(interval, max_attempts),
        None => RetryPolicy::unbounded(interval),
    }
}
