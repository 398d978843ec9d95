//! The fixed provisioning run for the Tomcat/WPS/GeoServer stack.
//!
//! Steps share a [`ProvisionContext`]: the resolved configuration, the
//! persisted record and a factory that opens a fresh HTTP session whenever a
//! step talks to a console.
use crate::cli::{PlanArgs, RunArgs};
use crate::config::{ProvisionConfig, WPS_PASSWORD};
use crate::env::Env;
use crate::geoserver::{credential_probe_url, GeoServer};
use crate::http::readiness::{wait_until_credentials_recognized, wait_until_ready};
use crate::http::{HttpTransport, SessionFactory, UreqTransport};
use crate::state::StateStore;
use crate::styles::{install_styles, InstalledStyle, UploadScript};
use crate::tasks::{FailurePolicy, PlannedStep, RunReport, Step, TaskList};
use crate::tomcat::Tomcat;
use crate::wps::{self, WpsConsole, FACTORY_PASSWORD};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::time::Duration;

pub struct ProvisionContext {
    pub config: ProvisionConfig,
    pub state: StateStore,
    new_session: SessionFactory,
    sleep: fn(Duration),
    installed_styles: Vec<InstalledStyle>,
}

impl ProvisionContext {
    /// Load the persisted record named by `config`.
    pub fn new(config: ProvisionConfig, new_session: SessionFactory) -> Result<Self> {
        let state = StateStore::load(&config.state_file)?;
        Ok(Self {
            config,
            state,
            new_session,
            sleep: std::thread::sleep,
            installed_styles: Vec::new(),
        })
    }

    #[cfg(test)]
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    fn tomcat(&self) -> Tomcat {
        Tomcat::new(&self.config.tomcat_base)
    }

    fn geoserver(&self) -> GeoServer {
        GeoServer::new(&self.config.geoserver_base)
    }

    fn session(&self) -> Box<dyn HttpTransport> {
        (self.new_session)()
    }

    fn wps_console(&self) -> WpsConsole {
        WpsConsole::new(&self.config.wps_url, self.session())
    }

    fn wait_for_wps(&self) -> Result<()> {
        let session = self.session();
        wait_until_ready(
            session.as_ref(),
            &self.config.wps_url,
            None,
            &self.config.retry,
            self.sleep,
        )?;
        Ok(())
    }

    /// The WPS password this tool last applied, or the factory default.
    fn recorded_wps_password(&self) -> String {
        self.state.get_or(WPS_PASSWORD, FACTORY_PASSWORD)
    }
}

/// Session factory for the real services.
pub fn ureq_sessions(timeout: Duration) -> SessionFactory {
    Box::new(move || Box::new(UreqTransport::new(timeout)) as Box<dyn HttpTransport>)
}

pub fn task_list() -> TaskList<ProvisionContext> {
    let mut tasks = TaskList::new();
    tasks
        .register(Step {
            name: "tomcat-admin-user",
            description: "write the single Tomcat manager user",
            requires: &[],
            policy: FailurePolicy::Abort,
            action: tomcat_admin_user,
        })
        .register(Step {
            name: "tomcat-connection-timeout",
            description: "set the HTTP connector connectionTimeout",
            requires: &[],
            policy: FailurePolicy::Abort,
            action: tomcat_connection_timeout,
        })
        .register(Step {
            name: "wps-password",
            description: "rotate the WPS console password and record it",
            requires: &[],
            policy: FailurePolicy::Continue,
            action: wps_password,
        })
        .register(Step {
            name: "wps-server-settings",
            description: "post the WPS server access settings",
            requires: &["wps-password"],
            policy: FailurePolicy::Abort,
            action: wps_server_settings,
        })
        .register(Step {
            name: "geoserver-admin-user",
            description: "write the single GeoServer admin user and its role",
            requires: &[],
            policy: FailurePolicy::Abort,
            action: geoserver_admin_user,
        })
        .register(Step {
            name: "geoserver-styles",
            description: "install SLD styles and their catalog descriptors",
            requires: &[],
            policy: FailurePolicy::Abort,
            action: geoserver_styles,
        })
        .register(Step {
            name: "tomcat-reload",
            description: "touch web.xml of each reloaded application",
            requires: &["tomcat-admin-user", "geoserver-admin-user"],
            policy: FailurePolicy::Abort,
            action: tomcat_reload,
        })
        .register(Step {
            name: "geoserver-upload-styles",
            description: "run the style upload script once GeoServer accepts the admin",
            requires: &["geoserver-styles", "tomcat-reload"],
            policy: FailurePolicy::Abort,
            action: geoserver_upload_styles,
        })
        .register(Step {
            name: "store-state",
            description: "write the persisted record",
            requires: &[],
            policy: FailurePolicy::Abort,
            action: store_state,
        });
    tasks
}

fn tomcat_admin_user(ctx: &mut ProvisionContext) -> Result<()> {
    let replaced = ctx.tomcat().set_admin_user(&ctx.config.tomcat_admin)?;
    tracing::info!(
        username = %ctx.config.tomcat_admin.credential.username,
        replaced,
        "Tomcat admin user written"
    );
    Ok(())
}

fn tomcat_connection_timeout(ctx: &mut ProvisionContext) -> Result<()> {
    ctx.tomcat()
        .set_connection_timeout(&ctx.config.connection_timeout_ms)?;
    Ok(())
}

fn wps_password(ctx: &mut ProvisionContext) -> Result<()> {
    let recorded = ctx.recorded_wps_password();
    let desired = ctx.config.wps_password.clone();
    ctx.wait_for_wps()?;
    let outcome = wps::rotate_password(
        || ctx.wps_console(),
        &ctx.config.wps_username,
        &recorded,
        &desired,
    )?;
    tracing::info!(?outcome, "WPS password settled");
    ctx.state.put(WPS_PASSWORD, &desired);
    // The final store-state step saves again; this covers an abort in between.
    if let Err(err) = ctx.state.save_if_dirty() {
        tracing::warn!(error = %format!("{err:#}"), "could not save state after rotation");
    }
    Ok(())
}

fn wps_server_settings(ctx: &mut ProvisionContext) -> Result<()> {
    ctx.wait_for_wps()?;
    let password = ctx.recorded_wps_password();
    let mut console = ctx.wps_console();
    console
        .login(&ctx.config.wps_username, &password)
        .context("log in to WPS console")?;
    console
        .post_settings(&ctx.config.server_settings)
        .context("post WPS server settings")?;
    Ok(())
}

fn geoserver_admin_user(ctx: &mut ProvisionContext) -> Result<()> {
    let geoserver = ctx.geoserver();
    let admin = &ctx.config.geoserver_admin;
    geoserver.set_admin_user(admin)?;
    geoserver.set_admin_role(admin)?;
    tracing::info!(username = %admin.credential.username, role = %admin.role, "GeoServer admin written");
    Ok(())
}

fn geoserver_styles(ctx: &mut ProvisionContext) -> Result<()> {
    let target = ctx.geoserver().styles_dir();
    ctx.installed_styles = install_styles(&ctx.config.styles_dir, &target)?;
    tracing::info!(count = ctx.installed_styles.len(), "styles installed");
    Ok(())
}

fn tomcat_reload(ctx: &mut ProvisionContext) -> Result<()> {
    let tomcat = ctx.tomcat();
    for app in &ctx.config.reload_apps {
        let descriptor = tomcat
            .reload_app(app)
            .with_context(|| format!("reload {app}"))?;
        tracing::info!(app = %app, descriptor = %descriptor.display(), "reload requested");
    }
    Ok(())
}

fn geoserver_upload_styles(ctx: &mut ProvisionContext) -> Result<()> {
    let Some(template) = ctx.config.style_upload_script.clone() else {
        tracing::info!("no style upload script configured; styles stay file-only");
        return Ok(());
    };
    if ctx.installed_styles.is_empty() {
        tracing::info!("no styles installed; nothing to upload");
        return Ok(());
    }
    let credential = &ctx.config.geoserver_admin.credential;
    let session = ctx.session();
    wait_until_credentials_recognized(
        session.as_ref(),
        &credential_probe_url(&ctx.config.geoserver_url),
        credential,
        &ctx.config.retry,
        ctx.sleep,
    )?;
    let script = UploadScript::prepare(
        &template,
        ctx.config.upload_shell.clone(),
        &ctx.config.geoserver_url,
        credential,
    )?;
    for style in &ctx.installed_styles {
        script.run(style)?;
        tracing::info!(
            style = %style.name,
            descriptor = %style.descriptor_path.display(),
            "style uploaded"
        );
    }
    Ok(())
}

fn store_state(ctx: &mut ProvisionContext) -> Result<()> {
    ctx.state.save()?;
    tracing::info!(path = %ctx.state.path().display(), "state stored");
    Ok(())
}

fn skip_set(names: &[String]) -> BTreeSet<String> {
    names.iter().cloned().collect()
}

/// Run the full step list against the real services.
pub fn run(args: &RunArgs) -> Result<()> {
    let config = ProvisionConfig::from_args(args, &Env::process())?;
    let sessions = ureq_sessions(config.http_timeout);
    let mut ctx = ProvisionContext::new(config, sessions)?;
    let report = task_list().run(&mut ctx, &skip_set(&args.skip))?;
    log_report(&report);
    Ok(())
}

fn log_report(report: &RunReport) {
    if report.tolerated.is_empty() {
        tracing::info!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            "provisioning finished"
        );
    } else {
        tracing::warn!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            tolerated = %report.tolerated.join(", "),
            "provisioning finished with tolerated failures"
        );
    }
}

/// Print the step list after the same checks `run` performs.
pub fn plan(args: &PlanArgs) -> Result<()> {
    let tasks = task_list();
    let skipped = skip_set(&args.skip);
    tasks.validate(&skipped)?;
    let plan = tasks.plan(&skipped);
    if args.json {
        let text = serde_json::to_string_pretty(&plan).context("serialize plan")?;
        println!("{text}");
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

fn render_plan(plan: &[PlannedStep]) -> String {
    let mut out = String::new();
    for (index, step) in plan.iter().enumerate() {
        let policy = match step.policy {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Continue => "continue",
        };
        let marker = if step.skipped { " (skipped)" } else { "" };
        out.push_str(&format!(
            "{:>2}. {:<26} {:<8} {}{marker}\n",
            index + 1,
            step.name,
            policy,
            step.description
        ));
        if !step.requires.is_empty() {
            out.push_str(&format!("      requires: {}\n", step.requires.join(", ")));
        }
    }
    out
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
