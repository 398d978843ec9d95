//! Values pushed into the services.
use std::fmt;

/// Username/password pair for one service account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The one administrative account a service is provisioned with.
///
/// Applying a `SingleAdmin` to a user or role registry removes every entry
/// already present and writes this account alone. Stacks provisioned by this
/// tool are single-tenant: any other account found in those registries is
/// discarded on every run.
#[derive(Debug, Clone)]
pub struct SingleAdmin {
    pub credential: Credential,
    pub role: String,
}

/// Access settings posted to the WPS server page.
///
/// Only the connection fields vary per deployment; the operational tuning
/// values are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub protocol: String,
    pub hostname: String,
    pub port: String,
    pub webapp_path: String,
}

/// Entity the WPS web console files server settings under.
pub const SERVER_SETTINGS_MODULE: &str = "org.n52.wps.webapp.entities.Server";

const FIXED_SERVER_SETTINGS: &[(&str, &str)] = &[
    ("computation_timeout", "5"),
    ("repo_reload_interval", "0.0"),
    ("data_inputs_in_response", "false"),
    ("cache_capabilites", "false"),
    ("response_url_filter_enabled", "false"),
    ("min_pool_size", "10"),
    ("max_pool_size", "20"),
    ("keep_alive_seconds", "1000"),
    ("max_queued_tasks", "100"),
    ("max_request_size", "128"),
    ("add_process_description_Link_to_process_summary", "true"),
];

impl ServerSettings {
    /// Form fields in the order the console expects them.
    ///
    /// Key spellings follow the console's form, typos included.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("protocol", self.protocol.clone()),
            ("hostname", self.hostname.clone()),
            ("hostport", self.port.clone()),
        ];
        let (timeout, rest) = FIXED_SERVER_SETTINGS.split_at(1);
        fields.extend(timeout.iter().map(|(key, value)| (*key, value.to_string())));
        fields.push(("weppapp_path", self.webapp_path.clone()));
        fields.extend(rest.iter().map(|(key, value)| (*key, value.to_string())));
        fields
    }
}
