//! Client for the WPS web console.
//!
//! The console only offers browser forms behind Spring Security, so every
//! operation is a page fetch (for a fresh CSRF token) followed by a form
//! submission in the same cookie session. A token is used for exactly the
//! submission that follows the page it was read from.
use crate::http::csrf::{extract_csrf, CSRF_FIELD, CSRF_HEADER, CSRF_MARKER};
use crate::http::{ensure_success, join_url, HttpTransport, SessionError};
use crate::model::{ServerSettings, SERVER_SETTINGS_MODULE};
use url::form_urlencoded;
use url::Url;

pub const FACTORY_USERNAME: &str = "wps";
pub const FACTORY_PASSWORD: &str = "wps";

const LOGIN_PAGE: &str = "login";
const LOGIN_ENDPOINT: &str = "j_spring_security_check";
const CHANGE_PASSWORD_PAGE: &str = "change_password";
const SERVER_PAGE: &str = "server";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

pub struct WpsConsole {
    base_url: String,
    transport: Box<dyn HttpTransport>,
    logged_in_as: Option<String>,
}

impl WpsConsole {
    pub fn new(base_url: &str, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.to_string(),
            transport,
            logged_in_as: None,
        }
    }

    #[cfg(test)]
    pub fn logged_in_as(&self) -> Option<&str> {
        self.logged_in_as.as_deref()
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let token = self.fetch_form_token(LOGIN_PAGE)?;
        let url = join_url(&self.base_url, LOGIN_ENDPOINT);
        let response = self.transport.post_form(
            &url,
            &[
                ("username", username),
                ("password", password),
                (CSRF_FIELD, token.as_str()),
            ],
        )?;
        // A failed form login is redirected back to the login page.
        if matches!(response.status, 401 | 403) || is_login_page(&response.url) {
            return Err(SessionError::LoginRejected {
                username: username.to_string(),
            });
        }
        ensure_success(response)?;
        tracing::debug!(username, "logged in to WPS console");
        self.logged_in_as = Some(username.to_string());
        Ok(())
    }

    pub fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        self.require_login("change password")?;
        let token = self.fetch_form_token(CHANGE_PASSWORD_PAGE)?;
        let url = join_url(&self.base_url, CHANGE_PASSWORD_PAGE);
        let response = self.transport.post_form(
            &url,
            &[
                ("currentPassword", old_password),
                ("newPassword", new_password),
                (CSRF_FIELD, token.as_str()),
            ],
        )?;
        ensure_success(response)?;
        Ok(())
    }

    pub fn post_settings(&mut self, settings: &ServerSettings) -> Result<(), SessionError> {
        self.require_login("post server settings")?;
        let token = self.fetch_form_token(SERVER_PAGE)?;
        let url = join_url(&self.base_url, SERVER_PAGE);
        let body = settings_payload(&settings.fields());
        let response = self.transport.post_body(
            &url,
            &body,
            &[("Content-Type", FORM_CONTENT_TYPE), (CSRF_HEADER, token.as_str())],
        )?;
        ensure_success(response)?;
        Ok(())
    }

    fn require_login(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.logged_in_as.is_none() {
            return Err(SessionError::NotAuthenticated { operation });
        }
        Ok(())
    }

    fn fetch_form_token(&self, page: &str) -> Result<String, SessionError> {
        let url = join_url(&self.base_url, page);
        let response = ensure_success(self.transport.get(&url, None)?)?;
        extract_csrf(&response.body).ok_or_else(|| SessionError::CsrfMarkerMissing {
            url,
            marker: CSRF_MARKER.to_string(),
        })
    }
}

/// Encode settings as repeated `value`/`key`/`module` triplets, one per field,
/// keeping field order.
pub fn settings_payload(fields: &[(&str, String)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair("value", value);
        serializer.append_pair("key", key);
        serializer.append_pair("module", SERVER_SETTINGS_MODULE);
    }
    serializer.finish()
}

fn is_login_page(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.path().trim_end_matches('/').ends_with("/login"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The recorded password worked and was replaced by the desired one.
    Changed,
    /// The recorded password is already the desired one and logging in with it works.
    Unchanged,
    /// The recorded password was rejected but the desired one works: an
    /// earlier run rotated without recording it.
    AlreadyRotated,
}

/// Move the console from whatever password it currently has to `desired`.
///
/// `recorded` is the last password this tool is known to have applied (or the
/// factory default). `open` must return a console on a fresh session.
pub fn rotate_password<F>(
    open: F,
    username: &str,
    recorded: &str,
    desired: &str,
) -> Result<RotationOutcome, SessionError>
where
    F: Fn() -> WpsConsole,
{
    let mut console = open();
    match console.login(username, recorded) {
        Ok(()) if recorded == desired => Ok(RotationOutcome::Unchanged),
        Ok(()) => {
            console.change_password(recorded, desired)?;
            Ok(RotationOutcome::Changed)
        }
        Err(SessionError::LoginRejected { .. }) if recorded != desired => {
            tracing::warn!(username, "recorded WPS password rejected; trying the desired one");
            let mut retry = open();
            retry.login(username, desired)?;
            Ok(RotationOutcome::AlreadyRotated)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
pub(crate) mod fake;
