//! A WPS console stand-in: Spring-style form login, per-session CSRF tokens
//! and a mutable admin password.
use crate::http::{HttpResponse, HttpTransport, SessionError};
use crate::model::Credential;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub(crate) const BASE_URL: &str = "http://wps.test/wps";

#[derive(Debug, Default)]
pub(crate) struct FakeWpsState {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) ready_after: u32,
    pub(crate) probes: u32,
    pub(crate) logins: Vec<(String, String)>,
    pub(crate) password_changes: u32,
    pub(crate) settings_posts: Vec<(String, Vec<(String, String)>)>,
    tokens_issued: u32,
}

#[derive(Clone)]
pub(crate) struct FakeWps {
    state: Rc<RefCell<FakeWpsState>>,
}

impl FakeWps {
    pub(crate) fn new(password: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeWpsState {
                username: "wps".to_string(),
                password: password.to_string(),
                ..FakeWpsState::default()
            })),
        }
    }

    /// Answer the first `probes` base-URL requests with 503.
    pub(crate) fn unavailable_for(self, probes: u32) -> Self {
        self.state.borrow_mut().ready_after = probes;
        self
    }

    pub(crate) fn state(&self) -> std::cell::Ref<'_, FakeWpsState> {
        self.state.borrow()
    }

    pub(crate) fn session(&self) -> FakeWpsSession {
        FakeWpsSession {
            state: Rc::clone(&self.state),
            logged_in: Cell::new(false),
            token: RefCell::new(None),
        }
    }
}

pub(crate) struct FakeWpsSession {
    state: Rc<RefCell<FakeWpsState>>,
    logged_in: Cell<bool>,
    token: RefCell<Option<String>>,
}

impl FakeWpsSession {
    fn page(&self, url: &str) -> HttpResponse {
        let mut state = self.state.borrow_mut();
        state.tokens_issued += 1;
        let token = format!("token-{}", state.tokens_issued);
        *self.token.borrow_mut() = Some(token.clone());
        HttpResponse {
            status: 200,
            url: url.to_string(),
            body: format!(
                "<html><form method=\"post\">\n<input type=\"hidden\" name=\"_csrf\" value=\"{token}\"/>\n</form></html>"
            ),
        }
    }

    fn consume_token(&self, presented: Option<&str>) -> bool {
        let expected = self.token.borrow_mut().take();
        expected.is_some() && expected.as_deref() == presented
    }

    fn path(url: &str) -> &str {
        url.strip_prefix(BASE_URL).unwrap_or(url)
    }
}

fn response(status: u16, url: &str) -> Result<HttpResponse, SessionError> {
    Ok(HttpResponse {
        status,
        url: url.to_string(),
        body: String::new(),
    })
}

impl HttpTransport for FakeWpsSession {
    fn get(&self, url: &str, _auth: Option<&Credential>) -> Result<HttpResponse, SessionError> {
        {
            let mut state = self.state.borrow_mut();
            if state.probes < state.ready_after {
                state.probes += 1;
                return response(503, url);
            }
        }
        match Self::path(url) {
            "" | "/" => response(200, url),
            "/login" => Ok(self.page(url)),
            "/change_password" | "/server" if self.logged_in.get() => Ok(self.page(url)),
            // Spring redirects anonymous requests to the login form.
            "/change_password" | "/server" => Ok(self.page(&format!("{BASE_URL}/login"))),
            _ => response(404, url),
        }
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, SessionError> {
        let fields: BTreeMap<&str, &str> = fields.iter().copied().collect();
        if !self.consume_token(fields.get("_csrf").copied()) {
            return response(403, url);
        }
        let mut state = self.state.borrow_mut();
        match Self::path(url) {
            "/j_spring_security_check" => {
                let username = fields.get("username").copied().unwrap_or_default();
                let password = fields.get("password").copied().unwrap_or_default();
                state
                    .logins
                    .push((username.to_string(), password.to_string()));
                if username == state.username && password == state.password {
                    self.logged_in.set(true);
                    response(200, &format!("{BASE_URL}/"))
                } else {
                    response(200, &format!("{BASE_URL}/login?error"))
                }
            }
            "/change_password" if self.logged_in.get() => {
                if fields.get("currentPassword").copied() != Some(state.password.as_str()) {
                    return response(400, url);
                }
                state.password = fields
                    .get("newPassword")
                    .copied()
                    .unwrap_or_default()
                    .to_string();
                state.password_changes += 1;
                response(200, url)
            }
            _ => response(403, url),
        }
    }

    fn post_body(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, SessionError> {
        let header = headers
            .iter()
            .find(|(name, _)| *name == "X-CSRF-TOKEN")
            .map(|(_, value)| *value);
        if !self.consume_token(header) || !self.logged_in.get() || Self::path(url) != "/server" {
            return response(403, url);
        }
        let content_type = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.to_string())
            .unwrap_or_default();
        let pairs = url::form_urlencoded::parse(body.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        self.state
            .borrow_mut()
            .settings_posts
            .push((content_type, pairs));
        response(200, url)
    }
}
