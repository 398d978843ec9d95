//! File-level configuration of the Tomcat runtime hosting WPS and GeoServer.
use crate::model::SingleAdmin;
use crate::xml::{self, Element, Tag, XmlError};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const TOMCAT_USERS_NS: &str = "http://tomcat.apache.org/xml";

const CONNECTOR_PATH: [Tag; 2] = [Tag::plain("Service"), Tag::plain("Connector")];
const USER_TAG: Tag = Tag::ns(TOMCAT_USERS_NS, "user");

pub struct Tomcat {
    base: PathBuf,
}

impl Tomcat {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
        }
    }

    pub fn users_file(&self) -> PathBuf {
        self.base.join("conf").join("tomcat-users.xml")
    }

    pub fn server_file(&self) -> PathBuf {
        self.base.join("conf").join("server.xml")
    }

    pub fn web_descriptor(&self, app: &str) -> PathBuf {
        self.base
            .join("webapps")
            .join(app)
            .join("WEB-INF")
            .join("web.xml")
    }

    /// Make `admin` the only manager user. Returns how many users were replaced.
    pub fn set_admin_user(&self, admin: &SingleAdmin) -> Result<usize, XmlError> {
        let user = Element::new("user")
            .with_attribute("username", &admin.credential.username)
            .with_attribute("password", &admin.credential.password)
            .with_attribute("roles", &admin.role);
        xml::replace_children(&self.users_file(), &[], USER_TAG, vec![user])
    }

    /// Set `connectionTimeout` (milliseconds) on the first connector of the first service.
    pub fn set_connection_timeout(&self, timeout_ms: &str) -> Result<(), XmlError> {
        xml::set_attribute(
            &self.server_file(),
            &CONNECTOR_PATH,
            "connectionTimeout",
            timeout_ms,
        )
    }

    /// Bump the web descriptor's mtime so Tomcat redeploys the application.
    pub fn reload_app(&self, app: &str) -> Result<PathBuf> {
        let path = self.web_descriptor(app);
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.set_modified(SystemTime::now())
            .with_context(|| format!("touch {}", path.display()))?;
        Ok(path)
    }
}
