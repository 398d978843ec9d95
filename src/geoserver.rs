//! File-level security configuration of GeoServer's data directory.
use crate::http::join_url;
use crate::model::SingleAdmin;
use crate::xml::{self, Element, Tag, XmlError};
use std::path::{Path, PathBuf};

pub const USERS_NS: &str = "http://www.geoserver.org/security/users";
pub const ROLES_NS: &str = "http://www.geoserver.org/security/roles";

/// Protected endpoint used to check that the admin credentials are live.
pub const CREDENTIAL_PROBE_PATH: &str = "rest/about/version.json";

pub struct GeoServer {
    base: PathBuf,
}

impl GeoServer {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir()
            .join("security")
            .join("usergroup")
            .join("default")
            .join("users.xml")
    }

    pub fn roles_file(&self) -> PathBuf {
        self.data_dir()
            .join("security")
            .join("role")
            .join("default")
            .join("roles.xml")
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.data_dir().join("styles")
    }

    /// Make `admin` the only user of the default user group service.
    pub fn set_admin_user(&self, admin: &SingleAdmin) -> Result<usize, XmlError> {
        let password = format!("plain:{}", admin.credential.password);
        let user = Element::new("user")
            .with_attribute("enabled", "true")
            .with_attribute("name", &admin.credential.username)
            .with_attribute("password", &password);
        xml::replace_children(
            &self.users_file(),
            &[Tag::ns(USERS_NS, "users")],
            Tag::ns(USERS_NS, "user"),
            vec![user],
        )
    }

    /// Make `admin`'s role the only user/role assignment.
    pub fn set_admin_role(&self, admin: &SingleAdmin) -> Result<usize, XmlError> {
        let user_roles = Element::new("userRoles")
            .with_attribute("username", &admin.credential.username)
            .with_child(Element::new("roleRef").with_attribute("roleID", &admin.role));
        xml::replace_children(
            &self.roles_file(),
            &[Tag::ns(ROLES_NS, "userList")],
            Tag::ns(ROLES_NS, "userRoles"),
            vec![user_roles],
        )
    }
}

pub fn credential_probe_url(base_url: &str) -> String {
    join_url(base_url, CREDENTIAL_PROBE_PATH)
}
