//! Shared test infrastructure for integration tests.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Steps that need live WPS or GeoServer endpoints.
pub const HTTP_STEPS: [&str; 3] = [
    "wps-password",
    "wps-server-settings",
    "geoserver-upload-styles",
];

/// A Tomcat tree with WPS and GeoServer deployed, plus a styles directory.
pub struct StackFixture {
    pub dir: TempDir,
}

impl StackFixture {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let fixture = Self { dir };
        fixture.write(
            "tomcat/conf/tomcat-users.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<tomcat-users xmlns="http://tomcat.apache.org/xml" version="1.0">
  <!-- placeholder account from the image -->
  <role rolename="manager-gui"/>
  <user username="tomcat" password="tomcat" roles="manager-gui"/>
  <user username="admin" password="admin" roles="manager-gui"/>
</tomcat-users>
"#,
        );
        fixture.write(
            "tomcat/conf/server.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Server port="8005" shutdown="SHUTDOWN">
  <Service name="Catalina">
    <Connector port="8080" protocol="HTTP/1.1" connectionTimeout="20000" redirectPort="8443"/>
    <Engine name="Catalina" defaultHost="localhost"/>
  </Service>
</Server>
"#,
        );
        for app in ["wps", "geoserver"] {
            fixture.write(&format!("tomcat/webapps/{app}/WEB-INF/web.xml"), "<web-app/>\n");
        }
        fixture.write(
            "tomcat/webapps/geoserver/data/security/usergroup/default/users.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<userRegistry xmlns="http://www.geoserver.org/security/users" version="1.0">
  <users>
    <user enabled="true" name="admin" password="crypt1:abc"/>
  </users>
  <groups/>
</userRegistry>
"#,
        );
        fixture.write(
            "tomcat/webapps/geoserver/data/security/role/default/roles.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<roleRegistry xmlns="http://www.geoserver.org/security/roles" version="1.0">
  <roleList>
    <role id="ADMIN"/>
  </roleList>
  <userList>
    <userRoles username="admin">
      <roleRef roleID="ADMIN"/>
    </userRoles>
  </userList>
  <groupList/>
</roleRegistry>
"#,
        );
        fixture.write(
            "styles/shake_map.sld",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<StyledLayerDescriptor version="1.1.0" xmlns="http://www.opengis.net/sld"/>
"#,
        );
        fixture.write(
            "styles/plain.sld",
            r#"<StyledLayerDescriptor xmlns="http://www.opengis.net/sld"/>
"#,
        );
        fixture
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("read fixture file")
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(&path, contents).expect("write fixture file");
    }

    /// Run `stack-init run` against this tree with the given extra arguments.
    pub fn run(&self, extra: &[&str]) -> Output {
        let mut command = stack_init();
        command
            .arg("run")
            .arg("--tomcat-base")
            .arg(self.path("tomcat"))
            .arg("--geoserver-base")
            .arg(self.path("tomcat/webapps/geoserver"))
            .arg("--styles-dir")
            .arg(self.path("styles"))
            .arg("--state-file")
            .arg(self.path("state/init_wps.json"))
            .env("RIESGOS_WPS_TOMCAT_USERNAME", "ops")
            .env("RIESGOS_WPS_TOMCAT_PASSWORD", "tomcat-secret")
            .env("RIESGOS_GEOSERVER_USERNAME", "maps")
            .env("RIESGOS_GEOSERVER_PASSWORD", "maps-secret")
            .args(extra);
        command.output().expect("run stack-init")
    }

    pub fn run_without_http(&self) -> Output {
        let mut args = Vec::new();
        for step in HTTP_STEPS {
            args.push("--skip");
            args.push(step);
        }
        self.run(&args)
    }
}

/// `stack-init` with the provisioning environment cleared.
pub fn stack_init() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_stack-init"));
    for (key, _) in std::env::vars_os() {
        let key = key.to_string_lossy().into_owned();
        if key.starts_with("RIESGOS_") || key.starts_with("STACK_INIT_") {
            command.env_remove(key);
        }
    }
    command.env("RUST_LOG", "info");
    command
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "stack-init failed: {}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
}
