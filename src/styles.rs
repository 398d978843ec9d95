//! Style installation and registration for GeoServer.
//!
//! Styles are SLD files dropped into a directory. Each one is copied into the
//! GeoServer data directory next to a catalog descriptor, and optionally
//! pushed through an operator-supplied upload script.
use crate::model::Credential;
use crate::xml::{Element, XmlDocument};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const STYLE_EXTENSION: &str = "sld";
pub const STYLE_FORMAT: &str = "sld";
pub const DEFAULT_STYLE_VERSION: &str = "1.0.0";

pub const URL_PLACEHOLDER: &str = "{{GEOSERVER_URL}}";
pub const USERNAME_PLACEHOLDER: &str = "{{GEOSERVER_USERNAME}}";
pub const PASSWORD_PLACEHOLDER: &str = "{{GEOSERVER_PASSWORD}}";

/// Catalog entry GeoServer reads for one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDescriptor {
    pub id: String,
    pub name: String,
    pub format: String,
    pub version: String,
    pub filename: String,
}

impl StyleDescriptor {
    /// Describe the style stored in `sld`, taking the version from the SLD root.
    pub fn for_sld(sld: &Path) -> Result<Self> {
        let file_name = sld
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("style path {} has no file name", sld.display()))?;
        let name = style_name(file_name);
        let version = style_version(sld)?;
        Ok(Self {
            id: name.clone(),
            filename: format!("{name}.{STYLE_EXTENSION}"),
            name,
            format: STYLE_FORMAT.to_string(),
            version,
        })
    }

    pub fn to_document(&self) -> XmlDocument {
        let root = Element::new("style")
            .with_child(Element::new("id").with_text(&self.id))
            .with_child(Element::new("name").with_text(&self.name))
            .with_child(Element::new("format").with_text(&self.format))
            .with_child(
                Element::new("languageVersion")
                    .with_child(Element::new("version").with_text(&self.version)),
            )
            .with_child(Element::new("filename").with_text(&self.filename));
        XmlDocument::with_declaration(root)
    }

    pub fn write(&self, target: &Path) -> Result<()> {
        let text = self
            .to_document()
            .render()
            .map_err(|message| anyhow!("render style descriptor {}: {message}", self.name))?;
        fs::write(target, text).with_context(|| format!("write {}", target.display()))
    }
}

/// Catalog name for a style file: the stem, with `_` replaced by `-`.
pub fn style_name(file_name: &str) -> String {
    let stem = file_name
        .strip_suffix(&format!(".{STYLE_EXTENSION}"))
        .unwrap_or(file_name);
    stem.replace('_', "-")
}

/// The SLD root's `version` attribute, or [`DEFAULT_STYLE_VERSION`].
pub fn style_version(sld: &Path) -> Result<String> {
    let document = crate::xml::load(sld).with_context(|| format!("read style {}", sld.display()))?;
    Ok(document
        .root()
        .attribute("version")
        .unwrap_or_else(|| DEFAULT_STYLE_VERSION.to_string()))
}

/// Style files in `dir`, sorted by file name. A missing directory has none.
pub fn discover_styles(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "styles directory missing; nothing to install");
        return Ok(Vec::new());
    }
    let mut styles = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        let is_style = path
            .extension()
            .is_some_and(|extension| extension == STYLE_EXTENSION);
        if path.is_file() && is_style {
            styles.push(path);
        }
    }
    styles.sort();
    Ok(styles)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledStyle {
    pub name: String,
    pub sld_path: PathBuf,
    pub descriptor_path: PathBuf,
}

/// Copy every style from `source_dir` into `styles_dir` with its descriptor.
pub fn install_styles(source_dir: &Path, styles_dir: &Path) -> Result<Vec<InstalledStyle>> {
    let sources = discover_styles(source_dir)?;
    let mut planned: Vec<(PathBuf, StyleDescriptor)> = Vec::with_capacity(sources.len());
    for source in sources {
        let descriptor = StyleDescriptor::for_sld(&source)?;
        if let Some((earlier, _)) = planned
            .iter()
            .find(|(_, existing)| existing.name == descriptor.name)
        {
            return Err(anyhow!(
                "styles {} and {} both install as {}",
                earlier.display(),
                source.display(),
                descriptor.name
            ));
        }
        planned.push((source, descriptor));
    }
    if !planned.is_empty() {
        fs::create_dir_all(styles_dir)
            .with_context(|| format!("create {}", styles_dir.display()))?;
    }
    let mut installed = Vec::with_capacity(planned.len());
    for (source, descriptor) in planned {
        let sld_path = styles_dir.join(&descriptor.filename);
        let descriptor_path = styles_dir.join(format!("{}.xml", descriptor.name));
        fs::copy(&source, &sld_path).with_context(|| {
            format!("copy {} to {}", source.display(), sld_path.display())
        })?;
        descriptor.write(&descriptor_path)?;
        tracing::info!(style = %descriptor.name, version = %descriptor.version, "style installed");
        installed.push(InstalledStyle {
            name: descriptor.name,
            sld_path,
            descriptor_path,
        });
    }
    Ok(installed)
}

/// Substitute the connection placeholders in an upload script template.
pub fn render_upload_script(template: &str, url: &str, credential: &Credential) -> String {
    template
        .replace(URL_PLACEHOLDER, url)
        .replace(USERNAME_PLACEHOLDER, &credential.username)
        .replace(PASSWORD_PLACEHOLDER, &credential.password)
}

/// Runs a rendered upload script once per style.
pub struct UploadScript {
    script: tempfile::NamedTempFile,
    shell: Vec<String>,
}

impl UploadScript {
    /// Render `template` into a private temporary file.
    pub fn prepare(
        template: &Path,
        shell: Vec<String>,
        url: &str,
        credential: &Credential,
    ) -> Result<Self> {
        if shell.is_empty() {
            return Err(anyhow!("upload shell command is empty"));
        }
        let text = fs::read_to_string(template)
            .with_context(|| format!("read upload script {}", template.display()))?;
        let rendered = render_upload_script(&text, url, credential);
        let mut script = tempfile::Builder::new()
            .prefix("style-upload-")
            .suffix(".sh")
            .tempfile()
            .context("create rendered upload script")?;
        script
            .write_all(rendered.as_bytes())
            .context("write rendered upload script")?;
        script.flush().context("flush rendered upload script")?;
        Ok(Self { script, shell })
    }

    pub fn run(&self, style: &InstalledStyle) -> Result<()> {
        let (program, args) = self
            .shell
            .split_first()
            .ok_or_else(|| anyhow!("upload shell command is empty"))?;
        let program = which::which(program)
            .with_context(|| format!("resolve upload shell {program}"))?;
        let output = Command::new(&program)
            .args(args)
            .arg(self.script.path())
            .arg(&style.name)
            .arg(&style.sld_path)
            .output()
            .with_context(|| format!("run upload script for style {}", style.name))?;
        tracing::debug!(
            style = %style.name,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "upload script finished"
        );
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "upload script for style {} failed with status {}: {}",
                style.name,
                output.status,
                stderr.trim()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLD_WITH_VERSION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StyledLayerDescriptor version="1.1.0" xmlns="http://www.opengis.net/sld" xmlns:se="http://www.opengis.net/se">
  <NamedLayer><se:Name>shakemap</se:Name></NamedLayer>
</StyledLayerDescriptor>
"#;

    const SLD_WITHOUT_VERSION: &str = r#"<StyledLayerDescriptor xmlns="http://www.opengis.net/sld"><NamedLayer/></StyledLayerDescriptor>"#;

    fn write_style(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write style");
        path
    }

    #[test]
    fn style_names_drop_extension_and_underscores() {
        assert_eq!(style_name("shake_map_intensity.sld"), "shake-map-intensity");
        assert_eq!(style_name("plain.sld"), "plain");
        assert_eq!(style_name("no_extension"), "no-extension");
    }

    #[test]
    fn descriptor_takes_version_from_the_sld_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sld = write_style(dir.path(), "shake_map.sld", SLD_WITH_VERSION);
        let descriptor = StyleDescriptor::for_sld(&sld).expect("descriptor");
        assert_eq!(
            descriptor,
            StyleDescriptor {
                id: "shake-map".to_string(),
                name: "shake-map".to_string(),
                format: "sld".to_string(),
                version: "1.1.0".to_string(),
                filename: "shake-map.sld".to_string(),
            }
        );
    }

    #[test]
    fn descriptor_version_defaults_when_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sld = write_style(dir.path(), "bare.sld", SLD_WITHOUT_VERSION);
        let descriptor = StyleDescriptor::for_sld(&sld).expect("descriptor");
        assert_eq!(descriptor.version, DEFAULT_STYLE_VERSION);
    }

    #[test]
    fn malformed_style_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sld = write_style(dir.path(), "broken.sld", "<StyledLayerDescriptor>");
        assert!(StyleDescriptor::for_sld(&sld).is_err());
    }

    #[test]
    fn descriptor_renders_catalog_layout() {
        let descriptor = StyleDescriptor {
            id: "s".to_string(),
            name: "s".to_string(),
            format: "sld".to_string(),
            version: "1.0.0".to_string(),
            filename: "s.sld".to_string(),
        };
        let text = descriptor.to_document().render().expect("render");
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<style><id>s</id><name>s</name><format>sld</format><languageVersion><version>1.0.0</version></languageVersion><filename>s.sld</filename></style>\n"
        );
    }

    #[test]
    fn install_copies_styles_and_writes_descriptors() {
        let source = tempfile::tempdir().expect("source");
        let target = tempfile::tempdir().expect("target");
        write_style(source.path(), "b_style.sld", SLD_WITHOUT_VERSION);
        write_style(source.path(), "a_style.sld", SLD_WITH_VERSION);
        write_style(source.path(), "notes.txt", "ignored");

        let styles_dir = target.path().join("data").join("styles");
        let installed = install_styles(source.path(), &styles_dir).expect("install");
        let names: Vec<&str> = installed.iter().map(|style| style.name.as_str()).collect();
        assert_eq!(names, vec!["a-style", "b-style"]);

        assert_eq!(
            fs::read_to_string(styles_dir.join("a-style.sld")).expect("copied sld"),
            SLD_WITH_VERSION
        );
        let descriptor = crate::xml::load(&styles_dir.join("b-style.xml")).expect("descriptor");
        let version = descriptor
            .find(&[
                crate::xml::Tag::plain("languageVersion"),
                crate::xml::Tag::plain("version"),
            ])
            .expect("version element");
        assert_eq!(version.text(), "1.0.0");
    }

    #[test]
    fn styles_sharing_a_catalog_name_are_rejected() {
        let source = tempfile::tempdir().expect("source");
        let target = tempfile::tempdir().expect("target");
        write_style(source.path(), "a_b.sld", SLD_WITH_VERSION);
        write_style(source.path(), "a-b.sld", SLD_WITHOUT_VERSION);

        let styles_dir = target.path().join("styles");
        let err = install_styles(source.path(), &styles_dir).expect_err("duplicate name");
        assert!(err.to_string().contains("both install as a-b"), "{err}");
        assert!(!styles_dir.exists());
    }

    #[test]
    fn missing_source_directory_installs_nothing() {
        let target = tempfile::tempdir().expect("target");
        let installed = install_styles(&target.path().join("absent"), target.path())
            .expect("install");
        assert!(installed.is_empty());
    }

    #[test]
    fn upload_template_placeholders_are_substituted() {
        let rendered = render_upload_script(
            "curl -u {{GEOSERVER_USERNAME}}:{{GEOSERVER_PASSWORD}} {{GEOSERVER_URL}}/rest/styles",
            "http://geoserver:8080/geoserver",
            &Credential::new("admin", "pw"),
        );
        assert_eq!(
            rendered,
            "curl -u admin:pw http://geoserver:8080/geoserver/rest/styles"
        );
    }

    #[test]
    fn upload_script_runs_once_per_style_with_arguments() {
        if which::which("sh").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("calls.log");
        let template = dir.path().join("upload.sh");
        fs::write(
            &template,
            format!(
                "echo \"{{{{GEOSERVER_USERNAME}}}} $1 $2\" >> '{}'\n",
                log.display()
            ),
        )
        .expect("write template");

        let script = UploadScript::prepare(
            &template,
            vec!["sh".to_string()],
            "http://geoserver",
            &Credential::new("admin", "pw"),
        )
        .expect("prepare");
        for name in ["one", "two"] {
            let style = InstalledStyle {
                name: name.to_string(),
                sld_path: dir.path().join(format!("{name}.sld")),
                descriptor_path: dir.path().join(format!("{name}.xml")),
            };
            script.run(&style).expect("run");
        }

        let calls = fs::read_to_string(&log).expect("read log");
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("admin one "));
        assert!(lines[1].ends_with("two.sld"));
    }

    #[test]
    fn failing_upload_script_is_an_error() {
        if which::which("sh").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("upload.sh");
        fs::write(&template, "echo nope >&2\nexit 3\n").expect("write template");
        let script = UploadScript::prepare(
            &template,
            vec!["sh".to_string()],
            "http://geoserver",
            &Credential::new("admin", "pw"),
        )
        .expect("prepare");
        let style = InstalledStyle {
            name: "s".to_string(),
            sld_path: dir.path().join("s.sld"),
            descriptor_path: dir.path().join("s.xml"),
        };
        let err = script.run(&style).expect_err("exit 3");
        assert!(err.to_string().contains("nope"));
    }
}
