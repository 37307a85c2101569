use crate::archive::ArchiveFormat;
use crate::error::{ProvisionError, Result};
use crate::platform::PlatformId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_NAME: &str = "Mupen64Plus";
const DEFAULT_VERSION: &str = "2.6.0";
const DEFAULT_BASE_URL: &str =
    "https://github.com/mupen64plus/mupen64plus-core/releases/download/{version}";
const DEFAULT_PACKAGE: &str = "mupen64plus";

/// The application being provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallTarget {
    pub name: String,
    pub version: String,
    /// May reference `{version}`.
    pub base_url: String,
    /// Substring used to spot a running instance.
    pub process_name: String,
    /// Name handed to the native package manager.
    pub package_name: String,
    #[serde(default)]
    pub artifacts: Artifacts,
}

/// Archive downloads per platform family. All Linux platforms share `linux`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default)]
    pub windows: Option<ArtifactSpec>,
    #[serde(default)]
    pub macos: Option<ArtifactSpec>,
    #[serde(default)]
    pub linux: Option<ArtifactSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// URL template; accepts `{version}` and `{base_url}`.
    pub url: String,
    pub dest_dir: PathBuf,
    /// Inferred from the URL when absent.
    #[serde(default)]
    pub format: Option<ArchiveFormat>,
    pub launch_hint: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// An [`ArtifactSpec`] with its templates expanded and format settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub url: String,
    pub dest_dir: PathBuf,
    pub format: ArchiveFormat,
    pub launch_hint: String,
    pub sha256: Option<String>,
}

impl Default for InstallTarget {
    fn default() -> Self {
        Self::mupen64plus()
    }
}

impl InstallTarget {
    pub fn mupen64plus() -> Self {
        let artifact = |file: &str, dest: &str, hint: &str| ArtifactSpec {
            url: format!("{{base_url}}/{file}"),
            dest_dir: PathBuf::from(dest),
            format: None,
            launch_hint: hint.to_string(),
            sha256: None,
        };

        Self {
            name: DEFAULT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            process_name: DEFAULT_PACKAGE.to_string(),
            package_name: DEFAULT_PACKAGE.to_string(),
            artifacts: Artifacts {
                windows: Some(artifact(
                    "mupen64plus-bundle-win64-{version}.zip",
                    "C:/Mupen64Plus",
                    "mupen64plus-ui-console.exe",
                )),
                macos: Some(artifact(
                    "mupen64plus-bundle-osx-{version}.zip",
                    "/Applications/Mupen64Plus",
                    "mupen64plus",
                )),
                linux: Some(artifact(
                    "mupen64plus-bundle-linux64-{version}.tar.gz",
                    "/usr/local/mupen64plus",
                    "bin/mupen64plus",
                )),
            },
        }
    }

    /// Archive artifact for `platform`, if it has one.
    pub fn artifact_for(&self, platform: PlatformId) -> Option<&ArtifactSpec> {
        match platform {
            PlatformId::Windows => self.artifacts.windows.as_ref(),
            PlatformId::MacOS => self.artifacts.macos.as_ref(),
            PlatformId::DebianLike | PlatformId::ArchLike | PlatformId::ChromeOSLike => {
                self.artifacts.linux.as_ref()
            }
            PlatformId::UnknownLinux | PlatformId::Unsupported => None,
        }
    }

    pub fn resolve_artifact(&self, platform: PlatformId) -> Result<ResolvedArtifact> {
        let spec = self
            .artifact_for(platform)
            .ok_or_else(|| ProvisionError::MissingArtifact {
                target: self.name.clone(),
                platform: platform.to_string(),
            })?;

        let url = self.expand(&spec.url)?;
        let format = match spec.format {
            Some(format) => format,
            None => ArchiveFormat::from_file_name(&url)?,
        };

        Ok(ResolvedArtifact {
            url,
            dest_dir: spec.dest_dir.clone(),
            format,
            launch_hint: spec.launch_hint.clone(),
            sha256: spec.sha256.clone(),
        })
    }

    pub fn resolved_base_url(&self) -> Result<String> {
        render(&self.base_url, &[("version", &self.version)])
    }

    /// Expand `{version}` and `{base_url}` in a URL template.
    pub fn expand(&self, template: &str) -> Result<String> {
        let base_url = self.resolved_base_url()?;
        render(
            template,
            &[("version", &self.version), ("base_url", &base_url)],
        )
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("target.name", &self.name),
            ("target.version", &self.version),
            ("target.process_name", &self.process_name),
            ("target.package_name", &self.package_name),
        ] {
            if value.trim().is_empty() {
                return Err(ProvisionError::InvalidConfig(format!("{field} must not be empty")));
            }
        }

        self.resolved_base_url()?;
        for spec in [
            &self.artifacts.windows,
            &self.artifacts.macos,
            &self.artifacts.linux,
        ]
        .into_iter()
        .flatten()
        {
            self.expand(&spec.url)?;
            if spec.launch_hint.trim().is_empty() {
                return Err(ProvisionError::InvalidConfig(format!(
                    "artifact {} has an empty launch_hint",
                    spec.url
                )));
            }
        }
        Ok(())
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ProvisionError::InvalidConfig(format!("unterminated placeholder in '{template}'"))
        })?;
        let key = &after[..end];
        let value = vars
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
            .ok_or_else(|| {
                ProvisionError::InvalidConfig(format!(
                    "unknown placeholder '{{{key}}}' in '{template}'"
                ))
            })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn default_linux_artifact_expands_templates() {
        let target = InstallTarget::mupen64plus();
        let artifact = target.resolve_artifact(PlatformId::DebianLike).unwrap();
        assert_eq!(
            artifact.url,
            "https://github.com/mupen64plus/mupen64plus-core/releases/download/2.6.0/\
             mupen64plus-bundle-linux64-2.6.0.tar.gz"
        );
        assert_eq!(artifact.format, ArchiveFormat::TarGz);
        assert_eq!(artifact.dest_dir, Path::new("/usr/local/mupen64plus"));
        assert_eq!(artifact.launch_hint, "bin/mupen64plus");
    }

    #[test]
    fn windows_and_macos_use_zip_bundles() {
        let target = InstallTarget::mupen64plus();
        let win = target.resolve_artifact(PlatformId::Windows).unwrap();
        assert!(win.url.ends_with("mupen64plus-bundle-win64-2.6.0.zip"));
        assert_eq!(win.format, ArchiveFormat::Zip);

        let mac = target.resolve_artifact(PlatformId::MacOS).unwrap();
        assert_eq!(mac.dest_dir, Path::new("/Applications/Mupen64Plus"));
    }

    #[test]
    fn every_platform_has_defined_artifact_lookup() {
        let target = InstallTarget::mupen64plus();
        for platform in PlatformId::ALL {
            let expected = !matches!(platform, PlatformId::UnknownLinux | PlatformId::Unsupported);
            assert_eq!(target.artifact_for(platform).is_some(), expected, "{platform}");
        }
    }

    #[test]
    fn missing_artifact_is_reported() {
        let mut target = InstallTarget::mupen64plus();
        target.artifacts.macos = None;
        match target.resolve_artifact(PlatformId::MacOS) {
            Err(ProvisionError::MissingArtifact { platform, .. }) => assert_eq!(platform, "macOS"),
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
    }

    #[test]
    fn explicit_format_overrides_url() {
        let mut target = InstallTarget::mupen64plus();
        if let Some(linux) = target.artifacts.linux.as_mut() {
            linux.url = "https://mirror.example/latest".to_string();
            linux.format = Some(ArchiveFormat::TarGz);
        }
        let artifact = target.resolve_artifact(PlatformId::ArchLike).unwrap();
        assert_eq!(artifact.format, ArchiveFormat::TarGz);
    }

    #[test]
    fn unknown_extension_without_format_is_unsupported() {
        let mut target = InstallTarget::mupen64plus();
        if let Some(linux) = target.artifacts.linux.as_mut() {
            linux.url = "{base_url}/bundle.rar".to_string();
        }
        assert!(matches!(
            target.resolve_artifact(PlatformId::ArchLike),
            Err(ProvisionError::Install(_))
        ));
    }

    #[test]
    fn validate_rejects_unknown_placeholder_and_empty_fields() {
        let mut target = InstallTarget::mupen64plus();
        assert!(target.validate().is_ok());

        target.base_url = "https://example.com/{release}".to_string();
        assert!(matches!(target.validate(), Err(ProvisionError::InvalidConfig(_))));

        let mut target = InstallTarget::mupen64plus();
        target.process_name = " ".to_string();
        assert!(matches!(target.validate(), Err(ProvisionError::InvalidConfig(_))));
    }

    #[test]
    fn render_handles_unterminated_placeholder() {
        assert!(render("https://x/{version", &[("version", "1")]).is_err());
        assert_eq!(render("plain", &[]).unwrap(), "plain");
    }
}
