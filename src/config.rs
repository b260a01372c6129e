use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default prefix for images managed by dockbox
pub const DEFAULT_NAMESPACE: &str = "dockbox";

/// Directory inside a project that holds its dockbox state
pub const PROJECT_DIR: &str = ".dockbox";

/// Per-project config file name inside `PROJECT_DIR`
pub const PROJECT_FILE: &str = ".dockbox.yaml";

/// Container engine CLI used to talk to the image store
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Docker (default)
    #[default]
    Docker,
    /// Podman
    Podman,
}

impl Runtime {
    /// Name of the executable to invoke.
    pub fn binary(&self) -> &'static str {
        match self {
            Runtime::Docker => "docker",
            Runtime::Podman => "podman",
        }
    }
}

/// Global configuration, read from ~/.config/dockbox/config.yaml
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Container runtime. Default: docker
    #[serde(default)]
    pub runtime: Option<Runtime>,

    /// Prefix that marks an image as a dockbox. Default: "dockbox"
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Config {
    /// Load the global configuration, falling back to defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        debug!("config:loading");
        let config = match Self::global_config_path() {
            Some(path) => Self::load_from_path(&path)?.unwrap_or_default(),
            None => Self::default(),
        };
        debug!(
            runtime = ?config.runtime(),
            namespace = config.namespace(),
            "config:loaded"
        );
        Ok(config)
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "config:reading file");
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config at {}: {}", path.display(), e))?;
        Ok(Some(config))
    }

    /// Locate the global config file (XDG convention, works cross-platform)
    fn global_config_path() -> Option<PathBuf> {
        let config_dir = home::home_dir()?.join(".config/dockbox");
        ["config.yaml", "config.yml"]
            .iter()
            .map(|name| config_dir.join(name))
            .find(|path| path.exists())
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Whether an image reference lives under the managed namespace.
    pub fn is_managed(&self, name: &str) -> bool {
        name.strip_prefix(self.namespace())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Short box name for a repo tag, e.g. `dockbox/api:latest` -> `api`.
    /// Tags outside the namespace are returned unchanged.
    pub fn display_name(&self, repo_tag: &str) -> String {
        if !self.is_managed(repo_tag) {
            return repo_tag.to_string();
        }
        let box_name = &repo_tag[self.namespace().len() + 1..];
        match box_name.split_once(':') {
            Some((name, _)) => name.to_string(),
            None => box_name.to_string(),
        }
    }

    /// Full image name for a box name.
    pub fn image_name(&self, box_name: &str) -> String {
        format!("{}/{}", self.namespace(), box_name)
    }
}

/// Per-project state written next to the project sources
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct ProjectConfig {
    /// Image the project's box was built as
    #[serde(default)]
    pub image: Option<String>,

    /// Container currently backing the box
    #[serde(default)]
    pub container: Option<String>,
}

impl ProjectConfig {
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(PROJECT_DIR).join(PROJECT_FILE)
    }

    fn load_file(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse project config at {}: {}", path.display(), e)
        })?;
        Ok(Some(config))
    }
}

/// Collect the image names of every project config found below `paths`.
///
/// Unreadable or malformed project files are skipped with a warning so one
/// broken checkout does not hide the rest.
pub fn find_project_images(paths: &[PathBuf]) -> BTreeSet<String> {
    let mut images = BTreeSet::new();
    for root in paths {
        let pattern = ProjectConfig::path_in(&root.join("**"))
            .to_string_lossy()
            .into_owned();
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "config:invalid project search pattern");
                continue;
            }
        };
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "config:unreadable path during project search");
                    continue;
                }
            };
            match ProjectConfig::load_file(&path) {
                Ok(Some(ProjectConfig {
                    image: Some(image), ..
                })) => {
                    debug!(path = %path.display(), image = %image, "config:found project");
                    images.insert(image);
                }
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "config:skipping project file"),
            }
        }
    }
    images
}
