//! Initialization helpers for `.coach/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::io::config::{CoachConfig, write_config};

/// Canonical paths within `.coach/` for a context root.
#[derive(Debug, Clone)]
pub struct CoachPaths {
    pub root: PathBuf,
    pub coach_dir: PathBuf,
    pub config_path: PathBuf,
    /// Shared [`FileStorage`](crate::io::storage::FileStorage) directory.
    pub storage_dir: PathBuf,
    pub gitignore_path: PathBuf,
}

impl CoachPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let coach_dir = root.join(".coach");
        Self {
            root,
            config_path: coach_dir.join("config.toml"),
            storage_dir: coach_dir.join("storage"),
            gitignore_path: coach_dir.join(".gitignore"),
            coach_dir,
        }
    }
}

/// Options for [`init_coach`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite the config and gitignore if `.coach/` already exists.
    /// Stored history is never touched.
    pub force: bool,
}

const COACH_GITIGNORE: &str = "storage/\n";

/// Create `.coach/` scaffolding in `root` with a default config.
///
/// Fails if `.coach/` already exists unless `options.force` is set.
pub fn init_coach(root: &Path, options: &InitOptions) -> Result<CoachPaths> {
    let paths = CoachPaths::new(root);
    if paths.coach_dir.exists() && !paths.coach_dir.is_dir() {
        return Err(anyhow!("coach init: .coach exists but is not a directory"));
    }
    if paths.coach_dir.exists() && !options.force {
        return Err(anyhow!(
            "coach init: .coach already exists (use --force to overwrite)"
        ));
    }

    create_dir(&paths.coach_dir)?;
    create_dir(&paths.storage_dir)?;
    fs::write(&paths.gitignore_path, COACH_GITIGNORE)
        .with_context(|| format!("write file {}", paths.gitignore_path.display()))?;
    write_config(&paths.config_path, &CoachConfig::default())?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}
