//! Model bundle on disk.
//!
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use common::protocol::{ModelStatus, REQUIRED_FILES};

/// Directory holding the exported classifier (topology, metadata, weights).
#[derive(Clone, Debug)]
pub struct ModelBundle {
    dir: PathBuf,
}

impl ModelBundle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the bundle directory if it does not exist yet.
    ///
    /// Returns `true` if the directory was created.
    pub fn ensure_dir(&self) -> io::Result<bool> {
        if self.dir.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir)?;

        Ok(true)
    }

    /// Inspect the bundle directory.
    ///
    /// A missing directory or missing required files are not errors, they are
    /// reported in the returned status. Only failures to read an existing
    /// directory end up in `Err`.
    pub fn status(&self) -> io::Result<ModelStatus> {
        if !self.dir.exists() {
            return Ok(ModelStatus::folder_missing());
        }

        let mut files = fs::read_dir(&self.dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        files.sort();

        let missing: Vec<String> = REQUIRED_FILES
            .iter()
            .filter(|required| !files.iter().any(|file| file == *required))
            .map(|required| required.to_string())
            .collect();

        match missing.is_empty() {
            true => Ok(ModelStatus::ready(files)),
            false => Ok(ModelStatus::files_missing(files, missing)),
        }
    }

    /// Map a path relative to the bundle to an existing file.
    ///
    /// Anything but plain path segments (`..`, root, prefixes) is rejected so
    /// that requests cannot leave the bundle directory.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return None;
        }
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return None;
        }

        let path = self.dir.join(relative);
        path.is_file().then_some(path)
    }
}
