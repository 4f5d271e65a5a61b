//! Enumeration of deployable resources.
//!
//! A [`ResourceFinder`] yields resource names one at a time and can open the
//! resource it returned last. Finders are read-only: [`ResourceFinder::remove`]
//! always fails.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ProcessingError, ProcessingResult};

/// Iterates over named resources.
pub trait ResourceFinder: Iterator<Item = String> {
    /// Opens the resource most recently returned by [`Iterator::next`].
    fn open(&mut self) -> ProcessingResult<Box<dyn Read + Send>>;

    /// Restarts the enumeration from the first resource.
    fn reset(&mut self);

    /// Releases any resources held by the finder.
    fn close(&mut self) {}

    /// Removal is not supported by finders.
    fn remove(&mut self) -> ProcessingResult<()> {
        Err(ProcessingError::unsupported_operation("ResourceFinder::remove"))
    }
}

/// Finds files below a directory.
///
/// Names are paths relative to the root, separated by `/`, in lexical order.
///
/// # Example
///
/// ```no_run
/// use ariadne_core::{DirectoryResourceFinder, ResourceFinder};
///
/// let mut finder = DirectoryResourceFinder::new("resources").recursive(true).extension("toml");
/// while let Some(name) = finder.next() {
///     let _reader = finder.open().unwrap();
///     println!("found {name}");
/// }
/// ```
#[derive(Debug)]
pub struct DirectoryResourceFinder {
    root: PathBuf,
    recursive: bool,
    extension: Option<String>,
    entries: Option<Vec<(String, PathBuf)>>,
    position: usize,
    current: Option<PathBuf>,
}

impl DirectoryResourceFinder {
    /// Creates a finder listing the files directly inside `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            extension: None,
            entries: None,
            position: 0,
            current: None,
        }
    }

    /// Descends into subdirectories.
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Only yields files with the given extension (without the dot).
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan_entries(&self) -> Vec<(String, PathBuf)> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(root = %self.root.display(), error = %error, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(wanted) = &self.extension {
                if path.extension().and_then(|e| e.to_str()) != Some(wanted.as_str()) {
                    continue;
                }
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push((name, path.to_path_buf()));
        }

        debug!(root = %self.root.display(), found = entries.len(), "Scanned resources");
        entries
    }
}

impl Iterator for DirectoryResourceFinder {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.entries.is_none() {
            self.entries = Some(self.scan_entries());
        }
        let (name, path) = self.entries.as_ref()?.get(self.position)?.clone();
        self.position += 1;
        self.current = Some(path);
        Some(name)
    }
}

impl ResourceFinder for DirectoryResourceFinder {
    fn open(&mut self) -> ProcessingResult<Box<dyn Read + Send>> {
        let path = self
            .current
            .as_ref()
            .ok_or_else(|| ProcessingError::illegal_state("no current resource to open"))?;
        Ok(Box::new(File::open(path)?))
    }

    fn reset(&mut self) {
        self.entries = None;
        self.position = 0;
        self.current = None;
    }

    fn close(&mut self) {
        self.reset();
    }
}
