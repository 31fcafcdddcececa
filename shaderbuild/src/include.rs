//! Forced include resolution across prioritized search directories

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Trait for locating the contents of a forced include.
pub trait IncludeHandler {
    /// Opens an include file and returns its contents.
    ///
    /// # Arguments
    /// * `name` - The include name, as given on the command line
    ///
    /// # Returns
    /// The file contents, or [`Error::IncludeNotFound`] if no source has it.
    fn open(&self, name: &str) -> Result<Vec<u8>>;
}

/// File system include handler that searches directories in priority order.
///
/// The first directory containing the file wins; contents are never merged
/// across directories.
///
/// # Example
/// ```no_run
/// use shaderbuild::{FileSystemInclude, IncludeHandler};
///
/// let include = FileSystemInclude::new()
///     .with_path("shaders/materials")
///     .with_path("engine/shaders");
/// let globals = include.open("Globals.hlsli").unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileSystemInclude {
    search_paths: Vec<PathBuf>,
}

impl FileSystemInclude {
    /// Creates a new file system include handler with no search paths.
    pub fn new() -> Self {
        FileSystemInclude {
            search_paths: Vec::new(),
        }
    }

    /// Creates a handler searching `paths` in the given order.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        FileSystemInclude {
            search_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a search path (builder pattern).
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Adds a search path.
    pub fn add_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.search_paths.push(path.into());
    }

    /// Returns the search paths.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Returns the path of the first existing match for `name`.
    ///
    /// A name that is itself an existing file path (e.g. `--include
    /// shaders/Globals.hlsli`) is used directly before the search paths are
    /// consulted.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.components().count() > 1 && direct.is_file() {
            return Some(direct.to_path_buf());
        }

        let file_name = direct.file_name()?;
        self.search_paths
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|path| path.is_file())
    }
}

impl IncludeHandler for FileSystemInclude {
    fn open(&self, name: &str) -> Result<Vec<u8>> {
        match self.locate(name) {
            Some(path) => {
                log::debug!("Resolved include {} -> {}", name, path.display());
                std::fs::read(&path).map_err(Into::into)
            }
            None => Err(Error::IncludeNotFound {
                name: name.to_string(),
                searched: self.search_paths.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_priority() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("Globals.hlsli"), "// from a\n").unwrap();
        std::fs::write(b.path().join("Globals.hlsli"), "// from b\n").unwrap();

        let include = FileSystemInclude::from_paths([a.path(), b.path()]);
        assert_eq!(include.open("Globals.hlsli").unwrap(), b"// from a\n");

        let reversed = FileSystemInclude::new().with_path(b.path()).with_path(a.path());
        assert_eq!(reversed.open("Globals.hlsli").unwrap(), b"// from b\n");
    }

    #[test]
    fn test_falls_through_missing_directories() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(b.path().join("Common.hlsli"), "#define COMMON 1\n").unwrap();

        let include = FileSystemInclude::new()
            .with_path(a.path().join("does-not-exist"))
            .with_path(a.path())
            .with_path(b.path());
        assert_eq!(include.locate("Common.hlsli"), Some(b.path().join("Common.hlsli")));
    }

    #[test]
    fn test_not_found_lists_searched_dirs() {
        let a = tempfile::tempdir().unwrap();
        let include = FileSystemInclude::from_paths([a.path()]);
        match include.open("Missing.hlsli") {
            Err(Error::IncludeNotFound { name, searched }) => {
                assert_eq!(name, "Missing.hlsli");
                assert_eq!(searched, vec![a.path().to_path_buf()]);
            }
            other => panic!("expected IncludeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Shared.hlsli");
        std::fs::write(&path, "#define SHARED 1\n").unwrap();

        let include = FileSystemInclude::new();
        assert_eq!(include.locate(path.to_str().unwrap()), Some(path));
    }
}
