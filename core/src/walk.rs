//! Recursive image file enumeration.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{MatchError, Result};

/// Extensions recognized as images when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg"];

/// Lazily enumerates image files below a set of root directories.
///
/// Roots are validated once, when the walker is built, so a bad root fails
/// before any file is produced. Each call to [`walk`](TreeWalker::walk)
/// starts a fresh traversal. Entries are visited in file-name order within
/// each directory, which keeps first-found tie-breaks reproducible.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl TreeWalker {
    /// Builds a walker over `roots` accepting the default extensions.
    pub fn new<I, P>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_extensions(roots, DEFAULT_EXTENSIONS.iter().copied())
    }

    /// Builds a walker with an explicit extension allow-list.
    ///
    /// Extensions are compared case-insensitively; a leading dot is ignored.
    pub fn with_extensions<I, P, E, S>(roots: I, extensions: E) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();
        if let Some(bad) = roots.iter().find(|root| !root.is_dir()) {
            return Err(MatchError::InvalidRoot(bad.clone()));
        }

        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self { roots, extensions })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns `true` if `path` has one of the accepted extensions.
    pub fn is_image_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    /// Starts a new traversal over every root, in the order given.
    pub fn walk(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.roots.iter().flat_map(move |root| {
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!(error = %err, "Skipping unreadable entry");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .filter(move |path| self.is_image_path(path))
        })
    }
}

/// Image directories directly below an Android `res` directory, in
/// file-name order.
///
/// A directory qualifies when its name ends with `drawable` or contains
/// `mipmap`. Qualified drawables such as `drawable-hdpi` do not, while every
/// `mipmap-*` density does.
///
/// # Examples
///
/// ```no_run
/// use skinmatch_core::{TreeWalker, resource_roots};
///
/// let roots = resource_roots("app/src/main/res").unwrap();
/// let queries = TreeWalker::new(roots).unwrap();
/// # let _ = queries;
/// ```
pub fn resource_roots(res_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let res_dir = res_dir.as_ref();
    if !res_dir.is_dir() {
        return Err(MatchError::InvalidRoot(res_dir.to_path_buf()));
    }

    let roots = WalkDir::new(res_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| is_resource_dir_name(&entry.file_name().to_string_lossy()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    Ok(roots)
}

fn is_resource_dir_name(name: &str) -> bool {
    name.ends_with("drawable") || name.contains("mipmap")
}
