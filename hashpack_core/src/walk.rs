//! Filesystem walking.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A regular file found under a walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Location on disk.
    pub path: PathBuf,
    /// Path relative to the walked root, `/`-separated.
    pub relative: String,
}

/// Collect every regular file under `root`, sorted by relative path.
///
/// Directories are descended, nothing is filtered out (hidden files and
/// ignore files are treated like any other file). Symlinks, devices, FIFOs
/// and sockets are rejected instead of skipped or followed.
pub fn walk_files(root: &Path) -> Result<Vec<SourceFile>> {
    let metadata = match fs::symlink_metadata(root) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Path does not exist: {}", root.display()),
                ),
            });
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_dir() {
        return Err(Error::invalid_path(root, "not a directory"));
    }

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        let entry_path = entry.path();

        let Some(file_type) = entry.file_type() else {
            return Err(Error::unsupported_file_type(entry_path));
        };

        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            return Err(Error::unsupported_file_type(entry_path));
        }

        let relative = relative_path(root, entry_path)?;
        files.push(SourceFile {
            path: entry_path.to_path_buf(),
            relative,
        });
    }

    // Byte-wise file name order within a directory is not the same as
    // ordering by the joined path ("a/b" vs "a-b"), so sort once more.
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Express `path` relative to `root` with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let stripped = path
        .strip_prefix(root)
        .map_err(|_| Error::invalid_path(path, format!("not under {}", root.display())))?;

    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| Error::invalid_path(path, "file name is not valid UTF-8"))?;
                parts.push(part);
            }
            _ => return Err(Error::invalid_path(path, "unexpected path component")),
        }
    }

    if parts.is_empty() {
        return Err(Error::invalid_path(path, "path is the walked root itself"));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_walk_nested() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/b.txt"), b"b").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), b"c").unwrap();
        fs::write(root.join(".hidden"), b"h").unwrap();

        let files = walk_files(root).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(
            relative,
            vec![".hidden", "a.txt", "sub/b.txt", "sub/deeper/c.txt"]
        );
        assert_eq!(files[1].path, root.join("a.txt"));
    }

    #[test]
    fn test_walk_does_not_apply_ignore_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), b"*.png\n").unwrap();
        fs::write(root.join("logo.png"), b"png").unwrap();

        let files = walk_files(root).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("empty")).unwrap();
        assert!(walk_files(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_walk_nonexistent_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = walk_files(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_walk_root_is_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            walk_files(&file),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_walk_rejects_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("target.txt"), b"t").unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();

        let result = walk_files(root);
        assert!(matches!(result, Err(Error::UnsupportedFileType { .. })));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/srv/res");
        assert_eq!(
            relative_path(root, Path::new("/srv/res/img/logo.png")).unwrap(),
            "img/logo.png"
        );
        assert!(relative_path(root, Path::new("/srv/other/x")).is_err());
        assert!(relative_path(root, root).is_err());
    }
}
