//! Mirroring a store onto a remote host over one stateful session.
//!
//! Every file is uploaded by walking down to its directory (creating missing
//! directories on the way), storing it, and climbing back up the same number
//! of levels. The session is never shared; two sessions racing to create the
//! same directory tolerate "already exists" but are otherwise unsupported.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::ftp::FtpSession;
use crate::walk::walk_files;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// The operations a remote file-transfer session must offer.
pub trait RemoteSession {
    /// Enter the child directory `name` of the current directory.
    fn change_dir(&mut self, name: &str) -> Result<()>;

    /// Create the child directory `name` in the current directory.
    fn make_dir(&mut self, name: &str) -> Result<()>;

    /// Store `reader`'s bytes as `name` in the current directory.
    fn store_file(&mut self, name: &str, reader: &mut dyn Read) -> Result<()>;

    /// Move up one directory.
    fn change_to_parent(&mut self) -> Result<()>;

    /// Close the session.
    fn disconnect(&mut self) -> Result<()>;
}

/// Connect to `host`, upload every file under `root`, and disconnect.
///
/// Returns the number of files uploaded. Nothing is touched if the connection
/// or login fails.
pub fn deploy(root: &Path, host: &str, credentials: &Credentials) -> Result<usize> {
    let mut session = FtpSession::connect(host, credentials)?;
    publish(&mut session, root)
}

/// Upload `root` through an open session, then disconnect.
///
/// Disconnect is attempted whether or not the upload succeeded. When both
/// fail the upload error is returned and the disconnect error only logged.
pub fn publish<S: RemoteSession + ?Sized>(session: &mut S, root: &Path) -> Result<usize> {
    let uploaded = upload_tree(session, root);
    let closed = session.disconnect();

    match (uploaded, closed) {
        (Ok(count), Ok(())) => {
            info!(count, "uploaded {} files", count);
            Ok(count)
        }
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(disconnect_err)) => {
            warn!(error = %disconnect_err, "disconnect failed after an earlier error");
            Err(err)
        }
    }
}

/// Upload every file under `root`, in path order, leaving the session in
/// the directory it started in.
///
/// The first failure aborts; remote state already written stays as is.
pub fn upload_tree<S: RemoteSession + ?Sized>(session: &mut S, root: &Path) -> Result<usize> {
    let mut count = 0;

    for file in walk_files(root)? {
        info!(path = %file.relative, "uploading");

        let (dirs, name) = match file.relative.rsplit_once('/') {
            Some((dirs, name)) => (dirs.split('/').collect::<Vec<_>>(), name),
            None => (Vec::new(), file.relative.as_str()),
        };

        let depth = descend(session, &dirs)?;

        let mut input = fs::File::open(&file.path)?;
        session.store_file(name, &mut input)?;

        for _ in 0..depth {
            session.change_to_parent()?;
        }

        count += 1;
    }

    Ok(count)
}

/// Enter each directory in turn, creating it when it cannot be entered.
fn descend<S: RemoteSession + ?Sized>(session: &mut S, dirs: &[&str]) -> Result<usize> {
    let mut depth = 0;

    for dir in dirs {
        if session.change_dir(dir).is_err() {
            // Another session may have created it meanwhile; only the
            // follow-up change_dir decides.
            let made = session.make_dir(dir);
            if let Err(err) = session.change_dir(dir) {
                return Err(made.err().unwrap_or(err));
            }
            if let Err(err) = made {
                debug!(dir, error = %err, "make_dir failed but directory is usable");
            }
        }
        depth += 1;
    }

    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

    /// In-memory stand-in for a remote host.
    #[derive(Default)]
    struct MemorySession {
        connected: bool,
        cwd: Vec<String>,
        dirs: BTreeSet<String>,
        files: BTreeMap<String, Vec<u8>>,
        made: Vec<String>,
        /// Directories another session creates just before our make_dir.
        contested: BTreeSet<String>,
        fail_store: Option<String>,
        fail_parent: bool,
        fail_disconnect: bool,
    }

    impl MemorySession {
        fn connected() -> Self {
            Self {
                connected: true,
                ..Self::default()
            }
        }

        fn child(&self, name: &str) -> String {
            let mut parts = self.cwd.clone();
            parts.push(name.to_string());
            parts.join("/")
        }

        fn check(&self) -> Result<()> {
            if self.connected {
                Ok(())
            } else {
                Err(Error::connection("memory", "not connected"))
            }
        }
    }

    impl RemoteSession for MemorySession {
        fn change_dir(&mut self, name: &str) -> Result<()> {
            self.check()?;
            let path = self.child(name);
            if self.dirs.contains(&path) {
                self.cwd.push(name.to_string());
                Ok(())
            } else {
                Err(Error::remote("cwd", path, "550 No such directory"))
            }
        }

        fn make_dir(&mut self, name: &str) -> Result<()> {
            self.check()?;
            let path = self.child(name);
            if self.contested.contains(&path) {
                self.dirs.insert(path.clone());
            }
            if !self.dirs.insert(path.clone()) {
                return Err(Error::remote("mkdir", path, "550 File exists"));
            }
            self.made.push(path);
            Ok(())
        }

        fn store_file(&mut self, name: &str, reader: &mut dyn Read) -> Result<()> {
            self.check()?;
            let path = self.child(name);
            if self.fail_store.as_deref() == Some(path.as_str()) {
                return Err(Error::remote("store", path, "452 Insufficient storage"));
            }
            let mut content = Vec::new();
            reader.read_to_end(&mut content)?;
            self.files.insert(path, content);
            Ok(())
        }

        fn change_to_parent(&mut self) -> Result<()> {
            self.check()?;
            if self.fail_parent || self.cwd.pop().is_none() {
                return Err(Error::remote("cdup", self.cwd.join("/"), "550 Cannot ascend"));
            }
            Ok(())
        }

        fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            if self.fail_disconnect {
                return Err(Error::connection("memory", "421 Timeout"));
            }
            Ok(())
        }
    }

    fn store_tree(temp_dir: &TempDir) -> std::path::PathBuf {
        let root = temp_dir.path().join("assets");
        fs::create_dir_all(root.join("data/a/a")).unwrap();
        fs::create_dir_all(root.join("data/b/0")).unwrap();
        fs::write(root.join("index.json"), b"{}").unwrap();
        fs::write(root.join("data/a/a/aa11"), b"one").unwrap();
        fs::write(root.join("data/a/a/aa22"), b"two").unwrap();
        fs::write(root.join("data/b/0/b033"), b"three").unwrap();
        root
    }

    #[test]
    fn test_publish_mirrors_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();

        let count = publish(&mut session, &root).unwrap();
        assert_eq!(count, 4);
        assert!(!session.connected);
        assert!(session.cwd.is_empty());

        let names: Vec<_> = session.files.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["data/a/a/aa11", "data/a/a/aa22", "data/b/0/b033", "index.json"]
        );
        assert_eq!(session.files["data/b/0/b033"], b"three");
        assert_eq!(
            session.made,
            vec!["data", "data/a", "data/a/a", "data/b", "data/b/0"]
        );
    }

    #[test]
    fn test_publish_twice_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();

        publish(&mut session, &root).unwrap();
        let made_first = session.made.len();

        session.connected = true;
        let count = publish(&mut session, &root).unwrap();
        assert_eq!(count, 4);
        assert_eq!(session.made.len(), made_first);
    }

    #[test]
    fn test_directory_created_by_someone_else() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();
        session.contested.insert("data".to_string());

        assert_eq!(publish(&mut session, &root).unwrap(), 4);
        assert!(session.files.contains_key("data/a/a/aa11"));
    }

    #[test]
    fn test_store_failure_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();
        session.fail_store = Some("data/a/a/aa22".to_string());

        let err = publish(&mut session, &root).unwrap_err();
        assert!(matches!(err, Error::Remote { operation: "store", .. }));
        // Earlier upload stays, later ones never happen.
        assert!(session.files.contains_key("data/a/a/aa11"));
        assert!(!session.files.contains_key("data/b/0/b033"));
        assert!(!session.connected);
    }

    #[test]
    fn test_ascend_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();
        session.fail_parent = true;

        let err = publish(&mut session, &root).unwrap_err();
        assert!(matches!(err, Error::Remote { operation: "cdup", .. }));
        assert_eq!(session.files.len(), 1);
    }

    #[test]
    fn test_disconnect_failure_does_not_mask_primary_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();
        session.fail_store = Some("index.json".to_string());
        session.fail_disconnect = true;

        let err = publish(&mut session, &root).unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[test]
    fn test_disconnect_failure_after_success_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let mut session = MemorySession::connected();
        session.fail_disconnect = true;

        let err = publish(&mut session, &root).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(session.files.len(), 4);
    }

    #[test]
    fn test_unreadable_root_still_disconnects() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = MemorySession::connected();

        assert!(publish(&mut session, &temp_dir.path().join("missing")).is_err());
        assert!(!session.connected);
    }

    #[test]
    fn test_deploy_connection_refused() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let temp_dir = TempDir::new().unwrap();
        let root = store_tree(&temp_dir);
        let err = deploy(&root, &addr.to_string(), &Credentials::new("u", "p")).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }
}
