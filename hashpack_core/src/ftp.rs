//! FTP implementation of [`RemoteSession`].

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::upload::RemoteSession;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tracing::{debug, warn};

/// Control port used when the host carries none.
pub const DEFAULT_PORT: u16 = 21;

/// A logged-in FTP control connection in binary transfer mode.
pub struct FtpSession {
    stream: FtpStream,
    host: String,
}

impl FtpSession {
    /// Connect to `host` (`name`, `name:port`, or an IP address) and log in.
    ///
    /// A failure before login drops the connection without a QUIT. Once
    /// logged in, a failed setup still sends QUIT before returning.
    pub fn connect(host: &str, credentials: &Credentials) -> Result<Self> {
        let address = socket_address(host);
        debug!(%address, "connecting");

        let mut stream = FtpStream::connect(&address).map_err(|e| Error::connection(host, e))?;

        stream
            .login(&credentials.username, &credentials.password)
            .map_err(|e| {
                Error::connection(
                    host,
                    format!(
                        "login as {} (password: {}) rejected: {}",
                        credentials.username,
                        if credentials.password.is_empty() {
                            "NO"
                        } else {
                            "YES"
                        },
                        e
                    ),
                )
            })?;

        if let Err(e) = stream.transfer_type(FileType::Binary) {
            if let Err(quit) = stream.quit() {
                warn!(host, error = %quit, "disconnect after failed setup also failed");
            }
            return Err(Error::connection(host, e));
        }

        Ok(Self {
            stream,
            host: host.to_string(),
        })
    }
}

impl RemoteSession for FtpSession {
    fn change_dir(&mut self, name: &str) -> Result<()> {
        self.stream
            .cwd(name)
            .map_err(|e| Error::remote("cwd", name, e))
    }

    fn make_dir(&mut self, name: &str) -> Result<()> {
        self.stream
            .mkdir(name)
            .map_err(|e| Error::remote("mkdir", name, e))
    }

    fn store_file(&mut self, name: &str, mut reader: &mut dyn Read) -> Result<()> {
        let bytes = self
            .stream
            .put_file(name, &mut reader)
            .map_err(|e| Error::remote("store", name, e))?;
        debug!(name, bytes, "stored");
        Ok(())
    }

    fn change_to_parent(&mut self) -> Result<()> {
        self.stream
            .cdup()
            .map_err(|e| Error::remote("cdup", "..", e))
    }

    fn disconnect(&mut self) -> Result<()> {
        self.stream
            .quit()
            .map_err(|e| Error::connection(&self.host, e))
    }
}

/// Append the default port unless `host` already names one.
fn socket_address(host: &str) -> String {
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, DEFAULT_PORT),
        Ok(IpAddr::V4(ip)) => format!("{}:{}", ip, DEFAULT_PORT),
        Err(_) if host.contains(':') => host.to_string(),
        Err(_) => format!("{}:{}", host, DEFAULT_PORT),
    }
}
