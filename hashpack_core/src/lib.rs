//! # Hashpack Core
//!
//! Turns resource directories into a deduplicated, content-addressed asset
//! store.
//!
//! Every file is copied to a path derived from its content hash, a manifest
//! maps the original relative paths to those hashes, and a sidecar holding
//! the manifest's own digest lets consumers check it offline. The finished
//! store can be archived into one `.tar.zst` file or mirrored to a remote
//! host over FTP.
//!
//! ## Layout
//!
//! ```text
//! <output>/index.json
//! <output>/index.json.<algorithm>
//! <output>/<data>/<h0>/<h1>/<hash>
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hashpack_core::{Algorithm, Manifest, StoreBuilder, write_manifest};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let algorithm = Algorithm::parse("sha1")?;
//! let builder = StoreBuilder::new("./target/assets", algorithm);
//!
//! // Wipes ./target/assets, then hashes and copies every file
//! let output = builder.build(&[Path::new("./resources")])?;
//!
//! let manifest = Manifest::new("site-1.0", builder.data_dir_name(), output.assets);
//! let files = write_manifest(&manifest, builder.output_root(), algorithm)?;
//! println!("manifest digest {}", files.digest);
//!
//! let archive = hashpack_core::archive(builder.output_root())?;
//! println!("{} archive bytes", archive.len());
//! # Ok(())
//! # }
//! ```

mod archive;
mod credentials;
mod error;
mod ftp;
mod hash;
mod manifest;
mod store;
mod upload;
mod walk;

pub use archive::{
    ARCHIVE_EXTENSION, ArchiveOptions, ArchiveStats, DEFAULT_MTIME, archive, archive_to_file,
    archive_to_writer,
};
pub use credentials::{CredentialSource, Credentials, ServerEntry, Settings, resolve};
pub use error::{Category, Error, Result};
pub use ftp::FtpSession;
pub use hash::{Algorithm, Hash};
pub use manifest::{
    Asset, GENERATED_FORMAT, MANIFEST_FILE, Manifest, ManifestFiles, Problem, VerifyReport,
    detect_algorithm, read_manifest, verify_store, write_manifest,
};
pub use store::{BuildOutput, BuildStats, CollisionPolicy, DEFAULT_DATA_DIR, StoreBuilder};
pub use upload::{RemoteSession, deploy, publish, upload_tree};
pub use walk::{SourceFile, walk_files};
