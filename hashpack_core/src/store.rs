//! Content-addressed store construction.

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Hash};
use crate::manifest::Asset;
use crate::walk::{SourceFile, walk_files};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default name of the object subdirectory inside the output root.
pub const DEFAULT_DATA_DIR: &str = "data";

/// What to do when an object for a hash is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Assume equal hashes mean equal content and skip the write.
    #[default]
    Trust,
    /// Compare bytes with the stored object and fail on a mismatch.
    Verify,
}

/// Counters gathered during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Source files processed.
    pub files: usize,
    /// Objects written to the data directory.
    pub objects_written: usize,
    /// Files whose object was already present.
    pub duplicates: usize,
    /// Bytes copied into the data directory.
    pub bytes_written: u64,
}

/// Result of a store build: the manifest assets in path order plus counters.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub assets: Vec<Asset>,
    pub stats: BuildStats,
}

/// Builds a content-addressed store under an output root.
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    output_root: PathBuf,
    data_dir: String,
    algorithm: Algorithm,
    collision_policy: CollisionPolicy,
}

struct HashedFile {
    source: SourceFile,
    hash: Hash,
}

impl StoreBuilder {
    /// Create a builder writing into `output_root` with the given algorithm.
    pub fn new<P: AsRef<Path>>(output_root: P, algorithm: Algorithm) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            algorithm,
            collision_policy: CollisionPolicy::default(),
        }
    }

    /// Set the object subdirectory name (default `data`).
    pub fn data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set how already-present objects are handled.
    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Get the output root.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Get the object subdirectory name.
    pub fn data_dir_name(&self) -> &str {
        &self.data_dir
    }

    /// Absolute directory holding the fan-out tree.
    pub fn data_path(&self) -> PathBuf {
        self.output_root.join(&self.data_dir)
    }

    /// Get the path to an object file given its hash.
    ///
    /// Returns: `{output_root}/{data_dir}/{h0}/{h1}/{hash}`
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        let (first, second) = hash.fanout();
        self.data_path().join(first).join(second).join(hash.to_hex())
    }

    /// Rebuild the store from `sources`.
    ///
    /// Wipes the output root first, unconditionally. A failure part-way
    /// leaves whatever was already written in place.
    pub fn build<P: AsRef<Path>>(&self, sources: &[P]) -> Result<BuildOutput> {
        self.reset_output_root()?;

        let files = self.collect_sources(sources)?;

        // Hashing is independent per file.
        let hashed: Vec<HashedFile> = files
            .into_par_iter()
            .map(|source| -> Result<HashedFile> {
                let hash = self.algorithm.digest_file(&source.path)?;
                debug!(path = %source.relative, %hash, "hashed");
                Ok(HashedFile { source, hash })
            })
            .collect::<Result<_>>()?;

        // One writer per distinct hash; the first file in path order owns it.
        let mut groups: BTreeMap<&Hash, Vec<&HashedFile>> = BTreeMap::new();
        for file in &hashed {
            groups.entry(&file.hash).or_default().push(file);
        }

        let outcomes: Vec<(usize, u64, usize)> = groups
            .into_par_iter()
            .map(|(hash, members)| self.store_group(hash, &members))
            .collect::<Result<_>>()?;

        let mut stats = BuildStats {
            files: hashed.len(),
            ..BuildStats::default()
        };
        for (written, bytes, duplicates) in outcomes {
            stats.objects_written += written;
            stats.bytes_written += bytes;
            stats.duplicates += duplicates;
        }

        let assets = hashed
            .into_iter()
            .map(|file| Asset::new(file.source.relative, file.hash))
            .collect();

        info!(
            files = stats.files,
            objects = stats.objects_written,
            duplicates = stats.duplicates,
            "store built"
        );

        Ok(BuildOutput { assets, stats })
    }

    /// Delete the output root if present and recreate it empty.
    fn reset_output_root(&self) -> Result<()> {
        if let Ok(metadata) = fs::symlink_metadata(&self.output_root) {
            info!(path = %self.output_root.display(), "removing previous output");
            if metadata.is_dir() {
                fs::remove_dir_all(&self.output_root)?;
            } else {
                fs::remove_file(&self.output_root)?;
            }
        }
        fs::create_dir_all(self.data_path())?;
        Ok(())
    }

    /// Walk every source root, keeping relative paths unique across roots.
    fn collect_sources<P: AsRef<Path>>(&self, sources: &[P]) -> Result<Vec<SourceFile>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for root in sources {
            let root = root.as_ref();
            info!(path = %root.display(), "processing directory");
            for file in walk_files(root)? {
                if !seen.insert(file.relative.clone()) {
                    return Err(Error::duplicate_asset(file.relative));
                }
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    /// Store the object for one hash and account for the files sharing it.
    ///
    /// Returns `(objects_written, bytes_written, duplicates)`.
    fn store_group(&self, hash: &Hash, members: &[&HashedFile]) -> Result<(usize, u64, usize)> {
        let obj_path = self.object_path(hash);
        let mut written = 0;
        let mut bytes = 0;
        let mut duplicates = 0;

        for (index, file) in members.iter().enumerate() {
            if index == 0 && !obj_path.exists() {
                bytes = self.write_object_atomic(&file.source.path, &obj_path)?;
                written = 1;
                continue;
            }

            info!(
                path = %file.source.relative,
                %hash,
                "asset already exists, are they the same file?"
            );
            duplicates += 1;

            if self.collision_policy == CollisionPolicy::Verify
                && !same_contents(&file.source.path, &obj_path)?
            {
                return Err(Error::hash_collision(
                    hash.to_hex(),
                    file.source.relative.clone(),
                ));
            }
        }

        Ok((written, bytes, duplicates))
    }

    /// Copy `source` to `obj_path` through a temp file in the same directory.
    fn write_object_atomic(&self, source: &Path, obj_path: &Path) -> Result<u64> {
        let parent = obj_path
            .parent()
            .ok_or_else(|| Error::invalid_path(obj_path, "object path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        let mut input = fs::File::open(source)?;
        let copied = std::io::copy(&mut input, &mut temp_file)?;
        temp_file.flush()?;

        temp_file.persist(obj_path)?;
        debug!(object = %obj_path.display(), bytes = copied, "object written");

        Ok(copied)
    }
}

/// Byte-for-byte comparison of two files.
fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut left = std::io::BufReader::new(fs::File::open(a)?);
    let mut right = std::io::BufReader::new(fs::File::open(b)?);
    let mut left_buf = [0u8; 8192];
    let mut right_buf = [0u8; 8192];

    loop {
        let n = left.read(&mut left_buf)?;
        if n == 0 {
            return Ok(true);
        }
        right.read_exact(&mut right_buf[..n])?;
        if left_buf[..n] != right_buf[..n] {
            return Ok(false);
        }
    }
}
