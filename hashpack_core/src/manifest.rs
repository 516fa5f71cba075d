//! The asset manifest, its digest sidecar, and offline verification.
//!
//! A finished output root looks like:
//!
//! ```text
//! index.json            manifest (id, generated, basedir, assets)
//! index.json.<algo>     hex digest of index.json, nothing else
//! <basedir>/<h0>/<h1>/<hash>
//! ```

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Hash};
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// File name of the manifest inside the output root.
pub const MANIFEST_FILE: &str = "index.json";

/// Timestamp layout of the `generated` field, e.g. `2024-01-01T00:00:00+0000`.
pub const GENERATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// One logical file and the hash of its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// `/`-separated path relative to its source root.
    pub path: String,
    pub hash: Hash,
}

impl Asset {
    pub fn new(path: impl Into<String>, hash: Hash) -> Self {
        Self {
            path: path.into(),
            hash,
        }
    }
}

/// The document describing one build. Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    #[serde(with = "generated_format")]
    pub generated: DateTime<FixedOffset>,
    pub basedir: String,
    pub assets: Vec<Asset>,
}

impl Manifest {
    /// Create a manifest stamped with the current local time.
    pub fn new(id: impl Into<String>, basedir: impl Into<String>, assets: Vec<Asset>) -> Self {
        Self {
            id: id.into(),
            generated: Local::now().fixed_offset(),
            basedir: basedir.into(),
            assets,
        }
    }

    /// Replace the generation timestamp.
    pub fn with_generated(mut self, generated: DateTime<FixedOffset>) -> Self {
        self.generated = generated;
        self
    }

    /// Parse a manifest document.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Name of the digest sidecar for `algorithm`.
    pub fn sidecar_name(algorithm: Algorithm) -> String {
        format!("{}.{}", MANIFEST_FILE, algorithm.as_str())
    }
}

mod generated_format {
    use super::GENERATED_FORMAT;
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(GENERATED_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&raw, GENERATED_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Locations written by [`write_manifest`].
#[derive(Debug, Clone)]
pub struct ManifestFiles {
    /// Path of `index.json`.
    pub path: PathBuf,
    /// Path of the digest sidecar.
    pub sidecar: PathBuf,
    /// Digest of the manifest file bytes.
    pub digest: Hash,
}

/// Write `index.json` and its digest sidecar into `output_root`.
///
/// The digest is computed from the file as written, not from the in-memory
/// document.
pub fn write_manifest(
    manifest: &Manifest,
    output_root: &Path,
    algorithm: Algorithm,
) -> Result<ManifestFiles> {
    let path = output_root.join(MANIFEST_FILE);
    debug!(path = %path.display(), id = %manifest.id, "writing manifest");
    fs::write(&path, manifest.to_json()?)?;

    let digest = algorithm.digest_file(&path)?;
    let sidecar = output_root.join(Manifest::sidecar_name(algorithm));
    fs::write(&sidecar, digest.to_hex())?;

    info!(
        assets = manifest.assets.len(),
        %digest,
        "manifest written"
    );

    Ok(ManifestFiles {
        path,
        sidecar,
        digest,
    })
}

/// Read and parse `index.json` from `output_root`.
pub fn read_manifest(output_root: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(output_root.join(MANIFEST_FILE))?;
    Manifest::parse(&content)
}

/// Find the algorithm whose sidecar sits next to the manifest.
///
/// Returns `None` if there is no sidecar, or more than one.
pub fn detect_algorithm(output_root: &Path) -> Option<Algorithm> {
    let mut found = Algorithm::ALL
        .into_iter()
        .filter(|algo| output_root.join(Manifest::sidecar_name(*algo)).is_file());
    match (found.next(), found.next()) {
        (Some(algo), None) => Some(algo),
        _ => None,
    }
}

/// A single discrepancy found by [`verify_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// The sidecar file is absent.
    SidecarMissing,
    /// The sidecar does not match the manifest bytes.
    SidecarMismatch { recorded: String, actual: Hash },
    /// No object exists for an asset.
    MissingObject { path: String, hash: Hash },
    /// An object's contents do not hash to its name.
    CorruptObject {
        path: String,
        hash: Hash,
        actual: Hash,
    },
}

/// Outcome of an offline store check.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Manifest assets inspected.
    pub assets_checked: usize,
    pub problems: Vec<Problem>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check a finished output root against its own manifest.
///
/// Problems are collected rather than returned as errors; only failures to
/// read the manifest itself abort.
pub fn verify_store(output_root: &Path, algorithm: Algorithm) -> Result<VerifyReport> {
    let manifest_path = output_root.join(MANIFEST_FILE);
    let manifest_bytes = fs::read(&manifest_path)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;

    let mut report = VerifyReport::default();

    let actual = algorithm.digest_bytes(&manifest_bytes);
    match fs::read_to_string(output_root.join(Manifest::sidecar_name(algorithm))) {
        Ok(recorded) if recorded == actual.to_hex() => {}
        Ok(recorded) => report
            .problems
            .push(Problem::SidecarMismatch { recorded, actual }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            report.problems.push(Problem::SidecarMissing)
        }
        Err(err) => return Err(Error::from(err)),
    }

    let data_root = data_root(output_root, &manifest.basedir)?;
    for asset in &manifest.assets {
        report.assets_checked += 1;
        let object = data_root.join(asset.hash.object_path());

        if !object.is_file() {
            report.problems.push(Problem::MissingObject {
                path: asset.path.clone(),
                hash: asset.hash.clone(),
            });
            continue;
        }

        let stored = algorithm.digest_file(&object)?;
        if stored != asset.hash {
            report.problems.push(Problem::CorruptObject {
                path: asset.path.clone(),
                hash: asset.hash.clone(),
                actual: stored,
            });
        }
    }

    debug!(
        checked = report.assets_checked,
        problems = report.problems.len(),
        "store verified"
    );
    Ok(report)
}

/// Resolve `basedir` under `output_root`, refusing anything but plain names.
fn data_root(output_root: &Path, basedir: &str) -> Result<PathBuf> {
    let relative = Path::new(basedir);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if basedir.is_empty() || !plain {
        return Err(Error::invalid_path(
            relative,
            "basedir must stay inside the output root",
        ));
    }
    Ok(output_root.join(relative))
}
