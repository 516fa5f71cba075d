//! Content hashing over the supported digest algorithms.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// MD5, 128-bit. Kept for stores consumed by legacy clients.
    Md5,
    /// SHA-1, 160-bit.
    #[default]
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
    /// BLAKE3 with 256-bit output.
    Blake3,
}

impl Algorithm {
    /// Every supported algorithm, in declaration order.
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
        Algorithm::Blake3,
    ];

    /// Returns the algorithm name, as used in config files and sidecar extensions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
            Algorithm::Blake3 => "blake3",
        }
    }

    /// Parse algorithm from its name.
    ///
    /// Unknown names are rejected; there is no fallback to the default.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            "blake3" => Ok(Algorithm::Blake3),
            _ => Err(Error::unsupported_algorithm(s)),
        }
    }

    /// Digest size in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 | Algorithm::Blake3 => 32,
            Algorithm::Sha512 => 64,
        }
    }

    /// Hash raw bytes.
    pub fn digest_bytes(&self, data: &[u8]) -> Hash {
        let raw = match self {
            Algorithm::Md5 => md5::Md5::digest(data).to_vec(),
            Algorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Algorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Algorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
            Algorithm::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        };
        Hash(hex::encode(raw))
    }

    /// Hash data from a reader.
    pub fn digest_reader<R: Read>(&self, reader: R) -> Result<Hash> {
        let raw = match self {
            Algorithm::Md5 => digest_stream(md5::Md5::new(), reader)?,
            Algorithm::Sha1 => digest_stream(sha1::Sha1::new(), reader)?,
            Algorithm::Sha256 => digest_stream(sha2::Sha256::new(), reader)?,
            Algorithm::Sha512 => digest_stream(sha2::Sha512::new(), reader)?,
            Algorithm::Blake3 => {
                let mut reader = reader;
                let mut hasher = blake3::Hasher::new();
                std::io::copy(&mut reader, &mut hasher)?;
                hasher.finalize().as_bytes().to_vec()
            }
        };
        Ok(Hash(hex::encode(raw)))
    }

    /// Hash a file.
    pub fn digest_file(&self, path: &Path) -> Result<Hash> {
        let file = std::fs::File::open(path)?;
        self.digest_reader(std::io::BufReader::new(file))
    }
}

fn digest_stream<D: Digest + Write, R: Read>(mut hasher: D, mut reader: R) -> Result<Vec<u8>> {
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::parse(s)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content digest, held as lowercase hex.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

impl Hash {
    /// Create a Hash from a hex string produced by `algorithm`.
    ///
    /// Uppercase input is accepted and normalized to lowercase.
    pub fn from_hex(algorithm: Algorithm, hex_str: &str) -> Result<Self> {
        let expected = algorithm.digest_len() * 2;
        if hex_str.len() != expected {
            return Err(Error::invalid_hash(format!(
                "Expected {} hex characters for {}, got {}",
                expected,
                algorithm,
                hex_str.len()
            )));
        }
        Self::parse_any(hex_str)
    }

    /// Accept any even-length hex string of at least one byte.
    fn parse_any(hex_str: &str) -> Result<Self> {
        if hex_str.len() < 2 {
            return Err(Error::invalid_hash("Hash is too short"));
        }
        hex::decode(hex_str).map_err(|e| Error::invalid_hash(format!("Invalid hex: {}", e)))?;
        Ok(Hash(hex_str.to_ascii_lowercase()))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> &str {
        &self.0
    }

    /// First and second hex characters, used as the two fan-out directories.
    pub fn fanout(&self) -> (&str, &str) {
        (&self.0[0..1], &self.0[1..2])
    }

    /// Path of this object relative to the store root: `{h0}/{h1}/{hash}`.
    pub fn object_path(&self) -> String {
        let (first, second) = self.fanout();
        format!("{}/{}/{}", first, second, self.0)
    }
}

impl TryFrom<String> for Hash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Hash::parse_any(&value)
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            Algorithm::Md5.digest_bytes(b"hello").to_hex(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            Algorithm::Sha1.digest_bytes(b"hello").to_hex(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
        assert_eq!(
            Algorithm::Sha256.digest_bytes(b"hello").to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(
            Algorithm::Sha512.digest_bytes(b"").to_hex(),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
        assert_eq!(
            Algorithm::Blake3.digest_bytes(b"hello world").to_hex(),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_hash_empty() {
        let hash = Algorithm::Sha1.digest_bytes(b"");
        assert_eq!(hash.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_default_is_sha1() {
        assert_eq!(Algorithm::default(), Algorithm::Sha1);
    }

    #[test]
    fn test_reader_matches_bytes() {
        for algo in Algorithm::ALL {
            let from_reader = algo.digest_reader(&b"streamed content"[..]).unwrap();
            assert_eq!(from_reader, algo.digest_bytes(b"streamed content"));
        }
    }

    #[test]
    fn test_digest_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let hash = Algorithm::Sha1.digest_file(&path).unwrap();
        assert_eq!(hash.to_hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn test_digest_file_missing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        assert!(
            Algorithm::Md5
                .digest_file(&temp_dir.path().join("nope"))
                .is_err()
        );
    }

    #[test]
    fn test_algorithm_conversions() {
        for algo in Algorithm::ALL {
            assert_eq!(Algorithm::parse(algo.as_str()).unwrap(), algo);
            assert_eq!(algo.to_string().parse::<Algorithm>().unwrap(), algo);
        }

        let err = Algorithm::parse("crc32").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm { .. }));
        // Names are case-sensitive, matching the config values.
        assert!(Algorithm::parse("SHA1").is_err());
        assert!(Algorithm::parse("").is_err());
    }

    #[test]
    fn test_hash_from_hex() {
        let hash = Hash::from_hex(Algorithm::Md5, "5D41402ABC4B2A76B9719D911017C592").unwrap();
        assert_eq!(hash.to_hex(), "5d41402abc4b2a76b9719d911017c592");

        assert!(Hash::from_hex(Algorithm::Sha1, "5d41402abc4b2a76b9719d911017c592").is_err());
        assert!(Hash::from_hex(Algorithm::Md5, &"z".repeat(32)).is_err());
        assert!(Hash::from_hex(Algorithm::Md5, "").is_err());
    }

    #[test]
    fn test_fanout_and_object_path() {
        let hash = Algorithm::Sha1.digest_bytes(b"hello");
        assert_eq!(hash.fanout(), ("a", "a"));
        assert_eq!(
            hash.object_path(),
            "a/a/aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn test_serde_rejects_garbage() {
        let ok: Hash = serde_json::from_str("\"aaf4c61d\"").unwrap();
        assert_eq!(ok.to_hex(), "aaf4c61d");
        assert!(serde_json::from_str::<Hash>("\"not hex\"").is_err());
        assert!(serde_json::from_str::<Hash>("\"a\"").is_err());
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Hashing the same data always produces the same hash
        #[test]
        fn prop_hash_deterministic(
            data: Vec<u8>,
            algo in prop::sample::select(Algorithm::ALL.to_vec())
        ) {
            prop_assert_eq!(algo.digest_bytes(&data), algo.digest_bytes(&data));
        }

        /// Hex output is lowercase with two characters per digest byte
        #[test]
        fn prop_hex_shape(
            data: Vec<u8>,
            algo in prop::sample::select(Algorithm::ALL.to_vec())
        ) {
            let hash = algo.digest_bytes(&data);
            prop_assert_eq!(hash.to_hex().len(), algo.digest_len() * 2);
            prop_assert!(hash.to_hex().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
            prop_assert_eq!(Hash::from_hex(algo, hash.to_hex())?, hash);
        }

        /// Fan-out directories are the leading characters of the hex digest
        #[test]
        fn prop_fanout_prefix(data: Vec<u8>) {
            let hash = Algorithm::Sha256.digest_bytes(&data);
            let (first, second) = hash.fanout();
            let prefix = format!("{}{}", first, second);
            prop_assert!(hash.to_hex().starts_with(&prefix));
        }
    }
}
