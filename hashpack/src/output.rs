//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use hashpack_core::{Hash, Problem};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error chain.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `build` command.
#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub success: bool,
    pub result_code: u8,
    pub id: String,
    pub output: String,
    pub algorithm: String,
    pub files: usize,
    pub objects_written: usize,
    pub duplicates: usize,
    pub manifest_digest: Hash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

/// Output for `deploy` command.
#[derive(Debug, Serialize)]
pub struct DeployOutput {
    pub success: bool,
    pub result_code: u8,
    pub host: String,
    pub uploaded: usize,
}

/// A discrepancy reported by `verify`.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProblemInfo {
    SidecarMissing,
    SidecarMismatch { recorded: String, actual: Hash },
    MissingObject { path: String, hash: Hash },
    CorruptObject { path: String, hash: Hash, actual: Hash },
}

impl From<Problem> for ProblemInfo {
    fn from(problem: Problem) -> Self {
        match problem {
            Problem::SidecarMissing => ProblemInfo::SidecarMissing,
            Problem::SidecarMismatch { recorded, actual } => {
                ProblemInfo::SidecarMismatch { recorded, actual }
            }
            Problem::MissingObject { path, hash } => ProblemInfo::MissingObject { path, hash },
            Problem::CorruptObject { path, hash, actual } => {
                ProblemInfo::CorruptObject { path, hash, actual }
            }
        }
    }
}

impl ProblemInfo {
    /// One-line human description.
    pub fn describe(&self) -> String {
        match self {
            ProblemInfo::SidecarMissing => "manifest digest sidecar is missing".to_string(),
            ProblemInfo::SidecarMismatch { recorded, actual } => format!(
                "manifest digest mismatch: sidecar says {}, manifest hashes to {}",
                recorded, actual
            ),
            ProblemInfo::MissingObject { path, hash } => {
                format!("{}: object {} is missing", path, hash)
            }
            ProblemInfo::CorruptObject { path, hash, actual } => {
                format!("{}: object {} hashes to {}", path, hash, actual)
            }
        }
    }
}

/// Output for `verify` command.
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub success: bool,
    pub result_code: u8,
    pub algorithm: String,
    pub assets_checked: usize,
    pub problems: Vec<ProblemInfo>,
}

/// A single file digest for `hash` command.
#[derive(Debug, Clone, Serialize)]
pub struct FileDigest {
    pub path: String,
    pub hash: Hash,
}

/// Output for `hash` command.
#[derive(Debug, Serialize)]
pub struct HashOutput {
    pub success: bool,
    pub result_code: u8,
    pub algorithm: String,
    pub files: Vec<FileDigest>,
}
