mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::ProjectConfig;
use hashpack_core::{
    Algorithm, ArchiveOptions, Category, CollisionPolicy, DEFAULT_MTIME, Manifest, Settings,
    StoreBuilder,
};
use output::{
    BuildOutput, DeployOutput, FileDigest, HashOutput, OutputWriter, ProblemInfo, VerifyOutput,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Hashpack - content-addressed asset stores
#[derive(Parser)]
#[command(name = "hashpack")]
#[command(about = "Build, verify and publish content-addressed asset stores", long_about = None)]
#[command(version)]
struct Cli {
    /// Project config file (defaults to ./hashpack.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log per-file detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the store, write the manifest, and archive it
    Build {
        /// Source directory (repeatable; replaces the config list)
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Output root (wiped before building)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Object subdirectory inside the output root
        #[arg(long)]
        data_dir: Option<String>,

        /// Hash algorithm: md5, sha1, sha256, sha512, blake3
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Logical asset id recorded in the manifest
        #[arg(long)]
        id: Option<String>,

        /// Archive destination
        #[arg(long, conflicts_with = "no_archive")]
        archive: Option<PathBuf>,

        /// Skip writing the archive
        #[arg(long)]
        no_archive: bool,

        /// Compare bytes when two files share a hash
        #[arg(long)]
        verify_collisions: bool,
    },

    /// Upload the output root to a remote host
    Deploy {
        /// Output root to upload
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remote host, optionally with :port
        #[arg(long)]
        host: Option<String>,

        /// Logical server name whose credentials are used
        #[arg(long)]
        server: Option<String>,

        /// Credentials file
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Check an output root against its manifest and sidecar
    Verify {
        /// Output root to check
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hash algorithm (detected from the sidecar when omitted)
        #[arg(short, long)]
        algorithm: Option<String>,
    },

    /// Print the digest of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Hash algorithm
        #[arg(short, long)]
        algorithm: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let out = OutputWriter::new(cli.json);
    if let Err(err) = run(cli, &out) {
        let code = exit_code(&err);
        out.write_error(&err, code);
        std::process::exit(i32::from(code));
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

/// Map the underlying library error, if any, to a process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err
        .chain()
        .find_map(|cause| cause.downcast_ref::<hashpack_core::Error>())
        .map(hashpack_core::Error::category)
    {
        Some(Category::Configuration) => 2,
        Some(Category::Connection) => 3,
        Some(Category::Io) | None => 1,
    }
}

fn run(cli: Cli, out: &OutputWriter) -> Result<()> {
    let config = ProjectConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            sources,
            output,
            data_dir,
            algorithm,
            id,
            archive,
            no_archive,
            verify_collisions,
        } => {
            let output = config.output(output);
            let algorithm = parse_algorithm(&config.algorithm(algorithm))?;
            let id = config
                .id(id)
                .context("No asset id given (use --id or set `id` in hashpack.toml)")?;
            let archive = if no_archive {
                None
            } else {
                Some(config.archive(archive, &output, &id))
            };
            let policy = if verify_collisions || config.verify_collisions.unwrap_or(false) {
                CollisionPolicy::Verify
            } else {
                CollisionPolicy::Trust
            };

            cmd_build(
                out,
                BuildArgs {
                    sources: config.sources(sources),
                    output,
                    data_dir: config.data_dir(data_dir),
                    algorithm,
                    id,
                    archive,
                    policy,
                },
            )
        }
        Commands::Deploy {
            output,
            host,
            server,
            settings,
        } => {
            let output = config.output(output);
            let host = config
                .host(host)
                .context("No remote host given (use --host or set [remote] host)")?;
            let server = config
                .server(server)
                .context("No server name given (use --server or set [remote] server)")?;
            let settings = config.settings(settings);
            cmd_deploy(out, &output, &host, &server, settings.as_deref())
        }
        Commands::Verify { output, algorithm } => {
            let output = config.output(output);
            let algorithm = match algorithm {
                Some(name) => parse_algorithm(&name)?,
                None => hashpack_core::detect_algorithm(&output).with_context(|| {
                    format!(
                        "Cannot tell the algorithm from the sidecar in {} (use --algorithm)",
                        output.display()
                    )
                })?,
            };
            cmd_verify(out, &output, algorithm)
        }
        Commands::Hash { paths, algorithm } => {
            let algorithm = parse_algorithm(&config.algorithm(algorithm))?;
            cmd_hash(out, &paths, algorithm)
        }
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm> {
    Ok(Algorithm::parse(name)?)
}

struct BuildArgs {
    sources: Vec<PathBuf>,
    output: PathBuf,
    data_dir: String,
    algorithm: Algorithm,
    id: String,
    archive: Option<PathBuf>,
    policy: CollisionPolicy,
}

fn cmd_build(out: &OutputWriter, args: BuildArgs) -> Result<()> {
    if args.sources.is_empty() {
        anyhow::bail!("No source directories given (use --source or set `sources`)");
    }

    info!(id = %args.id, output = %args.output.display(), "generating assets");

    let builder = StoreBuilder::new(&args.output, args.algorithm)
        .data_dir(args.data_dir.as_str())
        .collision_policy(args.policy);
    let result = builder
        .build(&args.sources)
        .with_context(|| format!("Failed to build store at {}", args.output.display()))?;

    let manifest = Manifest::new(args.id.as_str(), builder.data_dir_name(), result.assets);
    let files = hashpack_core::write_manifest(&manifest, &args.output, args.algorithm)
        .context("Failed to write manifest")?;

    if let Some(dest) = &args.archive {
        let options = ArchiveOptions {
            mtime: source_date_epoch().unwrap_or(DEFAULT_MTIME),
            ..ArchiveOptions::default()
        };
        hashpack_core::archive_to_file(&args.output, dest, &options)
            .with_context(|| format!("Failed to write archive {}", dest.display()))?;
    }

    let stats = result.stats;
    let data = BuildOutput {
        success: true,
        result_code: 0,
        id: args.id.clone(),
        output: args.output.display().to_string(),
        algorithm: args.algorithm.to_string(),
        files: stats.files,
        objects_written: stats.objects_written,
        duplicates: stats.duplicates,
        manifest_digest: files.digest.clone(),
        archive: args.archive.as_ref().map(|p| p.display().to_string()),
    };

    out.write(&data, || {
        let mut text = format!(
            "Built {} ({} files, {} objects, {} duplicates)\n",
            args.output.display(),
            stats.files,
            stats.objects_written,
            stats.duplicates
        );
        text.push_str(&format!(
            "Manifest: {} ({} {})\n",
            files.path.display(),
            args.algorithm,
            files.digest
        ));
        if let Some(dest) = &args.archive {
            text.push_str(&format!("Archive: {}\n", dest.display()));
        }
        text
    })
}

/// `SOURCE_DATE_EPOCH`, when set to a valid integer.
fn source_date_epoch() -> Option<u64> {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
}

fn cmd_deploy(
    out: &OutputWriter,
    output: &Path,
    host: &str,
    server: &str,
    settings_path: Option<&Path>,
) -> Result<()> {
    let settings = match settings_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings {}", path.display()))?,
        None => Settings::default(),
    };
    let credentials = hashpack_core::resolve(&settings, server)?;

    if !output.is_dir() {
        anyhow::bail!("Nothing to deploy: {} is not a directory", output.display());
    }

    let uploaded = hashpack_core::deploy(output, host, &credentials)
        .with_context(|| format!("Failed to deploy {} to {}", output.display(), host))?;

    let data = DeployOutput {
        success: true,
        result_code: 0,
        host: host.to_string(),
        uploaded,
    };
    out.write(&data, || format!("Uploaded {} files to {}\n", uploaded, host))
}

fn cmd_verify(out: &OutputWriter, output: &Path, algorithm: Algorithm) -> Result<()> {
    let report = hashpack_core::verify_store(output, algorithm)
        .with_context(|| format!("Failed to verify {}", output.display()))?;

    let ok = report.is_ok();
    let problems: Vec<ProblemInfo> = report.problems.into_iter().map(Into::into).collect();
    let count = problems.len();

    let data = VerifyOutput {
        success: ok,
        result_code: if ok { 0 } else { 1 },
        algorithm: algorithm.to_string(),
        assets_checked: report.assets_checked,
        problems,
    };
    out.write(&data, || {
        let mut text = String::new();
        for problem in &data.problems {
            text.push_str(&problem.describe());
            text.push('\n');
        }
        text.push_str(&format!(
            "Checked {} assets: {}\n",
            data.assets_checked,
            if ok { "OK" } else { "FAILED" }
        ));
        text
    })?;

    if !ok {
        anyhow::bail!("{} problem(s) found in {}", count, output.display());
    }
    Ok(())
}

fn cmd_hash(out: &OutputWriter, paths: &[PathBuf], algorithm: Algorithm) -> Result<()> {
    let mut files = Vec::new();
    for path in paths {
        let hash = algorithm
            .digest_file(path)
            .with_context(|| format!("Failed to hash {}", path.display()))?;
        files.push(FileDigest {
            path: path.display().to_string(),
            hash,
        });
    }

    let data = HashOutput {
        success: true,
        result_code: 0,
        algorithm: algorithm.to_string(),
        files,
    };
    out.write(&data, || {
        data.files
            .iter()
            .map(|f| format!("{}  {}\n", f.hash, f.path))
            .collect()
    })
}
