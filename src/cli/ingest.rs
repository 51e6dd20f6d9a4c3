//! CLI `ingest` and `content`: moving artifact bytes in and out.

use anyhow::{Context, Result};
use clap::Args;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use curator::config::CuratorConfig;
use curator::content::{format_size, mime};
use curator::graph::artifact::{NewArtifact, Placement};
use curator::graph::Entity;
use curator::notebook::Notebook;

#[derive(Args)]
pub struct IngestArgs {
    /// File to capture, or `-` for stdin
    pub source: PathBuf,
    /// Source URI to record (defaults to the file's absolute path as file://)
    #[arg(long)]
    pub uri: Option<String>,
    /// MIME type (guessed when omitted)
    #[arg(long)]
    pub mime: Option<String>,
    /// Thing this artifact represents
    #[arg(long)]
    pub represents: Option<String>,
    /// RFC 3339 capture time
    #[arg(long)]
    pub retrieved_at: Option<String>,
    /// auto, inline or cached
    #[arg(long, default_value = "auto")]
    pub placement: Placement,
    #[arg(long)]
    pub id: Option<String>,
    /// Tags to attach after capture
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

pub fn ingest(config: &CuratorConfig, args: IngestArgs) -> Result<()> {
    let from_stdin = args.source.as_os_str() == "-";
    let bytes = if from_stdin {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read(&args.source)
            .with_context(|| format!("failed to read {}", args.source.display()))?
    };

    let source_uri = match args.uri {
        Some(uri) => uri,
        None if from_stdin => anyhow::bail!("--uri is required when reading from stdin"),
        None => file_uri(&args.source)?,
    };

    let mut nb = Notebook::open(config)?;
    let id = nb.create_artifact(
        &NewArtifact {
            id: args.id,
            source_uri,
            mime_type: args.mime,
            retrieved_at: args.retrieved_at,
            represents: args.represents,
            placement: args.placement,
        },
        &bytes,
    )?;
    for label in &args.tags {
        nb.tag(&id, label)?;
    }

    eprintln!("Captured {} as {id}.", format_size(bytes.len() as u64));
    super::print_json(&nb.get(&id)?)
}

fn file_uri(path: &Path) -> Result<String> {
    let abs = std::fs::canonicalize(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    Ok(format!("file://{}", abs.display()))
}

/// Write an artifact's bytes to `out`, or to stdout when the content is textual.
pub fn content(config: &CuratorConfig, artifact_id: &str, out: Option<&Path>) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let Entity::Artifact(artifact) = nb.get(artifact_id)? else {
        anyhow::bail!("{artifact_id} is not an artifact");
    };
    let bytes = nb.read_artifact_content(artifact_id)?;

    match out {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Wrote {} ({}) to {}.",
                format_size(bytes.len() as u64),
                artifact.mime_type,
                path.display()
            );
        }
        None => {
            anyhow::ensure!(
                mime::is_textual(&artifact.mime_type),
                "{} content is binary; use --out <file.{}>",
                artifact.mime_type,
                mime::extension(&artifact.mime_type)
            );
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
