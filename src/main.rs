mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use curator::config::CuratorConfig;
use curator::error::GraphError;
use curator::graph::fragment::NewFragment;
use curator::graph::{ArtifactStatus, EntityKind};

#[derive(Parser)]
#[command(
    name = "curator",
    version,
    about = "Research notebook graph: artifacts, fragments, notes and provenance"
)]
struct Cli {
    /// Config file (defaults to ~/.curator/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Create and update things
    Thing {
        #[command(subcommand)]
        action: cli::ThingAction,
    },
    /// Capture a file (or stdin) as a raw artifact
    Ingest(cli::ingest::IngestArgs),
    /// Mark an artifact as analyzed
    Analyzed { artifact_id: String },
    /// Record which thing an artifact represents
    Represent { artifact_id: String, thing_id: String },
    /// Extract a fragment from an artifact
    Fragment {
        artifact_id: String,
        #[arg(long)]
        content: String,
        /// Byte offset of the passage in the artifact
        #[arg(long)]
        offset: Option<u64>,
        /// Byte length of the passage (needs --offset)
        #[arg(long)]
        length: Option<u64>,
        /// Agent that extracted the passage
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Write and edit notes
    Note {
        #[command(subcommand)]
        action: cli::NoteAction,
    },
    /// Register and list agents
    Agent {
        #[command(subcommand)]
        action: cli::AgentAction,
    },
    /// Record that an agent produced an entity from sources
    Record {
        /// Entity the operation produced
        produced: String,
        #[arg(long)]
        agent: String,
        /// Operation type, e.g. extraction or summarization
        #[arg(long)]
        operation: String,
        /// Source entity (repeat in order)
        #[arg(long = "source")]
        sources: Vec<String>,
        /// JSON object of operation parameters
        #[arg(long)]
        params: Option<String>,
    },
    /// List recorded operations that produced an entity
    Records { id: String },
    /// Create collections and manage their members
    Collection {
        #[command(subcommand)]
        action: cli::CollectionAction,
    },
    /// Attach one or more tags to an entity
    Tag {
        id: String,
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Detach a tag from an entity
    Untag { id: String, label: String },
    /// Find entities by tag
    SearchTag {
        label: String,
        #[arg(long)]
        kind: Option<EntityKind>,
    },
    /// List artifacts, optionally by status
    Artifacts {
        #[arg(long)]
        status: Option<ArtifactStatus>,
    },
    /// List things, optionally by type
    Things {
        #[arg(long = "type")]
        thing_type: Option<String>,
    },
    /// List tags with usage counts
    Tags,
    /// List notes about an entity
    NotesAbout { id: String },
    /// List notes whose subject was deleted
    Tombstones,
    /// Walk an entity back to its origin
    Provenance {
        id: String,
        /// Include the relation followed at each step
        #[arg(long)]
        trace: bool,
    },
    /// Print any entity as JSON
    Show { id: String },
    /// Write an artifact's content to stdout or a file
    Content {
        artifact_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete an entity
    Delete {
        id: String,
        /// Also delete an artifact's fragments
        #[arg(long)]
        cascade: bool,
    },
    /// Show graph statistics
    Stats,
    /// Export the whole graph as JSON
    Export,
    /// Check database integrity and verify stored content
    Doctor,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CuratorConfig::load_from(path),
        None => CuratorConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // Log to stderr so stdout stays clean for JSON output and MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<GraphError>() {
                Some(graph_err) => eprintln!("error[{}]: {graph_err}", graph_err.kind()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: CuratorConfig) -> Result<()> {
    match command {
        Command::Serve => server::serve_stdio(config).await,
        Command::Thing { action } => cli::thing(&config, action),
        Command::Ingest(args) => cli::ingest::ingest(&config, args),
        Command::Analyzed { artifact_id } => cli::analyzed(&config, &artifact_id),
        Command::Represent {
            artifact_id,
            thing_id,
        } => cli::represent(&config, &artifact_id, &thing_id),
        Command::Fragment {
            artifact_id,
            content,
            offset,
            length,
            author,
            id,
        } => cli::fragment(
            &config,
            &NewFragment {
                id,
                artifact_id,
                content,
                offset,
                length,
                author_id: author,
            },
        ),
        Command::Note { action } => cli::note(&config, action),
        Command::Agent { action } => cli::agent(&config, action),
        Command::Record {
            produced,
            agent,
            operation,
            sources,
            params,
        } => cli::record(&config, produced, agent, operation, sources, params.as_deref()),
        Command::Records { id } => cli::inspect::records(&config, &id),
        Command::Collection { action } => cli::collection(&config, action),
        Command::Tag { id, labels } => cli::tag(&config, &id, &labels),
        Command::Untag { id, label } => cli::untag(&config, &id, &label),
        Command::SearchTag { label, kind } => cli::search_tag(&config, &label, kind),
        Command::Artifacts { status } => cli::artifacts(&config, status),
        Command::Things { thing_type } => cli::things(&config, thing_type.as_deref()),
        Command::Tags => cli::tags(&config),
        Command::NotesAbout { id } => cli::inspect::notes_about(&config, &id),
        Command::Tombstones => cli::inspect::tombstones(&config),
        Command::Provenance { id, trace } => cli::inspect::provenance(&config, &id, trace),
        Command::Show { id } => cli::inspect::show(&config, &id),
        Command::Content { artifact_id, out } => {
            cli::ingest::content(&config, &artifact_id, out.as_deref())
        }
        Command::Delete { id, cascade } => cli::delete(&config, &id, cascade),
        Command::Stats => cli::stats::stats(&config),
        Command::Export => cli::export::export(&config),
        Command::Doctor => cli::doctor::doctor(&config),
    }
}
