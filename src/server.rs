//! MCP server initialization for the stdio transport.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use curator::config::CuratorConfig;
use curator::db;
use curator::notebook::Notebook;

use crate::tools::CuratorTools;

/// Open the notebook and warn if the stored content layout differs from ours.
fn setup_shared_state(config: &CuratorConfig) -> Result<Arc<Mutex<Notebook>>> {
    let notebook = Notebook::open(config)?;
    tracing::info!(
        db = %config.resolved_db_path().display(),
        cache = %config.resolved_cache_dir().display(),
        "notebook ready"
    );

    if let Ok(Some(stored)) = db::migrations::get_content_hash_algorithm(notebook.connection()) {
        if stored != db::migrations::CONTENT_HASH_ALGORITHM {
            tracing::warn!(
                stored = %stored,
                expected = db::migrations::CONTENT_HASH_ALGORITHM,
                "content store was written with a different hash algorithm; run `curator doctor`"
            );
        }
    }

    Ok(Arc::new(Mutex::new(notebook)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CuratorConfig) -> Result<()> {
    tracing::info!("starting curator MCP server on stdio");

    let notebook = setup_shared_state(&config)?;

    let tools = CuratorTools::new(notebook);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
