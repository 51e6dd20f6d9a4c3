use anyhow::Result;

use curator::config::CuratorConfig;
use curator::content::format_size;
use curator::notebook::Notebook;

/// Display graph statistics in the terminal.
pub fn stats(config: &CuratorConfig) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let response = nb.stats()?;
    let content = nb.content_store().stats()?;

    println!("Graph Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total entities:      {}", response.total_entities);
    println!();

    println!("By Kind:");
    for (kind, count) in &response.by_kind {
        println!("  {:<12} {}", kind, count);
    }
    println!();

    println!("Artifacts:");
    for (status, count) in &response.artifacts_by_status {
        println!("  {:<12} {}", status, count);
    }
    println!("  {:<12} {}", "inline", response.inline_artifacts);
    println!("  {:<12} {}", "cached", response.cached_artifacts);
    println!("  {:<12} {}", "bytes", format_size(response.artifact_bytes));
    println!();

    println!("Collections:");
    for (mode, count) in &response.collections_by_mode {
        println!("  {:<12} {}", mode, count);
    }
    println!();

    println!("Tags:                  {}", response.tags);
    println!("Tombstoned notes:      {}", response.tombstoned_notes);
    println!("Agents:                {}", response.agents);
    println!("Recorded operations:   {}", response.provenance_records);
    println!("Database size:         {}", format_size(response.db_size_bytes));
    println!(
        "Content store:         {} files, {}",
        content.total_files,
        format_size(content.total_bytes)
    );

    if let Some(ref oldest) = response.oldest_entity {
        println!("Oldest entity:         {oldest}");
    }
    if let Some(ref newest) = response.newest_entity {
        println!("Newest entity:         {newest}");
    }

    Ok(())
}
