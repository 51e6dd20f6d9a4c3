//! CLI `doctor` command: database diagnostics plus content store verification.

use anyhow::{Context, Result};

use curator::config::CuratorConfig;
use curator::content::{format_size, ContentStore};
use curator::db::{self, migrations::CONTENT_HASH_ALGORITHM};
use curator::graph::artifact::cached_artifacts;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &CuratorConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run any `curator` write command or `curator serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Curator Health Report");
    println!("=====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_size(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!(
        "Content hash:      {}",
        report.content_hash_algorithm.as_deref().unwrap_or("(not set)")
    );
    if let Some(ref stored) = report.content_hash_algorithm {
        if stored != CONTENT_HASH_ALGORITHM {
            println!("  WARNING: this binary writes {CONTENT_HASH_ALGORITHM}; cached payloads will not verify.");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Entities:        {}", report.entity_count);
    println!("  Things:          {}", report.thing_count);
    println!("  Artifacts:       {}", report.artifact_count);
    println!("  Fragments:       {}", report.fragment_count);
    println!("  Notes:           {}", report.note_count);
    println!("  Collections:     {}", report.collection_count);
    println!("  Tags:            {}", report.tag_count);
    println!("  Agents:          {}", report.agent_count);
    println!("  Op records:      {}", report.provenance_record_count);
    println!("  Audit log:       {}", report.log_count);
    println!();

    let store = ContentStore::with_threshold(
        config.resolved_cache_dir(),
        config.storage.inline_threshold,
    );
    let cached = cached_artifacts(&conn)?;
    let mut missing = Vec::new();
    let mut corrupt = Vec::new();
    for (id, path, hash) in &cached {
        if !store.exists(path) {
            missing.push(id.as_str());
            continue;
        }
        match store.verify(path, hash) {
            Ok(true) => {}
            Ok(false) => corrupt.push(id.as_str()),
            Err(e) => {
                tracing::warn!(artifact_id = %id, error = %e, "failed to read cached payload");
                corrupt.push(id.as_str());
            }
        }
    }

    println!("Content store:     {}", store.root().display());
    println!("  Cached payloads: {}", cached.len());
    println!("  Missing:         {}", missing.len());
    println!("  Hash mismatch:   {}", corrupt.len());
    for id in missing.iter().chain(corrupt.iter()) {
        println!("    {id}");
    }
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup of {}", db_path.display());
        println!("  2. Or export what is still readable: curator export > backup.json");
    }

    Ok(())
}
