// System status display: item counts, vote consistency, recompute times.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::db::models::ContentKind;
use crate::db::CounterStore;
use crate::engine::recompute::last_recompute_key;

/// Display system status to the terminal.
///
/// `db_display_path` is the SQLite file, or `None` for a server database.
pub async fn show(store: &Arc<dyn CounterStore>, db_display_path: Option<&str>) -> Result<()> {
    match db_display_path {
        Some(path) => {
            let file_size = std::fs::metadata(path)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_else(|_| "unknown".to_string());
            println!("Database: {} ({})", path, file_size);
        }
        None => println!("Database: PostgreSQL"),
    }

    let counts = store.count_by_kind().await?;
    let total: i64 = counts.iter().map(|(_, n)| n).sum();
    println!("Content items: {total} total");
    for kind in ContentKind::ALL {
        let n = counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        println!("  {:<8} {n}", kind.as_str());
    }

    let inconsistent = store.count_inconsistent_votes().await?;
    if inconsistent == 0 {
        println!("Vote counters: consistent");
    } else {
        println!(
            "Vote counters: {} item(s) where yes + no != votes",
            inconsistent.to_string().red().bold()
        );
    }

    for kind in ContentKind::ALL {
        match store.get_engine_state(&last_recompute_key(kind)).await? {
            Some(at) => println!("Last {kind} recompute: {at}"),
            None => println!("Last {kind} recompute: never"),
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
