// Colored terminal output for rankings, score breakdowns and counts.
//
// This module handles all terminal-specific formatting. The main.rs command
// handlers delegate here.

use std::collections::HashMap;

use colored::Colorize;

use crate::db::models::{ContentItem, ContentKind};
use crate::engine::recompute::RecomputeSummary;
use crate::scoring::quality::QualityBreakdown;

/// Display a ranked page of content in the terminal.
pub fn display_ranking(kind: ContentKind, items: &[ContentItem], skip: u32) {
    if items.is_empty() {
        println!("No {kind} items found. Create some with `curator create`.");
        return;
    }

    println!(
        "\n{}",
        format!("=== {} ranking ({} items) ===", kind, items.len()).bold()
    );
    println!();

    // Header
    println!(
        "  {:>5}  {:<28} {:>8}  {:>7}  {:>6}  {:>6}  {:<20}",
        "Rank".dimmed(),
        "Id".dimmed(),
        "Quality".dimmed(),
        "Views".dimmed(),
        "Likes".dimmed(),
        "Votes".dimmed(),
        "Author".dimmed(),
    );
    println!("  {}", "-".repeat(88).dimmed());

    for (i, item) in items.iter().enumerate() {
        println!(
            "  {:>4}.  {:<28} {:>8}  {:>7}  {:>6}  {:>6}  {:<20}",
            skip as usize + i + 1,
            super::truncate_chars(&item.id, 25),
            colorize_quality(item.content_quality),
            item.counters.views,
            item.counters.likes,
            item.counters.votes,
            super::truncate_chars(&item.author_id, 17),
        );
    }

    let flagged = items.iter().filter(|i| i.counters.abuse_reports > 0).count();
    if flagged > 0 {
        println!();
        println!("  {} {} item(s) with abuse reports", "!".bright_red(), flagged);
    }
}

/// Display the per-signal breakdown of one quality computation.
pub fn display_breakdown(item: &ContentItem, breakdown: &QualityBreakdown, half_life_days: i64) {
    println!(
        "\n{}",
        format!("=== Quality for {} {} ===", item.kind, item.id).bold()
    );
    println!("  Author: {}  Status: {}", item.author_id, item.status);
    println!();

    for s in &breakdown.signals {
        let line = format!(
            "    {:<14} sub-score {:.4}  x weight {:.2}  = {:.4}",
            s.signal.as_str(),
            s.sub_score,
            s.weight,
            s.sub_score * s.weight
        );
        if s.signal.is_penalty() && s.sub_score > 0.0 {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }

    println!();
    println!("  Bonus: {:.4}  Penalty: {:.4}  Net: {:.4}", breakdown.bonus, breakdown.penalty, breakdown.pre_decay);
    println!(
        "  Age: {:.1} days  Half-life: {} days  Decay: {:.4}",
        breakdown.age_days, half_life_days, breakdown.decay_factor
    );
    println!("  Quality: {}", colorize_quality(breakdown.quality));
    if (item.content_quality - breakdown.quality).abs() > 1e-9 {
        println!(
            "  {}",
            format!("Stored quality is {:.4}. Use --persist to update it.", item.content_quality).dimmed()
        );
    }
}

/// Display grouped counts, largest first.
pub fn display_counts(label: &str, counts: &HashMap<String, i64>) {
    if counts.is_empty() {
        println!("No matching items.");
        return;
    }

    let mut rows: Vec<(&String, &i64)> = counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    println!("\n{}", format!("=== Counts by {label} ===").bold());
    for (key, count) in rows {
        let count_str = if *count == 0 {
            count.to_string().dimmed().to_string()
        } else {
            count.to_string()
        };
        println!("  {:<40} {:>8}", super::truncate_chars(key, 37), count_str);
    }
}

pub fn display_recompute_summary(kind: ContentKind, summary: &RecomputeSummary) {
    println!(
        "{} {}: {} scanned, {} updated",
        "Recomputed".green().bold(),
        kind,
        summary.scanned,
        summary.updated
    );
    if summary.conflicts > 0 {
        println!(
            "  {} {} item(s) changed during the run and were skipped",
            "~".yellow(),
            summary.conflicts
        );
    }
    if summary.missing > 0 {
        println!("  {} {} item(s) deleted during the run", "~".yellow(), summary.missing);
    }
    if summary.invalid > 0 {
        println!("  {} {} item(s) could not be scored", "!".bright_red(), summary.invalid);
    }
}

/// Colorize a quality score by magnitude.
fn colorize_quality(quality: f64) -> colored::ColoredString {
    let text = format!("{quality:.4}");
    if quality >= 2.0 {
        text.green().bold()
    } else if quality >= 0.5 {
        text.green()
    } else if quality > 0.0 {
        text.normal()
    } else {
        text.dimmed()
    }
}
