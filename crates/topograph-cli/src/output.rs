//! Terminal output formatting.

use colored::Colorize;
use topograph_graph::{GraphCounts, SyncResult};

/// Print the outcome of a sync pass.
pub fn print_sync_result(result: &SyncResult) {
    let headline = if result.is_success() {
        "Sync complete:".green().bold()
    } else {
        "Sync finished with failures:".red().bold()
    };
    println!("\n{}", headline);
    println!("  Nodes removed:          {}", result.nodes_removed);
    println!(
        "  Nodes created/matched:  {}/{}",
        result.nodes_created.to_string().cyan(),
        result.nodes_matched
    );
    println!(
        "  Relationships created/matched: {}/{}",
        result.relationships_created.to_string().cyan(),
        result.relationships_matched
    );
    if let Some(ms) = result.duration_ms() {
        println!("  Duration:               {} ms", ms);
    }

    if !result.skips.is_empty() {
        println!("\n{} ({}):", "Skipped, device not in graph".yellow().bold(), result.skips.len());
        for skip in &result.skips {
            println!(
                "  {} {} {}",
                "•".dimmed(),
                skip.entity,
                format!("(missing {})", skip.missing_devices.join(", ")).dimmed()
            );
        }
    }

    if !result.failures.is_empty() {
        println!("\n{} ({}):", "Failed".red().bold(), result.failures.len());
        for failure in &result.failures {
            println!("  {} {}: {}", "✗".red(), failure.entity, failure.cause.dimmed());
        }
    }
}

/// Print node/relationship counts.
pub fn print_counts(counts: &GraphCounts) {
    println!("{}", "Topology Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  Nodes:         {}", counts.nodes.to_string().cyan());
    println!("  Relationships: {}", counts.relationships.to_string().cyan());
    println!("{}", "─".repeat(40));
}
