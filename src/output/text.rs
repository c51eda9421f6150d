//! Human-readable run summary.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::dedupe::RunSummary;

/// Write a summary of `summary` to `writer`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> io::Result<()> {
    let title = if summary.dry_run {
        format!("Dry run of {}", summary.root.display())
    } else {
        format!("Deduplicated {}", summary.root.display())
    };
    writeln!(writer, "{}", title.bold())?;

    writeln!(writer, "  Directories:        {}", summary.directories)?;
    writeln!(
        writer,
        "  Files hashed:       {} ({})",
        summary.files_hashed,
        ByteSize::b(summary.bytes_hashed)
    )?;
    writeln!(writer, "  New canonicals:     {}", summary.canonicals)?;
    writeln!(writer, "  Already canonical:  {}", summary.already_canonical)?;

    let verb = if summary.dry_run { "would be reclaimed" } else { "reclaimed" };
    writeln!(
        writer,
        "  Linked duplicates:  {} ({} {})",
        summary.duplicates_linked.green(),
        ByteSize::b(summary.bytes_reclaimed),
        verb
    )?;
    writeln!(writer, "  Symlinks skipped:   {}", summary.skipped_symlinks)?;
    writeln!(writer, "  Duration:           {:.2?}", summary.duration)?;

    if summary.interrupted {
        writeln!(writer, "{}", "Interrupted before completion".yellow().bold())?;
    }

    if summary.has_issues() {
        writeln!(writer)?;
        writeln!(writer, "{} ({}):", "Issues".yellow().bold(), summary.issues.len())?;
        for issue in &summary.issues {
            if issue.is_data_loss() {
                writeln!(writer, "  [{}] {}", issue.kind().red().bold(), issue)?;
            } else {
                writeln!(writer, "  [{}] {}", issue.kind(), issue)?;
            }
        }
    }

    Ok(())
}
