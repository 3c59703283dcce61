//! Output formatting and styling module.
//!
//! All user-facing output goes through [`OutputFormatter`] so that styling
//! stays consistent: ✓ for success, ✗ for errors, ⚠ for warnings, a progress
//! bar while pages are written, and a summary table at the end.

use crate::archive_builder::{PackPlan, PackReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use make_cbz::output::OutputFormatter;
    /// OutputFormatter::success("Archive written");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for writing `total` archive entries.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use make_cbz::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(24);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints what a run would do, without doing it.
    pub fn plan_listing(plan: &PackPlan) {
        Self::dry_run_notice(&format!(
            "Would package {} into {}",
            plan.target.path.display(),
            plan.archive_path.display()
        ));

        Self::header("Images (archive order)");
        if plan.images.is_empty() {
            Self::plain("  (none)");
        }
        for image in &plan.images {
            println!("  {} {}", "+".green(), image.relative.display());
        }

        Self::header("Left in place");
        if plan.others.is_empty() && plan.unencodable.is_empty() {
            Self::plain("  (none)");
        }
        for other in &plan.others {
            println!(
                "  {} {} ({})",
                "=".blue(),
                other.relative.display(),
                other.classification.label()
            );
        }
        for path in &plan.unencodable {
            println!("  {} {} (name is not UTF-8)", "=".yellow(), path.display());
        }

        if !plan.sentinels.is_empty() {
            Self::header("Sentinel files to delete");
            for sentinel in &plan.sentinels {
                println!("  {} {}", "-".red(), sentinel.display());
            }
        }

        println!();
        Self::dry_run_notice(&format!(
            "Archive would end up at {}",
            plan.final_archive_path.display()
        ));
    }

    /// Prints a summary table for a completed run.
    pub fn summary_table(report: &PackReport) {
        Self::header("SUMMARY");

        let rows = [
            ("Images packed", report.entries.len()),
            ("Files left", report.files_left),
            ("Sentinels removed", report.sentinels_removed),
            ("Dirs pruned", report.dirs_pruned),
        ];
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            println!(
                "{:<width$} | {}",
                label,
                count.to_string().green(),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Archive".bold(),
            report.archive.display(),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
