//! Colored console output for detection results.

use crate::types::{DownloadStatus, MatchReport, RuleKind, RunReport, SimilarityScore};
use colored::Colorize;

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    verbose: bool,
    json_mode: bool,
    quiet: bool,
}

impl ConsoleOutput {
    pub fn new(verbose: bool, json_mode: bool, quiet: bool) -> Self {
        Self { verbose, json_mode, quiet }
    }

    /// True if progress bars may be drawn.
    pub fn shows_progress(&self) -> bool {
        !self.json_mode && !self.quiet
    }

    /// Print run start message.
    pub fn print_run_start(&self, check_days: u32, most_popular: usize) {
        if self.json_mode || self.quiet {
            return;
        }

        println!(
            "{} Checking crates updated in the last {} days against the top {}",
            "[*]".bright_blue(),
            check_days.to_string().bright_white(),
            most_popular.to_string().bright_white()
        );
    }

    /// Print progress (only in verbose mode).
    pub fn print_progress(&self, message: &str) {
        if self.json_mode || !self.verbose {
            return;
        }

        println!("{} {}", "[.]".dimmed(), message.dimmed());
    }

    /// Print a reported match.
    pub fn print_match(&self, report: &MatchReport) {
        if self.json_mode {
            return;
        }

        if self.quiet {
            println!("{} -> {}", report.candidate, report.target);
            return;
        }

        println!();
        println!(
            "{} {} looks like {} [{}]",
            "===".bright_cyan(),
            report.candidate.bright_white().bold(),
            report.target.bright_white(),
            format_rule(report.rule)
        );
        println!("    |-- Target rank:  #{}", report.target_rank);
        println!("    |-- Owners:       {}", report.candidate_owners.join(", "));
        println!("    |-- Version:      {}", format_version(report.candidate_version.as_deref()));
        println!("    |-- Downloads:    {}", report.candidate_downloads);
        println!("    |-- Description:  {}", format_similarity(report.similarity.as_ref()));
        println!("    +-- Archive:      {}", format_download(&report.download));
    }

    /// Print run summary.
    pub fn print_summary(&self, report: &RunReport) {
        if self.json_mode {
            if let Ok(json) = serde_json::to_string_pretty(report) {
                println!("{}", json);
            }
            return;
        }

        if self.quiet {
            return;
        }

        let suspicious = report.suspicious_candidates().len();

        println!();
        println!("{}", "=== Run Summary ===".bright_cyan());
        println!("  Window:      {} days", report.check_days);
        println!("  Duration:    {:.2}s", report.duration_secs);
        println!("  Popular:     {}", report.popular_count);
        println!("  Recent:      {}", report.recent_count);
        println!("  Name hits:   {}", report.raw_matches);

        if suspicious > 0 {
            println!(
                "  {}",
                format!("POTENTIAL TYPOSQUATS FOUND: {}", suspicious).red().bold()
            );
        } else {
            println!("  {}", "No typosquatting candidates found.".green());
        }

        if !report.errors.is_empty() {
            println!();
            println!("{}", "Errors encountered:".yellow());
            for error in &report.errors {
                println!("  - {}", error.dimmed());
            }
        }

        println!();
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}

/// Format a rule kind with color; bit flips stand out.
fn format_rule(rule: RuleKind) -> colored::ColoredString {
    match rule {
        RuleKind::BitFlip => rule.as_str().on_red().white().bold(),
        RuleKind::Homoglyph => rule.as_str().red().bold(),
        _ => rule.as_str().yellow(),
    }
}

pub fn format_similarity(score: Option<&SimilarityScore>) -> String {
    match score {
        Some(SimilarityScore::Semantic { score }) => format!("semantic score {:.3}", score),
        Some(SimilarityScore::EditDistance { distance, normalized }) => {
            format!("edit distance {} ({:.3})", distance, normalized)
        }
        Some(SimilarityScore::OneSidedBlank) => "one description is blank".to_string(),
        None => "not scored".to_string(),
    }
}

pub fn format_version(version: Option<&str>) -> &str {
    version.unwrap_or("unknown")
}

pub fn format_download(status: &DownloadStatus) -> String {
    match status {
        DownloadStatus::Downloaded(artifact) => {
            format!("{} ({}) sha256:{}", artifact.path, artifact.version, artifact.sha256)
        }
        DownloadStatus::NoVersions => "no versions available".to_string(),
        DownloadStatus::Failed { error } => format!("download failed: {}", error),
        DownloadStatus::Skipped => "not downloaded".to_string(),
    }
}
