//! Markdown and JSON summaries.
//!
//! The Markdown summary is published as `README.md` next to the dashboard,
//! so the artifact store renders a readable overview on GitHub.

use super::dashboard::format_number;
use crate::analysis::aggregator::rank;
use crate::models::{AggregateReport, RepoStats};
use anyhow::Result;

/// Generate the Markdown summary.
pub fn generate_markdown_report(report: &AggregateReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", report.title));
    output.push_str(&generate_totals_section(report));
    output.push_str(&generate_repos_section(report));
    output.push_str(&generate_crickets_section(report));
    output.push_str(&generate_footer(report));

    output
}

/// Generate the totals table.
fn generate_totals_section(report: &AggregateReport) -> String {
    let mut section = String::new();
    let totals = &report.totals;

    section.push_str("## Totals\n\n");
    section.push_str("| ⭐ Stars | 🍴 Forks | 👁 Views (14d) | 📋 Clones (14d) |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        totals.stars,
        totals.forks,
        format_number(totals.views_unique),
        format_number(totals.clones_unique)
    ));

    section
}

/// Generate the table of active repositories, ranked like the dashboard.
fn generate_repos_section(report: &AggregateReport) -> String {
    let ranked = rank(&report.repos);
    let active: Vec<&RepoStats> = ranked.into_iter().filter(|r| r.has_activity).collect();

    if active.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Repositories\n\n");
    section.push_str("| Repository | Stars | Forks | Views | Clones | Stars (90d) |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");

    for repo in active {
        section.push_str(&format!(
            "| [{}]({}/) | {} | {} | {} | {} | {} |\n",
            repo.full_name,
            repo.name,
            repo.stars,
            repo.forks,
            format_number(repo.views_unique),
            format_number(repo.clones_unique),
            growth_label(repo.stars_growth)
        ));
    }
    section.push('\n');

    section
}

/// Generate the list of repositories without activity.
fn generate_crickets_section(report: &AggregateReport) -> String {
    if report.crickets.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## 🦗 Crickets\n\n");
    for name in &report.crickets {
        section.push_str(&format!("- {}\n", name));
    }
    section.push('\n');

    section
}

fn generate_footer(report: &AggregateReport) -> String {
    format!(
        "---\n\n*Last updated: {} · {} repositories*\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.repos.len()
    )
}

fn growth_label(growth: i64) -> String {
    match growth {
        g if g > 0 => format!("+{}", g),
        0 => "-".to_string(),
        g => g.to_string(),
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AggregateReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
