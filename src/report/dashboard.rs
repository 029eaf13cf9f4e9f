//! HTML dashboard rendering.
//!
//! The dashboard is a single self-contained page: a header with totals and
//! a combined traffic sparkline, a card per active repository, and a compact
//! "crickets" section for repositories without activity.

use crate::analysis::aggregator::{partition_activity, rank};
use crate::models::{AggregateReport, RepoStats};

const VIEWS_COLOR: &str = "#c95d2e";
const CLONES_COLOR: &str = "#d4a03c";
const STARS_COLOR: &str = "#e8b923";
const FORKS_COLOR: &str = "#8b5a2b";

/// Size and colors of a sparkline.
#[derive(Debug, Clone, Copy)]
pub struct Sparkline {
    pub width: u32,
    pub height: u32,
    pub primary: &'static str,
    pub secondary: &'static str,
    /// Scale from the smallest value instead of zero.
    pub cumulative: bool,
}

impl Sparkline {
    fn traffic() -> Self {
        Self {
            width: 120,
            height: 32,
            primary: VIEWS_COLOR,
            secondary: CLONES_COLOR,
            cumulative: false,
        }
    }

    fn growth() -> Self {
        Self {
            primary: STARS_COLOR,
            secondary: FORKS_COLOR,
            cumulative: true,
            ..Self::traffic()
        }
    }

    fn header() -> Self {
        Self {
            width: 200,
            height: 40,
            ..Self::traffic()
        }
    }

    /// Render the primary series solid and the secondary series dashed.
    pub fn render(&self, primary: &[u64], secondary: &[u64]) -> String {
        let (w, h) = (self.width, self.height);

        if primary.is_empty() && secondary.is_empty() {
            return format!(
                r##"<svg viewBox="0 0 {w} {h}" class="sparkline"><text x="{}" y="{}" text-anchor="middle" fill="#999" font-size="10">no data</text></svg>"##,
                w / 2,
                h / 2 + 4
            );
        }

        let all = primary.iter().chain(secondary).copied();
        let max = all.clone().max().unwrap_or(0);
        if max == 0 {
            return format!(
                r##"<svg viewBox="0 0 {w} {h}" class="sparkline"><line x1="0" y1="{y}" x2="{w}" y2="{y}" stroke="#ddd" stroke-width="1"/></svg>"##,
                y = h.saturating_sub(4)
            );
        }

        let min = if self.cumulative {
            all.min().unwrap_or(0)
        } else {
            0
        };

        let mut svg = format!(r#"<svg viewBox="0 0 {w} {h}" class="sparkline">"#);
        if !primary.is_empty() {
            svg.push_str(&format!(
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="1.5" stroke-linecap="round" stroke-linejoin="round"/>"#,
                self.points(primary, min, max),
                self.primary
            ));
        }
        if !secondary.is_empty() {
            svg.push_str(&format!(
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="1.5" stroke-dasharray="3,2" stroke-linecap="round" stroke-linejoin="round"/>"#,
                self.points(secondary, min, max),
                self.secondary
            ));
        }
        svg.push_str("</svg>");
        svg
    }

    fn points(&self, series: &[u64], min: u64, max: u64) -> String {
        let width = f64::from(self.width);
        let height = f64::from(self.height);
        let range = if max == min { 1.0 } else { (max - min) as f64 };
        let step = width / series.len().saturating_sub(1).max(1) as f64;

        series
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let x = i as f64 * step;
                let y = height - 4.0 - ((value - min) as f64 / range) * (height - 8.0);
                format!("{:.1},{:.1}", x, y)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Format a count, abbreviating thousands (`1234` becomes `1.2k`).
pub fn format_number(n: u64) -> String {
    if n >= 1000 {
        format!("{:.1}k", n as f64 / 1000.0)
    } else {
        n.to_string()
    }
}

/// Escape text for HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn repo_card(repo: &RepoStats) -> String {
    let traffic = Sparkline::traffic().render(&repo.views_series, &repo.clones_series);
    let growth = Sparkline::growth().render(&repo.stars_series, &repo.forks_series);

    let growth_text = match repo.stars_growth {
        g if g > 0 => format!(r#"<span class="growth positive">+{} stars</span>"#, g),
        g if g < 0 => format!(r#"<span class="growth negative">{} stars</span>"#, g),
        _ => r#"<span class="neutral">—</span>"#.to_string(),
    };
    let name = escape_html(&repo.name);

    format!(
        r#"
    <a href="{name}/" class="card-link">
      <div class="card">
        <div class="card-header">
          <span class="repo-name">{name}</span>
          <span class="repo-stats">
            <span class="stat">⭐ {stars}</span>
            <span class="stat">🍴 {forks}</span>
          </span>
        </div>
        <div class="card-body">
          <div class="chart-section">
            <div class="chart-label">Traffic <span class="period">(14d)</span></div>
            {traffic}
            <div class="chart-stats">
              <span class="views">👁 {views}</span>
              <span class="clones">📋 {clones}</span>
            </div>
          </div>
          <div class="chart-section">
            <div class="chart-label">Growth <span class="period">(90d)</span></div>
            {growth}
            <div class="chart-stats">
              {growth_text}
            </div>
          </div>
        </div>
      </div>
    </a>
"#,
        stars = repo.stars,
        forks = repo.forks,
        views = format_number(repo.views_unique),
        clones = format_number(repo.clones_unique),
    )
}

fn cricket_card(repo: &RepoStats) -> String {
    let name = escape_html(&repo.name);
    format!(
        r#"
    <a href="{name}/" class="cricket-link">
      <div class="cricket-card">
        <span class="cricket-name">{name}</span>
        <span class="cricket-stats">⭐ {stars}</span>
        <span class="cricket-arrow">→</span>
      </div>
    </a>
"#,
        stars = repo.stars
    )
}

fn crickets_section(crickets: &[&RepoStats]) -> String {
    if crickets.is_empty() {
        return String::new();
    }

    let cards: Vec<String> = crickets.iter().map(|r| cricket_card(r)).collect();
    format!(
        r#"
    <div class="crickets-section">
      <h2 class="crickets-header">🦗 Crickets</h2>
      <div class="crickets-grid">
        {}
      </div>
    </div>
"#,
        cards.join("\n")
    )
}

const STYLE: &str = r#"
    :root {
      --cream: #f5f0e8;
      --card-bg: #faf7f2;
      --orange: #c95d2e;
      --mustard: #d4a03c;
      --brown: #3d2c29;
      --brown-light: #5d4c49;
      --shadow: rgba(61, 44, 41, 0.08);
      --shadow-hover: rgba(61, 44, 41, 0.15);
    }
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
      min-height: 100vh;
      background: var(--cream);
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
      color: var(--brown);
      line-height: 1.5;
    }
    .container { max-width: 1200px; margin: 0 auto; padding: 24px; }
    .dashboard-header {
      background: var(--card-bg);
      border-radius: 12px;
      padding: 24px 32px;
      margin-bottom: 32px;
      box-shadow: 0 2px 8px var(--shadow);
    }
    .header-title { font-size: 1.5rem; font-weight: 600; margin-bottom: 16px; }
    .header-stats { display: flex; flex-wrap: wrap; gap: 32px; align-items: flex-end; }
    .header-stat { display: flex; flex-direction: column; gap: 4px; }
    .header-stat-value { font-size: 1.75rem; font-weight: 700; color: var(--orange); }
    .header-stat-label { font-size: 0.85rem; color: var(--brown-light); }
    .header-sparkline { flex: 1; min-width: 200px; display: flex; flex-direction: column; gap: 4px; }
    .header-sparkline .sparkline { width: 100%; height: 40px; }
    .cards-grid { display: grid; grid-template-columns: repeat(2, 1fr); gap: 24px; margin-bottom: 48px; }
    @media (max-width: 900px) { .cards-grid { grid-template-columns: 1fr; } }
    .card-link, .cricket-link { text-decoration: none; color: inherit; }
    .card {
      background: var(--card-bg);
      border-radius: 12px;
      padding: 20px 24px;
      box-shadow: 0 2px 8px var(--shadow);
      transition: transform 0.15s ease, box-shadow 0.15s ease;
    }
    .card:hover { transform: translateY(-2px); box-shadow: 0 4px 16px var(--shadow-hover); }
    .card-header {
      display: flex;
      justify-content: space-between;
      align-items: center;
      margin-bottom: 16px;
      padding-bottom: 12px;
      border-bottom: 1px solid rgba(61, 44, 41, 0.1);
    }
    .repo-name { font-size: 1.1rem; font-weight: 600; }
    .repo-stats { display: flex; gap: 12px; }
    .stat { font-size: 0.9rem; color: var(--brown-light); }
    .card-body { display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }
    .chart-section { display: flex; flex-direction: column; gap: 6px; }
    .chart-label {
      font-size: 0.75rem;
      font-weight: 600;
      text-transform: uppercase;
      letter-spacing: 0.5px;
      color: var(--brown-light);
    }
    .chart-label .period { font-weight: 400; opacity: 0.7; }
    .sparkline { width: 100%; height: 32px; }
    .chart-stats { display: flex; gap: 12px; font-size: 0.85rem; }
    .views { color: var(--orange); }
    .clones { color: var(--mustard); }
    .growth.positive { color: #2e8b57; }
    .growth.negative { color: var(--orange); }
    .neutral { color: #999; }
    .crickets-section { margin-top: 48px; padding-top: 32px; border-top: 1px dashed rgba(61, 44, 41, 0.2); }
    .crickets-header { font-size: 1rem; font-weight: 500; color: var(--brown-light); margin-bottom: 16px; opacity: 0.7; }
    .crickets-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 12px; }
    @media (max-width: 768px) { .crickets-grid { grid-template-columns: repeat(2, 1fr); } }
    @media (max-width: 480px) { .crickets-grid { grid-template-columns: 1fr; } }
    .cricket-card {
      background: var(--card-bg);
      border-radius: 8px;
      padding: 12px 16px;
      display: flex;
      align-items: center;
      gap: 8px;
      box-shadow: 0 1px 4px var(--shadow);
      opacity: 0.75;
    }
    .cricket-card:hover { opacity: 1; }
    .cricket-name { flex: 1; font-size: 0.9rem; font-weight: 500; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
    .cricket-stats { font-size: 0.8rem; color: var(--brown-light); }
    .cricket-arrow { color: var(--orange); opacity: 0.5; }
    .dashboard-footer { text-align: center; padding: 24px; font-size: 0.8rem; color: var(--brown-light); opacity: 0.6; }
"#;

/// Render the full dashboard page.
pub fn render_dashboard(report: &AggregateReport) -> String {
    let ranked = rank(&report.repos);
    let (active, crickets) = partition_activity(&ranked);

    let cards: Vec<String> = active.iter().map(|r| repo_card(r)).collect();
    let traffic = Sparkline::header().render(&report.traffic_views, &report.traffic_clones);
    let totals = &report.totals;
    let title = escape_html(&report.title);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <style>{STYLE}  </style>
</head>
<body>
  <div class="container">
    <div class="dashboard-header">
      <h1 class="header-title">{title}</h1>
      <div class="header-stats">
        <div class="header-stat">
          <span class="header-stat-value">{stars}</span>
          <span class="header-stat-label">total stars</span>
        </div>
        <div class="header-stat">
          <span class="header-stat-value">{forks}</span>
          <span class="header-stat-label">total forks</span>
        </div>
        <div class="header-stat">
          <span class="header-stat-value">{views}</span>
          <span class="header-stat-label">views (14d)</span>
        </div>
        <div class="header-stat">
          <span class="header-stat-value">{clones}</span>
          <span class="header-stat-label">clones (14d)</span>
        </div>
        <div class="header-sparkline">
          <span class="header-stat-label">traffic trend</span>
          {traffic}
        </div>
      </div>
    </div>

    <div class="cards-grid">
      {cards}
    </div>
{crickets}
    <div class="dashboard-footer">
      Last updated: {updated} · {count} repositories
    </div>
  </div>
</body>
</html>
"#,
        stars = totals.stars,
        forks = totals.forks,
        views = format_number(totals.views_unique),
        clones = format_number(totals.clones_unique),
        cards = cards.join("\n"),
        crickets = crickets_section(&crickets),
        updated = report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        count = report.repos.len(),
    )
}
