//! Report generator.
//!
//! Renders an [`AnalyticsBundle`] into one self-contained HTML file: one page
//! per section, print page breaks between them, tables built from each
//! record's column layout and inline SVG bar charts. Sections whose table is
//! missing get a "no data" panel instead.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::config::ReportConfig;
use crate::ingest::DatasetProfile;
use crate::pipeline::{AnalyticsBundle, Slot};
use crate::storage::{Record, Table, Value};

/// Rows shown per table before truncation.
pub const DEFAULT_MAX_ROWS: usize = 20;

const CHART_WIDTH: f64 = 560.0;
const BAR_HEIGHT: f64 = 18.0;
const BAR_GAP: f64 = 6.0;
const LABEL_WIDTH: f64 = 140.0;

/// Errors that can occur while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report directory {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Renders and writes bundle reports.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    title: String,
    output_dir: PathBuf,
    max_rows: usize,
}

impl ReportGenerator {
    pub fn new(title: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            output_dir: output_dir.into(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    pub fn from_config(config: &ReportConfig, output_dir: PathBuf) -> Self {
        Self::new(config.title.clone(), output_dir)
    }

    /// Path of the report generated at `at`.
    pub fn report_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.output_dir
            .join(format!("report_{}.html", at.format("%Y%m%d_%H%M%S")))
    }

    /// Path of the quality report for the raw table `dataset`.
    pub fn dataset_report_path(&self, dataset: &str, at: DateTime<Utc>) -> PathBuf {
        self.output_dir.join(format!(
            "dataset_{}_{}.html",
            dataset,
            at.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Render and write the report, returning its path.
    pub fn write(&self, bundle: &AnalyticsBundle) -> Result<PathBuf, ReportError> {
        self.ensure_output_dir()?;

        let now = Utc::now();
        let path = self.report_path(now);
        fs::write(&path, self.render(bundle, now))?;

        info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Write the one-page quality report of a raw table.
    pub fn write_dataset_profile(&self, profile: &DatasetProfile) -> Result<PathBuf, ReportError> {
        self.ensure_output_dir()?;

        let now = Utc::now();
        let path = self.dataset_report_path(&profile.name, now);
        fs::write(&path, self.render_dataset_profile(profile, now))?;

        info!("Dataset report for {} written to {}", profile.name, path.display());
        Ok(path)
    }

    fn ensure_output_dir(&self) -> Result<(), ReportError> {
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(ReportError::NotADirectory(self.output_dir.clone()));
        }
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Shape, duplicates and missing values of one raw table.
    pub fn render_dataset_profile(
        &self,
        profile: &DatasetProfile,
        generated_at: DateTime<Utc>,
    ) -> String {
        let mut body = format!(
            r#"<h1>Dataset: {name}</h1>
        <p class="meta">Generated {at}</p>
        <table>
            <tbody>
                <tr><th>Rows</th><td class="num">{rows}</td></tr>
                <tr><th>Columns</th><td class="num">{columns}</td></tr>
                <tr><th>Duplicate rows</th><td class="num">{duplicates}</td></tr>
            </tbody>
        </table>
        <h2>Missing values</h2>
"#,
            name = escape(&profile.name),
            at = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            rows = profile.rows,
            columns = profile.columns,
            duplicates = profile.duplicate_rows,
        );
        if profile.missing_values.is_empty() {
            body.push_str("        <p>No missing values.</p>");
        } else {
            body.push_str(
                "        <table>\n            <thead><tr><th>Column</th><th>Missing</th></tr></thead>\n            <tbody>\n",
            );
            for (column, count) in &profile.missing_values {
                let _ = writeln!(
                    body,
                    "                <tr><td>{}</td><td class=\"num\">{}</td></tr>",
                    escape(column),
                    count
                );
            }
            body.push_str("            </tbody>\n        </table>");
        }

        let mut html = self.head();
        html.push_str("<body>\n");
        html.push_str(&page("dataset", &body));
        html.push_str("</body>\n</html>\n");
        html
    }

    /// The full HTML document.
    pub fn render(&self, bundle: &AnalyticsBundle, generated_at: DateTime<Utc>) -> String {
        let pages = [
            self.cover_page(bundle, generated_at),
            self.summary_page(bundle),
            self.rankings_page(bundle),
            self.breakdown_page(bundle),
            self.charts_page(bundle),
            self.attributes_page(bundle),
            self.conclusions_page(bundle),
        ];

        let mut html = String::new();
        html.push_str(&self.head());
        html.push_str("<body>\n");
        for page in pages {
            html.push_str(&page);
        }
        html.push_str("</body>\n</html>\n");
        html
    }

    fn head(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
"#,
            title = escape(&self.title),
            css = CSS,
        )
    }

    fn cover_page(&self, bundle: &AnalyticsBundle, generated_at: DateTime<Utc>) -> String {
        let status = if bundle.is_complete() {
            "All derived tables are available.".to_string()
        } else {
            format!(
                "{} of {} derived tables are missing.",
                bundle.missing().len(),
                bundle.states().len()
            )
        };
        page(
            "cover",
            &format!(
                r#"<h1>{}</h1>
        <p class="meta">Generated {}</p>
        <p>{}</p>"#,
                escape(&self.title),
                generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                status
            ),
        )
    }

    fn summary_page(&self, bundle: &AnalyticsBundle) -> String {
        let mut body = String::from(
            r#"<h1>Summary</h1>
        <p>Derived tables produced by the last pipeline run.</p>
        <table>
            <thead><tr><th>Table</th><th>State</th><th>Rows</th></tr></thead>
            <tbody>
"#,
        );
        for ((name, state), rows) in bundle.states().into_iter().zip(row_counts(bundle)) {
            let _ = writeln!(
                body,
                "                <tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                name,
                state.as_str(),
                rows.map_or_else(|| "-".to_string(), |n| n.to_string())
            );
        }
        body.push_str("            </tbody>\n        </table>");
        page("summary", &body)
    }

    fn rankings_page(&self, bundle: &AnalyticsBundle) -> String {
        let body = [
            self.section("Top entities by wins", &bundle.top_wins),
            self.section("Top entities by losses", &bundle.top_losses),
            self.section("Top entities by win rate", &bundle.top_win_rate),
        ]
        .join("\n");
        page("rankings", &body)
    }

    fn breakdown_page(&self, bundle: &AnalyticsBundle) -> String {
        let body = [
            self.section("Category ranking by mean win rate", &bundle.category_ranking),
            self.section(
                "Correlation between attributes and wins",
                &bundle.attribute_win_correlation,
            ),
            self.section("Win rate distribution", &bundle.win_rate_distribution),
        ]
        .join("\n");
        page("breakdown", &body)
    }

    fn charts_page(&self, bundle: &AnalyticsBundle) -> String {
        let wins = bundle.top_wins.rows().map(|rows| {
            rows.iter()
                .map(|s| (s.name.clone(), f64::from(s.wins)))
                .collect::<Vec<_>>()
        });
        let categories = bundle.category_ranking.rows().map(|rows| {
            rows.iter()
                .map(|c| (c.category.clone(), c.mean_win_rate * 100.0))
                .collect::<Vec<_>>()
        });
        let correlations = bundle.attribute_win_correlation.rows().map(|rows| {
            rows.iter()
                .filter_map(|c| c.correlation.map(|r| (c.attribute.clone(), r)))
                .collect::<Vec<_>>()
        });
        let distribution = bundle.win_rate_distribution.rows().map(|rows| {
            rows.iter()
                .map(|b| (b.label.clone(), b.percentage))
                .collect::<Vec<_>>()
        });
        let differences = bundle.attribute_comparison.rows().map(|rows| {
            rows.iter()
                .map(|c| (c.attribute.clone(), c.difference))
                .collect::<Vec<_>>()
        });

        let charts = [
            ("Wins of the top entities", wins),
            ("Mean win rate per category (%)", categories),
            ("Attribute correlation with wins", correlations),
            ("Share of entities per win-rate bucket (%)", distribution),
            ("Attribute difference, top winners vs population", differences),
        ];

        let mut body = String::from("<h1>Charts</h1>\n");
        for (title, bars) in charts {
            let _ = writeln!(body, "        <h2>{}</h2>", escape(title));
            match bars {
                Some(bars) if !bars.is_empty() => body.push_str(&bar_chart(&bars)),
                _ => body.push_str(NO_DATA),
            }
            body.push('\n');
        }
        page("charts", &body)
    }

    fn attributes_page(&self, bundle: &AnalyticsBundle) -> String {
        let body = [
            self.section(
                "Attribute comparison, top winners vs population",
                &bundle.attribute_comparison,
            ),
            self.section("Attributes of the top winners", &bundle.top_winner_attributes),
        ]
        .join("\n");
        page("attributes", &body)
    }

    fn conclusions_page(&self, bundle: &AnalyticsBundle) -> String {
        let mut findings = Vec::new();
        if let Some(best) = bundle.top_win_rate.rows().and_then(|rows| rows.first()) {
            findings.push(format!(
                "{} has the highest win rate at {:.2}% over {} contests.",
                escape(&best.name),
                best.win_rate,
                best.participations
            ));
        }
        if let Some(category) = bundle.category_ranking.rows().and_then(|rows| rows.first()) {
            findings.push(format!(
                "{} is the strongest category with a mean win rate of {:.2}%.",
                escape(&category.category),
                category.mean_win_rate * 100.0
            ));
        }
        if let Some(attribute) = bundle
            .attribute_win_correlation
            .rows()
            .and_then(|rows| rows.first())
            .filter(|c| c.correlation.is_some())
        {
            findings.push(format!(
                "{} correlates most strongly with wins (r = {:.3}).",
                escape(&attribute.attribute),
                attribute.correlation.unwrap_or_default()
            ));
        }

        let mut body = String::from("<h1>Conclusions</h1>\n");
        if findings.is_empty() {
            body.push_str(NO_DATA);
        } else {
            body.push_str("        <ul>\n");
            for finding in findings {
                let _ = writeln!(body, "            <li>{}</li>", finding);
            }
            body.push_str("        </ul>");
        }
        page("conclusions", &body)
    }

    fn section<R: Record>(&self, title: &str, slot: &Slot<R>) -> String {
        let content = match slot.rows() {
            Some(rows) => table_html(rows, self.max_rows),
            None => NO_DATA.to_string(),
        };
        format!(
            "        <section>\n        <h2>{}</h2>\n{}\n        </section>",
            escape(title),
            content
        )
    }
}

const NO_DATA: &str = r#"        <div class="no-data">No data available for this section.</div>"#;

const CSS: &str = r#"
body { font-family: Helvetica, Arial, sans-serif; color: #222; margin: 0; }
.page { padding: 2.5rem 3rem; min-height: 90vh; page-break-after: always; break-after: page; }
.page:last-child { page-break-after: auto; break-after: auto; }
.cover { display: flex; flex-direction: column; justify-content: center; text-align: center; }
.meta { color: #666; }
h1 { border-bottom: 2px solid #3b5998; padding-bottom: 0.3rem; }
table { border-collapse: collapse; margin: 0.5rem 0 1.5rem; font-size: 0.9rem; }
th { background: #e6e9f0; }
th, td { border: 1px solid #999; padding: 0.25rem 0.6rem; text-align: left; }
td.num { text-align: right; }
.no-data { border: 1px dashed #bbb; color: #777; padding: 1rem; margin: 0.5rem 0 1.5rem; }
svg text { font-size: 11px; fill: #333; }
@media print { .page { min-height: auto; } }
"#;

fn page(class: &str, body: &str) -> String {
    format!(
        "    <div class=\"page {}\">\n        {}\n    </div>\n",
        class, body
    )
}

fn row_counts(bundle: &AnalyticsBundle) -> Vec<Option<usize>> {
    fn count<R>(slot: &Slot<R>) -> Option<usize> {
        slot.rows().map(<[R]>::len)
    }
    vec![
        count(&bundle.outcomes_named),
        count(&bundle.entity_stats),
        count(&bundle.top_wins),
        count(&bundle.top_losses),
        count(&bundle.top_win_rate),
        count(&bundle.top_winner_attributes),
        count(&bundle.attribute_comparison),
        count(&bundle.attribute_win_correlation),
        count(&bundle.win_rate_distribution),
        count(&bundle.category_ranking),
    ]
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn cell(value: &Value) -> (String, bool) {
    match value {
        Value::Null => ("-".to_string(), false),
        Value::Integer(i) => (i.to_string(), true),
        Value::Real(f) => (format!("{:.2}", f), true),
        Value::Text(s) => (escape(s), false),
        Value::Boolean(b) => (if *b { "yes" } else { "no" }.to_string(), false),
    }
}

/// A table of the first `max_rows` records, with a note when truncated.
fn table_html<R: Record>(rows: &[R], max_rows: usize) -> String {
    if rows.is_empty() {
        return r#"        <div class="no-data">The table is empty.</div>"#.to_string();
    }
    let table = Table::from_records(&rows[..rows.len().min(max_rows)]);

    let mut html = String::from("        <table>\n            <thead><tr>");
    for column in &table.columns {
        let _ = write!(html, "<th>{}</th>", escape(&column.name));
    }
    html.push_str("</tr></thead>\n            <tbody>\n");
    for row in &table.rows {
        html.push_str("                <tr>");
        for value in row {
            let (text, numeric) = cell(value);
            if numeric {
                let _ = write!(html, "<td class=\"num\">{}</td>", text);
            } else {
                let _ = write!(html, "<td>{}</td>", text);
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("            </tbody>\n        </table>");
    if rows.len() > max_rows {
        let _ = write!(
            html,
            "\n        <p class=\"meta\">Showing {} of {} rows.</p>",
            max_rows,
            rows.len()
        );
    }
    html
}

/// Horizontal bar chart. Negative values extend left of a zero axis.
fn bar_chart(bars: &[(String, f64)]) -> String {
    let max_pos = bars.iter().map(|(_, v)| v.max(0.0)).fold(0.0, f64::max);
    let max_neg = bars.iter().map(|(_, v)| (-v).max(0.0)).fold(0.0, f64::max);
    let span = max_pos + max_neg;
    let plot_width = CHART_WIDTH - LABEL_WIDTH - 60.0;
    let scale = if span > 0.0 { plot_width / span } else { 0.0 };
    let zero_x = LABEL_WIDTH + max_neg * scale;
    let height = bars.len() as f64 * (BAR_HEIGHT + BAR_GAP) + BAR_GAP;

    let mut svg = format!(
        r#"        <svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = CHART_WIDTH,
        h = height
    );
    svg.push('\n');
    for (i, (label, value)) in bars.iter().enumerate() {
        let y = BAR_GAP + i as f64 * (BAR_HEIGHT + BAR_GAP);
        let width = value.abs() * scale;
        let x = if *value < 0.0 { zero_x - width } else { zero_x };
        let fill = if *value < 0.0 { "#c0504d" } else { "#3b5998" };
        let text_y = y + BAR_HEIGHT * 0.75;
        let value_x = (if *value < 0.0 { zero_x } else { zero_x + width }) + 4.0;
        let _ = writeln!(
            svg,
            r#"            <text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            LABEL_WIDTH - 6.0,
            text_y,
            escape(label)
        );
        let _ = writeln!(
            svg,
            r#"            <rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            x, y, width, BAR_HEIGHT, fill
        );
        let _ = writeln!(
            svg,
            r#"            <text x="{:.1}" y="{:.1}">{:.2}</text>"#,
            value_x,
            text_y,
            value
        );
    }
    let _ = writeln!(
        svg,
        r##"            <line x1="{x:.1}" y1="0" x2="{x:.1}" y2="{h:.1}" stroke="#666"/>"##,
        x = zero_x,
        h = height
    );
    svg.push_str("        </svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::sample_bundle;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_report_path_uses_timestamp() {
        let generator = ReportGenerator::new("Arena", "/tmp/reports");
        assert_eq!(
            generator.report_path(fixed_time()),
            PathBuf::from("/tmp/reports/report_20260314_093000.html")
        );
    }

    #[test]
    fn test_render_has_one_page_per_section() {
        let html = ReportGenerator::new("Arena", "/tmp").render(&sample_bundle(), fixed_time());

        assert_eq!(html.matches("class=\"page ").count(), 7);
        assert!(html.contains("Generated 2026-03-14 09:30:00 UTC"));
        assert!(html.contains("All derived tables are available."));
        assert!(html.contains("page-break-after: always"));
        assert_eq!(html.matches("<svg").count(), 5);
    }

    #[test]
    fn test_missing_sections_render_no_data() {
        let html =
            ReportGenerator::new("Arena", "/tmp").render(&AnalyticsBundle::default(), fixed_time());

        assert!(html.contains("10 of 10 derived tables are missing."));
        assert!(!html.contains("<svg"));
        // 8 table sections, 5 charts and the conclusions
        assert_eq!(html.matches("No data available").count(), 14);
    }

    #[test]
    fn test_table_truncates_rows() {
        let bundle = sample_bundle();
        let html = table_html(bundle.entity_stats.rows().unwrap(), 2);

        assert_eq!(html.matches("<tr>").count(), 3);
        assert!(html.contains("Showing 2 of 3 rows."));
        assert!(html.contains("<th>win_rate</th>"));
        assert!(html.contains("<td class=\"num\">66.67</td>"));
    }

    #[test]
    fn test_conclusions_name_the_leaders() {
        let html = ReportGenerator::new("Arena", "/tmp").render(&sample_bundle(), fixed_time());

        assert!(html.contains("A has the highest win rate at 66.67% over 3 contests."));
        assert!(html.contains("Water is the strongest category with a mean win rate of 50.00%."));
        assert!(html.contains("attack correlates most strongly with wins (r = 1.000)."));
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<Mr. Mime & \"Farfetch'd\">"),
            "&lt;Mr. Mime &amp; &quot;Farfetch&#39;d&quot;&gt;"
        );
    }

    #[test]
    fn test_bar_chart_with_negative_values() {
        let svg = bar_chart(&[("hp".to_string(), 0.5), ("speed".to_string(), -0.5)]);

        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains("#c0504d"));
        assert!(svg.contains(">-0.50<"));
    }

    #[test]
    fn test_write_creates_report_file() {
        let temp = TempDir::new().unwrap();
        let generator = ReportGenerator::new("Arena", temp.path().join("report"));

        let path = generator.write(&sample_bundle()).unwrap();

        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("report_"));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("<!DOCTYPE html>"));
    }

    fn profile(missing_values: Vec<(String, usize)>) -> DatasetProfile {
        DatasetProfile {
            name: "outcomes".to_string(),
            rows: 12,
            columns: 3,
            duplicate_rows: 2,
            missing_values,
        }
    }

    #[test]
    fn test_dataset_report_lists_shape_and_duplicates() {
        let generator = ReportGenerator::new("Arena", "/tmp/reports");
        let html = generator.render_dataset_profile(&profile(Vec::new()), fixed_time());

        assert_eq!(html.matches("class=\"page ").count(), 1);
        assert!(html.contains("<h1>Dataset: outcomes</h1>"));
        assert!(html.contains("<tr><th>Rows</th><td class=\"num\">12</td></tr>"));
        assert!(html.contains("<tr><th>Columns</th><td class=\"num\">3</td></tr>"));
        assert!(html.contains("<tr><th>Duplicate rows</th><td class=\"num\">2</td></tr>"));
        assert!(html.contains("No missing values."));
        assert_eq!(
            generator.dataset_report_path("outcomes", fixed_time()),
            PathBuf::from("/tmp/reports/dataset_outcomes_20260314_093000.html")
        );
    }

    #[test]
    fn test_dataset_report_lists_missing_columns() {
        let html = ReportGenerator::new("Arena", "/tmp").render_dataset_profile(
            &profile(vec![("category".to_string(), 4)]),
            fixed_time(),
        );

        assert!(!html.contains("No missing values."));
        assert!(html.contains("<tr><td>category</td><td class=\"num\">4</td></tr>"));
    }

    #[test]
    fn test_write_dataset_profile_from_ingest() {
        use crate::ingest::store_raw;
        use crate::models::{fixtures::entity, OutcomeEvent};
        use crate::storage::TableStore;

        let temp = TempDir::new().unwrap();
        let generator = ReportGenerator::new("Arena", temp.path().join("report"));
        let outcome = OutcomeEvent {
            first_id: 1,
            second_id: 2,
            winner_id: 1,
        };
        let report = store_raw(
            &TableStore::in_memory(),
            &[entity(1, "A", 10, Some("Fire")), entity(2, "B", 20, Some("Water"))],
            vec![outcome.clone(), outcome],
        )
        .unwrap();

        let path = generator.write_dataset_profile(&report.outcomes).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dataset_outcomes_"));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("<tr><th>Rows</th><td class=\"num\">2</td></tr>"));
        assert!(contents.contains("<tr><th>Duplicate rows</th><td class=\"num\">1</td></tr>"));
    }

    #[test]
    fn test_write_rejects_file_as_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("taken");
        fs::write(&file, "x").unwrap();

        let generator = ReportGenerator::new("Arena", &file);
        assert!(matches!(
            generator.write(&sample_bundle()),
            Err(ReportError::NotADirectory(_))
        ));
        assert!(matches!(
            generator.write_dataset_profile(&profile(Vec::new())),
            Err(ReportError::NotADirectory(_))
        ));
    }
}
