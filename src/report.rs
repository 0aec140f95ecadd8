use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate::{count_by_category, melt_latest_snapshot, CategoryCount, SeriesPoint};
use crate::currency::format_currency;
use crate::error::DashboardResult;
use crate::models::{FieldValue, FinancialSnapshot, LeadSnapshot, Record, Task};

const BAR_WIDTH: usize = 30;

/// Currency for real-valued columns, plain text for everything else.
pub fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Real(amount) => format_currency(*amount),
        other => other.to_string(),
    }
}

/// Plain-text horizontal bars, one line per (label, value) pair.
pub fn render_bars(points: &[(String, f64)]) -> Vec<String> {
    let label_width = points.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let bar_width = BAR_WIDTH;
    let max = points
        .iter()
        .map(|(_, value)| *value)
        .fold(0.0_f64, f64::max);

    points
        .iter()
        .map(|(label, value)| {
            let filled = if max > 0.0 && *value > 0.0 {
                ((value / max) * bar_width as f64).round().max(1.0) as usize
            } else {
                0
            };
            format!(
                "{label:<label_width$}  {:<bar_width$}  {}",
                "#".repeat(filled),
                trim_number(*value)
            )
        })
        .collect()
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn write_table<R: Record>(output: &mut String, rows: &[R]) {
    let header: Vec<&str> = R::FIELDS.iter().map(|field| field.label).collect();
    let _ = writeln!(output, "| {} |", header.join(" | "));
    let _ = writeln!(output, "|{}", "---|".repeat(header.len()));

    for row in rows {
        let mut cells = vec![row.id().map(|id| id.to_string()).unwrap_or_default()];
        cells.extend(row.values().iter().map(display_value));
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }
}

fn write_bars(output: &mut String, points: &[(String, f64)]) {
    let _ = writeln!(output, "```text");
    for line in render_bars(points) {
        let _ = writeln!(output, "{}", line.trim_end());
    }
    let _ = writeln!(output, "```");
}

fn count_points(counts: &[CategoryCount]) -> Vec<(String, f64)> {
    counts
        .iter()
        .map(|count| (count.category.clone(), count.count as f64))
        .collect()
}

fn series_points(series: &[SeriesPoint]) -> Vec<(String, f64)> {
    series
        .iter()
        .filter_map(|point| point.value.as_f64().map(|value| (point.label.to_string(), value)))
        .collect()
}

pub fn tasks_section(tasks: &[Task]) -> DashboardResult<String> {
    let mut output = String::new();
    let _ = writeln!(output, "## Tasks Overview");

    if tasks.is_empty() {
        let _ = writeln!(output, "No tasks recorded yet.");
        return Ok(output);
    }

    write_table(&mut output, tasks);

    let counts = count_by_category(tasks, "status")?;
    let _ = writeln!(output);
    let _ = writeln!(output, "### Task Status Distribution");
    write_bars(&mut output, &count_points(&counts));
    Ok(output)
}

pub fn calendar_section(window_start: NaiveDate, window_end: NaiveDate, tasks: &[Task]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "## Tasks Active {} to {}",
        window_start.format("%Y-%m-%d"),
        window_end.format("%Y-%m-%d")
    );

    if tasks.is_empty() {
        let _ = writeln!(output, "No tasks overlap this window.");
    } else {
        write_table(&mut output, tasks);
    }
    output
}

fn snapshot_section<R: Record>(
    output: &mut String,
    heading: &str,
    chart_heading: &str,
    latest: Option<&R>,
) {
    let _ = writeln!(output, "## {heading}");

    let Some(snapshot) = latest else {
        let _ = writeln!(output, "No snapshot recorded yet.");
        return;
    };

    write_table(output, std::slice::from_ref(snapshot));

    let series = melt_latest_snapshot(Some(snapshot), R::id_field());
    let _ = writeln!(output);
    let _ = writeln!(output, "### {chart_heading}");
    write_bars(output, &series_points(&series));
}

pub fn finances_section(latest: Option<&FinancialSnapshot>) -> String {
    let mut output = String::new();
    snapshot_section(
        &mut output,
        "Financial Overview",
        "Financial Trends",
        latest,
    );
    output
}

pub fn leads_section(latest: Option<&LeadSnapshot>) -> String {
    let mut output = String::new();
    snapshot_section(
        &mut output,
        "Leads Overview",
        "Leads Distribution",
        latest,
    );
    output
}

pub fn build_overview(
    generated_on: NaiveDate,
    tasks: &[Task],
    finances: Option<&FinancialSnapshot>,
    leads: Option<&LeadSnapshot>,
) -> DashboardResult<String> {
    let mut output = String::new();

    let _ = writeln!(output, "# CEO Dashboard Overview");
    let _ = writeln!(output, "Generated on {}", generated_on.format("%Y-%m-%d"));
    let _ = writeln!(output);
    output.push_str(&tasks_section(tasks)?);
    let _ = writeln!(output);
    output.push_str(&finances_section(finances));
    let _ = writeln!(output);
    output.push_str(&leads_section(leads));

    Ok(output)
}
