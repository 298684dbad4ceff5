use crate::analysis::AnalysisReport;
use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY,
};
use std::fmt::Write;

// Longest run of incomplete dates listed individually; the rest are summarized.
const MAX_LISTED_DATES: usize = 40;

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%d-%m-%Y %H:%M:%S").to_string()
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn signed_cell(value: f64) -> Cell {
    let color = if value >= 0.0 { Color::Green } else { Color::Red };
    Cell::new(pct(value)).fg(color).set_alignment(CellAlignment::Right)
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

fn coverage_section(report: &AnalysisReport, out: &mut String) -> std::fmt::Result {
    let Some(diag) = &report.diagnostics else {
        return writeln!(out, "No data available.");
    };

    writeln!(out, "Data points: {}", report.points)?;
    writeln!(out, "First date of available data: {} UTC", format_timestamp(diag.first_timestamp))?;
    writeln!(out, "Last date of available data: {} UTC", format_timestamp(diag.last_timestamp))?;
    writeln!(out, "Number of days of available data: {}", diag.span_days)?;
    writeln!(out, "Number of records with missing values: {}", diag.rows_with_missing_values)?;
    writeln!(out, "Irregular hourly spacings: {}", diag.gaps.len())?;
    if let Some(widest) = diag.gaps.iter().max_by_key(|g| g.missing_hours) {
        writeln!(
            out,
            "  Widest gap: {} missing hours between {} and {} UTC",
            widest.missing_hours,
            format_timestamp(widest.after),
            format_timestamp(widest.before)
        )?;
    }
    writeln!(out, "Dates with missing data points: {}", diag.incomplete_dates.len())?;

    if diag.incomplete_dates.is_empty() {
        return Ok(());
    }

    let mut table = new_table(&["Date", "Data points"]);
    for date in diag.incomplete_dates.iter().take(MAX_LISTED_DATES) {
        table.add_row(vec![
            Cell::new(date.date.format("%Y-%m-%d")),
            Cell::new(date.points)
                .fg(Color::DarkGrey)
                .set_alignment(CellAlignment::Right),
        ]);
    }
    writeln!(out, "{}", table)?;

    let hidden = diag.incomplete_dates.len().saturating_sub(MAX_LISTED_DATES);
    if hidden > 0 {
        writeln!(out, "  ... and {} more", hidden)?;
    }
    Ok(())
}

fn performance_section(report: &AnalysisReport, out: &mut String) -> std::fmt::Result {
    writeln!(out, "Whole-series buy and hold return: {}", pct(report.total_buy_and_hold_return))?;
    writeln!(
        out,
        "Whole-series moving average crossover return (SMA {}): {}",
        report.sma_period,
        pct(report.total_strategy_return)
    )?;

    match &report.performance {
        Some(perf) => {
            writeln!(out, "Since {} UTC:", format_timestamp(perf.since))?;
            writeln!(out, "  Buy and Hold Strategy Return: {}", pct(perf.buy_and_hold_return))?;
            writeln!(
                out,
                "  Moving Average Crossover Strategy Return: {}",
                pct(perf.strategy_return)
            )?;
        }
        None => writeln!(out, "No data inside the performance window.")?,
    }

    match &report.price_one_year_ago {
        Some(price) => match price.close {
            Some(close) => writeln!(
                out,
                "Price one year ago ({} UTC, nearest to {}): ${:.2}",
                format_timestamp(price.timestamp),
                format_timestamp(price.target),
                close
            )?,
            None => writeln!(
                out,
                "Price one year ago ({} UTC): missing",
                format_timestamp(price.timestamp)
            )?,
        },
        None => writeln!(out, "Price one year ago: unavailable")?,
    }
    Ok(())
}

fn yearly_section(report: &AnalysisReport, out: &mut String) -> std::fmt::Result {
    if report.yearly.is_empty() {
        return Ok(());
    }

    let mut table = new_table(&[
        "Year",
        "From",
        "To",
        "Rows",
        "Buy Orders",
        "Sell Orders",
        "Total Returns",
        "Median P/L per Order",
        "Buy and Hold",
    ]);

    for year in &report.yearly {
        let median = match year.median_trade_return {
            Some(m) => signed_cell(m),
            None => Cell::new("n/a").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(year.year).fg(Color::DarkGrey),
            Cell::new(year.start.format("%Y-%m-%d")),
            Cell::new(year.end.format("%Y-%m-%d")),
            Cell::new(year.rows).set_alignment(CellAlignment::Right),
            Cell::new(year.long_signals).set_alignment(CellAlignment::Right),
            Cell::new(year.short_signals).set_alignment(CellAlignment::Right),
            signed_cell(year.strategy_return_sum),
            median,
            signed_cell(year.buy_and_hold_return_sum),
        ]);
    }

    writeln!(out, "{}", table)
}

fn write_report(report: &AnalysisReport, out: &mut String) -> std::fmt::Result {
    writeln!(out, "\n(Report generated at {} UTC)", format_timestamp(report.as_of))?;
    coverage_section(report, out)?;
    writeln!(out)?;
    performance_section(report, out)?;
    writeln!(out)?;
    yearly_section(report, out)
}

/// Renders the whole report as terminal text.
pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_report(report, &mut out);
    out
}

pub fn run(report: &AnalysisReport) {
    println!("{}", render(report));
}
