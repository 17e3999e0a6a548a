use super::ui;
use crate::core::{RateProvider, SnapshotStatus};
use comfy_table::Cell;

/// Amount of the reference currency shown in each row.
const REFERENCE_AMOUNT: f64 = 100.0;

/// Renders what `REFERENCE_AMOUNT` of `reference` is worth in each display
/// currency. Currencies the snapshot lacks render as N/A.
pub fn render_table(provider: &RateProvider, reference: &str, currencies: &[String]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("{REFERENCE_AMOUNT:.0} {reference}")),
    ]);

    for code in currencies {
        let value = match provider.convert(reference, code, REFERENCE_AMOUNT) {
            Ok(v) => ui::amount_cell(v),
            Err(_) => ui::na_cell(true),
        };
        table.add_row(vec![Cell::new(code), value]);
    }

    table.to_string()
}

pub fn render_status(status: &SnapshotStatus) -> String {
    if status.currencies == 0 {
        return ui::style_text(
            &format!("No exchange rates available from {}", status.source),
            ui::StyleType::Error,
        );
    }

    let published = status
        .published_at
        .map_or("unknown".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string());
    let mut line = format!(
        "Source: {} | Base: {} | Currencies: {} | Published: {} | Fetched: {}",
        status.source,
        status.base.as_deref().unwrap_or("unknown"),
        status.currencies,
        published,
        status.fetched_at.format("%Y-%m-%d %H:%M UTC"),
    );
    if status.stale {
        line.push_str(" (stale)");
    }
    ui::style_text(&line, ui::StyleType::Subtle)
}

pub fn run(provider: &RateProvider, reference: &str, currencies: &[String]) {
    println!(
        "Exchange rates for {}\n",
        ui::style_text(reference, ui::StyleType::Title)
    );
    println!("{}", render_table(provider, reference, currencies));
    println!("\n{}", render_status(&provider.status()));
}
