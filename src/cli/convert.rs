use super::ui;
use crate::core::RateProvider;
use anyhow::{Context, Result};

pub fn format_conversion(amount: f64, from: &str, converted: f64, to: &str) -> String {
    format!(
        "{amount:.2} {from} = {} {to}",
        ui::style_text(&format!("{converted:.2}"), ui::StyleType::Value)
    )
}

pub fn run(provider: &RateProvider, amount: f64, from: &str, to: &str) -> Result<()> {
    let converted = provider
        .convert(from, to, amount)
        .with_context(|| format!("Cannot convert {from} to {to}"))?;
    println!("{}", format_conversion(amount, from, converted, to));
    Ok(())
}
