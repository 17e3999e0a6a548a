//! Long-running conversion loop over stdin.
//!
//! Each line is `<AMOUNT> <FROM> [TO]`. A failed line prints an error and the
//! loop carries on; the background refresh keeps the rates current for as
//! long as the loop runs.

use super::convert::format_conversion;
use super::ui;
use crate::core::RateProvider;
use anyhow::{Context, Result, bail};
use std::future::Future;
use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_request(line: &str, default_to: &str) -> Result<Option<ConversionRequest>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let (amount, from, to) = match parts.as_slice() {
        [amount, from] => (amount, from, default_to),
        [amount, from, to] => (amount, from, *to),
        _ => bail!("Expected '<AMOUNT> <FROM> [TO]', got '{}'", line),
    };

    let amount: f64 = amount
        .parse()
        .with_context(|| format!("Invalid amount '{amount}'"))?;

    Ok(Some(ConversionRequest {
        amount,
        from: from.to_string(),
        to: to.to_string(),
    }))
}

/// Evaluates one line into the text to print, or `None` for lines to skip.
pub fn evaluate_line(provider: &RateProvider, line: &str, default_to: &str) -> Option<String> {
    let result = parse_request(line, default_to).and_then(|request| match request {
        Some(r) => provider
            .convert(&r.from, &r.to, r.amount)
            .map(|converted| Some(format_conversion(r.amount, &r.from, converted, &r.to)))
            .map_err(anyhow::Error::from),
        None => Ok(None),
    });

    match result {
        Ok(output) => output,
        Err(e) => Some(ui::style_text(&format!("error: {e}"), ui::StyleType::Error)),
    }
}

/// Reads stdin on its own thread. A blocked read can't be cancelled, so the
/// thread is detached and never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Converts lines until the input ends or `stop` completes.
pub async fn convert_lines(
    provider: &RateProvider,
    default_to: &str,
    mut lines: mpsc::Receiver<io::Result<String>>,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(stop);

    loop {
        tokio::select! {
            line = lines.recv() => {
                match line.transpose().context("Failed to read from stdin")? {
                    Some(line) => {
                        if let Some(output) = evaluate_line(provider, &line, default_to) {
                            println!("{output}");
                        }
                    }
                    None => {
                        debug!("Reached end of input");
                        break;
                    }
                }
            }
            _ = &mut stop => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    Ok(())
}

pub async fn run(provider: &RateProvider, default_to: &str) -> Result<()> {
    info!("Reading conversions from stdin");
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    convert_lines(provider, default_to, spawn_stdin_reader(), interrupted).await
}
