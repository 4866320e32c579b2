//! Console rendering for the fdxfer CLI

use crate::json_output::source_methods;
use console::{style, Term};
use fdxfer_types::{TransferMethod, TransferReport};
use fdxfer_zerocopy::Endpoint;
use std::io;
use std::time::Duration;

/// Print the per-method breakdown of a finished copy
pub fn display_report(term: &Term, report: &TransferReport, elapsed: Duration) -> io::Result<()> {
    term.write_line("")?;
    term.write_line(&format!("{}", style("Transfer Statistics:").bold().underlined()))?;
    term.write_line(&format!(
        "  Bytes copied: {}",
        style(format_bytes(report.bytes)).green()
    ))?;

    for method in TransferMethod::ALL {
        let bytes = report.bytes_for(method);
        if bytes == 0 {
            continue;
        }
        let styled = if method.is_accelerated() {
            style(format_bytes(bytes)).cyan()
        } else {
            style(format_bytes(bytes)).yellow()
        };
        term.write_line(&format!("    {:<16} {}", method.as_str(), styled))?;
    }

    if let Some(method) = report.primary_method() {
        term.write_line(&format!("  Primary method: {}", style(method).cyan()))?;
    }
    term.write_line(&format!(
        "  Zero-copy efficiency: {}",
        style(format!("{:.1}%", report.zerocopy_efficiency() * 100.0)).cyan()
    ))?;
    term.write_line(&format!(
        "  Duration: {}",
        style(format_duration(elapsed)).blue()
    ))?;
    term.write_line(&format!(
        "  Transfer rate: {}",
        style(format_rate(report.bytes, elapsed)).blue()
    ))?;
    Ok(())
}

/// Print what the engine sees when looking at a descriptor
pub fn display_endpoint(term: &Term, label: &str, endpoint: &Endpoint<'_>) -> io::Result<()> {
    term.write_line("")?;
    term.write_line(&format!(
        "{} {}",
        style("🔍").blue().bold(),
        style(label).bold().underlined()
    ))?;
    term.write_line(&format!("  Kind: {}", style(endpoint.kind()).cyan()))?;
    term.write_line(&format!(
        "  Append mode: {}",
        if endpoint.is_append() {
            style("yes").yellow()
        } else {
            style("no").green()
        }
    ))?;
    if let Some(identity) = endpoint.identity() {
        term.write_line(&format!(
            "  Identity: {}",
            style(format!("dev {} ino {}", identity.device, identity.inode)).dim()
        ))?;
    }
    if let Some(offset) = endpoint.offset() {
        term.write_line(&format!("  Offset: {}", style(offset).cyan()))?;
    }

    let methods = source_methods(endpoint.kind());
    if methods.is_empty() {
        term.write_line(&format!(
            "  Accelerated as source: {}",
            style("none, buffered copy only").yellow()
        ))?;
    } else {
        let names: Vec<&str> = methods.iter().map(|method| method.as_str()).collect();
        term.write_line(&format!(
            "  Accelerated as source: {}",
            style(names.join(", ")).green()
        ))?;
    }
    Ok(())
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Average throughput, `n/a` for instantaneous transfers
pub fn format_rate(bytes: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return "n/a".to_string();
    }
    format!("{}/s", format_bytes((bytes as f64 / secs) as u64))
}
