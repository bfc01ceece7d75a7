use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Write a rendered report to `path`, or to stdout when no path is given
pub fn write_report(report: &str, path: Option<&str>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(report.as_bytes())
                .with_context(|| format!("Failed to write report to: {}", path))?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(report.as_bytes())
                .context("Failed to write report to stdout")?;
            handle.flush()?;
        }
    }
    Ok(())
}
