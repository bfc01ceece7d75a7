//! Turns user input into an ordered sequence of [`PurlRequest`]s.

use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::PathBuf;

use crate::common::PurlRequest;
use crate::error::ToolkitError;

/// Where the PURLs come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurlSource {
    /// Values given on the command line
    Inline(Vec<String>),
    /// Newline-delimited file
    File(PathBuf),
    /// Standard input, prompting when it is a terminal
    Stdin,
}

impl PurlSource {
    /// Pick the source from CLI options: `--purl` values win, then `--file`,
    /// otherwise stdin.
    pub fn from_options(purls: &[String], file: Option<&str>) -> Self {
        if !purls.is_empty() {
            PurlSource::Inline(purls.to_vec())
        } else if let Some(path) = file {
            PurlSource::File(PathBuf::from(path))
        } else {
            PurlSource::Stdin
        }
    }

    /// Read every request. Fails with `EmptyInput` when nothing is left after
    /// skipping blank and comment lines.
    pub fn read(&self) -> Result<Vec<PurlRequest>, ToolkitError> {
        let requests = match self {
            PurlSource::Inline(values) => {
                let lines = values.iter().map(|v| Ok(v.clone()));
                requests_from_lines(lines).collect::<io::Result<Vec<_>>>()?
            }
            PurlSource::File(path) => {
                debug!("Reading PURLs from: {}", path.display());
                // handle is dropped when this arm ends, on success or error
                let file = File::open(path)?;
                read_requests(BufReader::new(file))?
            }
            PurlSource::Stdin => {
                let stdin = io::stdin();
                if stdin.is_terminal() {
                    eprintln!("Enter PURLs, one per line (Ctrl-D to finish):");
                    let _ = io::stderr().flush();
                }
                read_requests(stdin.lock())?
            }
        };

        if requests.is_empty() {
            return Err(ToolkitError::EmptyInput);
        }
        Ok(requests)
    }
}

/// Collect requests from any buffered reader
pub fn read_requests<R: BufRead>(reader: R) -> io::Result<Vec<PurlRequest>> {
    requests_from_lines(reader.lines()).collect()
}

/// Lazily map raw lines to requests. Lines are trimmed; blank lines and lines
/// starting with `#` are skipped and do not consume a position.
pub fn requests_from_lines<I>(lines: I) -> impl Iterator<Item = io::Result<PurlRequest>>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut position = 0;
    lines.into_iter().filter_map(move |line| match line {
        Err(e) => Some(Err(e)),
        Ok(line) => {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let request = PurlRequest::new(trimmed, position);
            position += 1;
            Some(Ok(request))
        }
    })
}
