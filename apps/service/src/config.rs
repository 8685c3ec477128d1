use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::schedule::Job;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("expected '<seconds>,<url>' on line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}

/// Load the probe programme from a file.
pub fn load_programme(path: &Path) -> Result<Vec<Job>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    parse_programme(&raw)
}

/// Parse the probe programme: one `<seconds>,<url>` entry per line.
///
/// Line numbers in errors are 1-based. Duplicate entries are kept and
/// scheduled independently. Entries come back sorted by (interval, url),
/// the same order the schedule breaks ties in.
pub fn parse_programme(raw: &str) -> Result<Vec<Job>, ConfigError> {
    let mut jobs = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        let malformed = || ConfigError::Malformed { line: n + 1, content: line.to_string() };

        let (seconds, url) = line.trim().split_once(',').ok_or_else(malformed)?;
        let seconds: u64 = seconds.trim().parse().map_err(|_| malformed())?;
        let url = url.trim();
        if seconds == 0 || url.is_empty() {
            return Err(malformed());
        }
        jobs.push(Job::new(Duration::from_secs(seconds), url));
    }
    jobs.sort();
    Ok(jobs)
}
