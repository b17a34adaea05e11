// Provider Configuration
// The provider list is a plain text file: one provider per line as
// `URL [interval_seconds]`, `#`-prefixed comment lines, blank lines ignored.
// The file is created with a commented template on first run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use tracing::info;
use url::Url;

/// Fetch interval used when a line does not specify one.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

const TEMPLATE: &str = "\
# saodb provider list
# one provider per line: URL [interval_seconds]
# example:
#   http://localhost:7071 30
";

/// One configured provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEntry {
    pub url: Url,
    pub interval: Duration,
}

/// Where the provider list lives: `$SAODB_PROVIDERS` if set, otherwise
/// `~/.saodb/providers.conf`, falling back to the working directory when no
/// home is available.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SAODB_PROVIDERS") {
        return PathBuf::from(path);
    }
    match std::env::var("HOME") {
        Ok(home) => Path::new(&home).join(".saodb").join("providers.conf"),
        Err(_) => PathBuf::from("providers.conf"),
    }
}

/// Load the provider list, creating a template file on first run.
pub fn load_or_init(path: &Path) -> Result<Vec<ProviderEntry>> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, TEMPLATE)
            .with_context(|| format!("failed to create {}", path.display()))?;
        info!(path = %path.display(), "created provider list template");
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_providers(&text).with_context(|| format!("invalid provider list {}", path.display()))
}

/// Parse the provider list text.
pub fn parse_providers(text: &str) -> Result<Vec<ProviderEntry>> {
    let mut providers = Vec::new();
    for (i, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lineno = i + 1;
        let mut parts = line.split_whitespace();
        let url_text = parts.next().expect("non-empty line has a first token");
        let url = Url::parse(url_text)
            .with_context(|| format!("line {lineno}: invalid URL '{url_text}'"))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "line {lineno}: unsupported scheme '{}'",
            url.scheme()
        );
        let interval_secs = match parts.next() {
            None => DEFAULT_INTERVAL_SECS,
            Some(text) => {
                let secs: u64 = text
                    .parse()
                    .with_context(|| format!("line {lineno}: invalid interval '{text}'"))?;
                ensure!(secs > 0, "line {lineno}: interval must be positive");
                secs
            }
        };
        if let Some(extra) = parts.next() {
            bail!("line {lineno}: unexpected trailing token '{extra}'");
        }
        providers.push(ProviderEntry {
            url,
            interval: Duration::from_secs(interval_secs),
        });
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_comments_blanks_and_intervals() {
        let providers = parse_providers(
            "# fleet\n\nhttp://localhost:7071\nhttp://localhost:7072 10\n  # indented comment\n",
        )
        .unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].interval, Duration::from_secs(30));
        assert_eq!(providers[1].interval, Duration::from_secs(10));
        assert_eq!(providers[1].url.as_str(), "http://localhost:7072/");
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(parse_providers("not a url\n").is_err());
        assert!(parse_providers("ftp://host\n").is_err());
        assert!(parse_providers("http://host zero\n").is_err());
        assert!(parse_providers("http://host 0\n").is_err());
        assert!(parse_providers("http://host 10 extra\n").is_err());
    }

    #[test]
    fn test_load_or_init_creates_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("providers.conf");

        let providers = load_or_init(&path).unwrap();
        assert!(providers.is_empty());
        assert!(path.exists());

        // The template parses cleanly on the next load.
        let providers = load_or_init(&path).unwrap();
        assert!(providers.is_empty());
    }
}
