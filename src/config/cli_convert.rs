//! CLI to Config conversion utilities

use crate::config::{cli, Substrate};
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a comma-separated list of partition names
pub fn parse_names(s: &str) -> Result<Vec<String>> {
    let names: Vec<String> = s.split(',').map(|name| name.trim().to_string()).collect();

    if let Some(pos) = names.iter().position(|name| name.is_empty()) {
        anyhow::bail!("Empty partition name at position {} in '{}'", pos + 1, s);
    }

    Ok(names)
}

/// Append the default port to an address that lacks one
pub fn with_default_port(addr: &str, port: u16) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, port)
    }
}

/// Parse a comma-separated host list (e.g., "10.0.1.10:9999,10.0.1.11")
pub fn parse_host_list(s: &str, default_port: u16) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| with_default_port(addr, default_port))
        .collect()
}

/// Read worker addresses from a file, one per line
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_clients_file(path: &Path, default_port: u16) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clients file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|addr| with_default_port(addr, default_port))
        .collect())
}

/// Convert CLI substrate to config substrate
pub fn convert_substrate(cli_type: cli::SubstrateType) -> Substrate {
    match cli_type {
        cli::SubstrateType::Threads => Substrate::Threads,
        cli::SubstrateType::Distributed => Substrate::Distributed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_names() {
        assert_eq!(
            parse_names("Kuala Lumpur, La Paz,Lisbon").unwrap(),
            vec!["Kuala Lumpur", "La Paz", "Lisbon"]
        );
        assert!(parse_names("a,,b").is_err());
    }

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list("10.0.1.10:10000, 10.0.1.11", 9999),
            vec!["10.0.1.10:10000", "10.0.1.11:9999"]
        );
        assert!(parse_host_list(" , ", 9999).is_empty());
    }

    #[test]
    fn test_read_clients_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# workers").unwrap();
        writeln!(file, "node-a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "node-b:10001").unwrap();

        let addrs = read_clients_file(file.path(), 9999).unwrap();
        assert_eq!(addrs, vec!["node-a:9999", "node-b:10001"]);
    }

    #[test]
    fn test_read_missing_clients_file() {
        assert!(read_clients_file(Path::new("/nonexistent/clients.txt"), 9999).is_err());
    }

    #[test]
    fn test_convert_substrate() {
        assert_eq!(convert_substrate(cli::SubstrateType::Threads), Substrate::Threads);
        assert_eq!(convert_substrate(cli::SubstrateType::Distributed), Substrate::Distributed);
    }
}
