use crate::pipeline::intake_file;
use crate::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

use super::Workspace;

/// Parse `key=value` pairs given with `--meta`
pub fn parse_metadata(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| -> Result<(String, String)> {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Invalid metadata '{}', expected key=value", pair))?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("Invalid metadata '{}', key is empty", pair);
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn run(base: &Path, path: &Path, meta: &[String]) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let metadata = parse_metadata(meta)?;

    let record = intake_file(
        &workspace.machine,
        path,
        workspace.config.max_file_size_mb,
        metadata,
    )?;

    println!(
        "{}",
        format!("✓ Registered: {} → {}", path.display(), record.filename).green()
    );
    println!("  Location: {}", record.original_path);
    if let Some(size) = record
        .metadata
        .get("file_size_bytes")
        .and_then(|s| s.parse::<f64>().ok())
    {
        println!("  Size: {:.1} KB", size / 1024.0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let pairs = vec!["source=email".to_string(), "note = a=b ".to_string()];
        let metadata = parse_metadata(&pairs).unwrap();
        assert_eq!(metadata["source"], "email");
        assert_eq!(metadata["note"], "a=b");

        assert!(parse_metadata(&["novalue".to_string()]).is_err());
        assert!(parse_metadata(&["=x".to_string()]).is_err());
    }
}
