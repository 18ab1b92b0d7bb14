//! Shared helpers for CLI commands.

use std::error::Error;
use std::path::Path;

use serde::de::DeserializeOwned;

/// Read and parse a JSON input file, with the path in any error message.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let value =
        serde_json::from_str(&raw).map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    Ok(value)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
