//! System-token bootstrap through the shared `.env` file.
//!
//! The gateway writes the token at startup; peers re-read the file on every
//! registration attempt, because a peer process may come up before the
//! gateway has written it.

use std::io;
use std::path::Path;

pub const SYSTEM_TOKEN_VAR: &str = "SYSTEM_TOKEN";

/// Reads the system token from the env file. Returns `None` while the file
/// or the variable does not exist yet.
pub fn load_system_token(env_file: &Path) -> Option<String> {
    let entries = dotenv::from_path_iter(env_file).ok()?;
    for (key, value) in entries.flatten() {
        if key == SYSTEM_TOKEN_VAR && !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// Writes or replaces the `SYSTEM_TOKEN` line, keeping other lines intact.
pub fn store_system_token(env_file: &Path, token: &str) -> io::Result<()> {
    let existing = std::fs::read_to_string(env_file).unwrap_or_default();
    let mut lines: Vec<String> = existing
        .lines()
        .filter(|line| !line.starts_with(&format!("{SYSTEM_TOKEN_VAR}=")))
        .map(String::from)
        .collect();
    lines.push(format!("{SYSTEM_TOKEN_VAR}={token}"));
    std::fs::write(env_file, lines.join("\n") + "\n")
}
