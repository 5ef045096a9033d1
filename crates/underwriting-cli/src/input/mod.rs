pub mod config;
pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Deserialise a command's input from `--input <file>` or piped stdin.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_json(path)
    } else if let Some(parsed) = stdin::read_stdin(what)? {
        Ok(parsed)
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}
