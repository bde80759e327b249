use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("File {0} not found")]
    NotFound(PathBuf),
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Read one identifier per line, dropping blank lines
pub fn load_items_from_file(path: &Path) -> Result<Vec<String>, ParseError> {
    if !path.exists() {
        return Err(ParseError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(parse_items(&content))
}

pub fn parse_items(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
