//! Storage Layer
//!
//! Locates the per-user configuration and data directories.

use anyhow::Result;
use std::path::{Path, PathBuf};

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "paperpiano", "PaperPiano")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Default sound clip directory (`<data dir>/sounds`)
pub fn default_sounds_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("sounds"))
}

/// Files in `dir` whose extension matches one of `extensions`, sorted by name
pub fn list_files_with_extensions(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
