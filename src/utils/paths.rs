use std::path::{Path, PathBuf};
use anyhow::Result;

/// Returns the application data directory.
/// Uses `dirs::data_dir()` + "jarvis" (e.g., %APPDATA%/jarvis or ~/.local/share/jarvis).
/// Creates the directory if it doesn't exist.
pub fn get_jarvis_data_dir() -> Result<PathBuf> {
    let app_data = dirs::data_dir()
        .or_else(|| std::env::var_os("APPDATA").map(PathBuf::from))
        .or_else(|| std::env::var_os("LOCALAPPDATA").map(PathBuf::from))
        .unwrap_or_else(std::env::temp_dir);

    let path = app_data.join("jarvis");

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }

    Ok(path)
}

/// The user's home directory, falling back to the current directory.
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Finds `name` on `PATH`. Names containing a path separator are checked as-is.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = Path::new(trimmed);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        executable_names(trimmed)
            .into_iter()
            .map(|file| dir.join(file))
            .find(|full| is_executable(full))
    })
}

/// First of `names` that resolves on `PATH`.
pub fn find_any_executable(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| find_executable(name))
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    if Path::new(name).extension().is_some() {
        return vec![name.to_string()];
    }
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    exts.split(';')
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!("{}{}", name, ext.to_lowercase()))
        .collect()
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn finds_shell_on_path() {
        let sh = find_executable("sh").expect("sh should be on PATH");
        assert!(sh.is_absolute());
    }

    #[test]
    fn blank_and_unknown_names_resolve_to_none() {
        assert_eq!(find_executable("   "), None);
        assert_eq!(find_executable("definitely_not_a_real_binary_42"), None);
    }
}
