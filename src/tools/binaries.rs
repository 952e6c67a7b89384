use std::path::{Path, PathBuf};

use tracing::debug;

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Finds `name` in `bin_dir` first, then on `PATH`.
pub fn resolve_binary(name: &str, bin_dir: &Path) -> Option<PathBuf> {
    let file = executable_name(name);

    let local = bin_dir.join(&file);
    if local.is_file() {
        debug!("Using bundled {name}: {}", local.display());
        return Some(local);
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_bundled_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = dir.path().join(executable_name("yt-dlp"));
        std::fs::write(&bundled, b"#!/bin/sh\n").unwrap();

        assert_eq!(resolve_binary("yt-dlp", dir.path()), Some(bundled));
    }

    #[test]
    fn missing_binary_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_binary("definitely-not-a-real-tool-4f2a", dir.path()),
            None
        );
    }
}
