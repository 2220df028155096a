//! Write-if-changed file output.
//!
//! The compiler's output is deterministic, so skipping identical writes
//! keeps downstream build systems from rebuilding on every run.

use std::fs;
use std::io;
use std::path::Path;

/// Write `contents` to `path` unless the file already holds exactly
/// those bytes. Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &str) -> io::Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents.as_bytes() {
            return Ok(false);
        }
    }
    fs::write(path, contents)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = env::temp_dir();
        path.push(format!("gx-output-test-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn writes_new_file() {
        let path = temp_path("new");
        let _ = fs::remove_file(&path);
        assert!(write_if_changed(&path, "hello").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn skips_identical_contents() {
        let path = temp_path("same");
        fs::write(&path, "same").unwrap();
        assert!(!write_if_changed(&path, "same").unwrap());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rewrites_on_change() {
        let path = temp_path("changed");
        fs::write(&path, "old").unwrap();
        assert!(write_if_changed(&path, "new").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let _ = fs::remove_file(&path);
    }
}
