use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SESSION_DIR_PREFIX: &str = "face_";

/// Scratch directory for one controller's stills:
/// `<base>/face_<unix_ms>/f_<unix_ms>.jpg`.
#[derive(Debug)]
pub struct CaptureDir {
    root: PathBuf,
    last_ms: i64,
}

impl CaptureDir {
    pub fn create(base: &Path) -> io::Result<Self> {
        let root = base.join(format!(
            "{SESSION_DIR_PREFIX}{}",
            Utc::now().timestamp_millis()
        ));
        fs::create_dir_all(&root)?;
        tracing::debug!(path = %root.display(), "Capture directory ready");
        Ok(Self { root, last_ms: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Names are strictly increasing even when two stills land in the same
    /// millisecond.
    pub fn next_frame_path(&mut self) -> PathBuf {
        let now = Utc::now().timestamp_millis();
        self.last_ms = now.max(self.last_ms + 1);
        self.root.join(format!("f_{}.jpg", self.last_ms))
    }
}

pub fn is_session_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SESSION_DIR_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_and_unique_names() {
        let base = tempfile::tempdir().unwrap();
        let mut dir = CaptureDir::create(base.path()).unwrap();

        assert!(dir.path().is_dir());
        assert!(is_session_dir(dir.path()));

        let first = dir.next_frame_path();
        let second = dir.next_frame_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.path()));

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("f_") && name.ends_with(".jpg"), "{name}");
    }

    #[test]
    fn only_face_dirs_are_session_dirs() {
        assert!(is_session_dir(Path::new("/cache/face_1712345678901")));
        assert!(!is_session_dir(Path::new("/cache")));
        assert!(!is_session_dir(Path::new("/")));
    }
}
