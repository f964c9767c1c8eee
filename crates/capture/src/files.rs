use crate::capture_dir::is_session_dir;
use anyhow::Context;
use controller::FileStore;
use std::path::Path;

/// Removes capture files from local disk. An emptied session directory goes
/// with its last file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileStore;

impl FileStore for FsFileStore {
    async fn delete(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))?;

        if let Some(parent) = path.parent()
            && is_session_dir(parent)
            && tokio::fs::remove_dir(parent).await.is_ok()
        {
            tracing::debug!(path = %parent.display(), "Removed empty capture directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_dir::CaptureDir;

    #[tokio::test]
    async fn deletes_files_then_empty_dir() {
        let base = tempfile::tempdir().unwrap();
        let mut dir = CaptureDir::create(base.path()).unwrap();
        let a = dir.next_frame_path();
        let b = dir.next_frame_path();
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        FsFileStore.delete(&a).await.unwrap();
        assert!(!a.exists());
        assert!(dir.path().is_dir(), "directory still holds a frame");

        FsFileStore.delete(&b).await.unwrap();
        assert!(!dir.path().exists());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let result = FsFileStore.delete(&base.path().join("nope.jpg")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn leaves_other_directories_alone() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("frame.jpg");
        std::fs::write(&file, b"x").unwrap();

        FsFileStore.delete(&file).await.unwrap();
        assert!(base.path().is_dir());
    }
}
