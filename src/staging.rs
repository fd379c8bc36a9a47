use std::io::{self, Write};
use std::path::Path;

use log::debug;
use tempfile::TempPath;

use crate::upload::{VideoFormat, VideoUpload};

/// A video written to a uniquely named temp file.
///
/// The file is removed by [`StagedVideo::cleanup`], or on drop if an early
/// return skips the explicit call.
#[derive(Debug)]
pub struct StagedVideo {
    path: TempPath,
    format: VideoFormat,
}

impl StagedVideo {
    /// Writes the upload into `dir`, keeping the original container extension.
    pub async fn stage(dir: &Path, upload: &VideoUpload) -> io::Result<Self> {
        let dir = dir.to_path_buf();
        let bytes = upload.bytes.clone();
        let suffix = format!(".{}", upload.format.extension());

        let path = tokio::task::spawn_blocking(move || -> io::Result<TempPath> {
            let mut file = tempfile::Builder::new()
                .prefix("video-")
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(io::Error::other)??;

        debug!(
            "Staged {} ({} bytes) at {}",
            upload.file_name,
            upload.bytes.len(),
            path.display()
        );

        Ok(StagedVideo {
            path,
            format: upload.format,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Deletes the staged file. A file that is already gone is not an error.
    pub fn cleanup(self) -> io::Result<()> {
        let display = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => {
                debug!("Removed staged video {}", display);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn upload(name: &str) -> VideoUpload {
        VideoUpload::new(name, Bytes::from_static(b"\x00\x00\x00\x18ftypmp42")).unwrap()
    }

    #[tokio::test]
    async fn stages_bytes_with_original_extension() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedVideo::stage(dir.path(), &upload("trip.MOV"))
            .await
            .unwrap();

        let path = staged.path().to_path_buf();
        assert_eq!(path.extension().unwrap(), "mov");
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(std::fs::read(&path).unwrap(), b"\x00\x00\x00\x18ftypmp42");
        assert_eq!(staged.format(), VideoFormat::Mov);

        staged.cleanup().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staged_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = StagedVideo::stage(dir.path(), &upload("a.mp4")).await.unwrap();
        let b = StagedVideo::stage(dir.path(), &upload("a.mp4")).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn cleanup_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedVideo::stage(dir.path(), &upload("a.avi")).await.unwrap();
        std::fs::remove_file(staged.path()).unwrap();

        assert!(staged.cleanup().is_ok());
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedVideo::stage(dir.path(), &upload("a.mp4")).await.unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }
}
