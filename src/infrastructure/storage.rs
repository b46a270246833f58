use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

pub fn ensure_upload_dir(upload_dir: &Path) -> std::io::Result<PathBuf> {
    ensure_dir(upload_dir)?;
    Ok(upload_dir.to_path_buf())
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// A temporary upload file that is removed when the guard is dropped,
/// whichever way the request finishes.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Reserve a unique path inside `upload_dir`. The file itself is created by the writer.
    pub fn new(upload_dir: &Path, extension: &str) -> std::io::Result<Self> {
        ensure_dir(upload_dir)?;
        let file_name = format!("upload-{}.{}", Uuid::new_v4(), extension);
        Ok(Self {
            path: upload_dir.join(file_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to remove temp upload");
            }
        }
    }
}
