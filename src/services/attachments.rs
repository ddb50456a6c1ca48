use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::job_card::AttachmentRef,
};

fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("attachment");

    name.chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(255)
        .collect()
}

/// Job-card uploads, stored under random names in one directory.
#[derive(Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    max_bytes: usize,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Only names this store generated resolve to a path.
    fn path_for(&self, stored_name: &str) -> Result<PathBuf> {
        let id = Uuid::parse_str(stored_name).map_err(|_| AppError::NotFound)?;
        Ok(self.root.join(id.to_string()))
    }

    /// Writes the bytes under a fresh opaque name.
    ///
    /// The file only becomes visible under its final name once fully written.
    pub async fn save(&self, original_filename: &str, bytes: &[u8]) -> Result<AttachmentRef> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Attachment is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "Attachment exceeds maximum size of {} bytes",
                self.max_bytes
            )));
        }

        fs::create_dir_all(&self.root).await?;

        let stored_name = Uuid::new_v4().to_string();
        let final_path = self.root.join(&stored_name);
        let temp_path = self.root.join(format!(".{}.partial", stored_name));

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::Io(e));
        }

        let attachment = AttachmentRef {
            stored_name,
            original_filename: sanitize_filename(original_filename),
            mime_type: infer::get(bytes).map(|kind| kind.mime_type().to_string()),
            size_bytes: bytes.len() as i64,
            checksum: blake3::hash(bytes).to_hex().to_string(),
        };

        tracing::debug!(
            "📎 Stored attachment {} ({} bytes, {:?})",
            attachment.stored_name,
            attachment.size_bytes,
            attachment.mime_type
        );
        Ok(attachment)
    }

    pub async fn open(&self, stored_name: &str) -> Result<fs::File> {
        let path = self.path_for(stored_name)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Removing a file that is already gone is not an error.
    pub async fn remove(&self, stored_name: &str) -> Result<()> {
        let path = self.path_for(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_bytes: usize) -> AttachmentStore {
        AttachmentStore::new(
            std::env::temp_dir().join(format!("biomedlink-attachments-{}", Uuid::new_v4())),
            max_bytes,
        )
    }

    #[tokio::test]
    async fn saved_file_gets_opaque_name_and_checksum() {
        let store = store(1024);
        let stored = store.save("../../etc/report.txt", b"calibrated ok").await.unwrap();

        assert!(Uuid::parse_str(&stored.stored_name).is_ok());
        assert_eq!(stored.original_filename, "report.txt");
        assert_eq!(stored.size_bytes, 13);
        assert_eq!(stored.checksum, blake3::hash(b"calibrated ok").to_hex().to_string());
        assert!(store.root().join(&stored.stored_name).exists());

        store.remove(&stored.stored_name).await.unwrap();
        assert!(!store.root().join(&stored.stored_name).exists());
        store.remove(&stored.stored_name).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_and_empty_files_are_rejected() {
        let store = store(4);
        assert!(matches!(
            store.save("a.bin", b"12345").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(store.save("a.bin", b"").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn names_outside_the_store_do_not_resolve() {
        let store = store(1024);
        assert!(matches!(store.open("../secret").await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn png_mime_type_is_detected() {
        let store = store(1024);
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let stored = store.save("photo", &png).await.unwrap();
        assert_eq!(stored.mime_type.as_deref(), Some("image/png"));
    }
}
