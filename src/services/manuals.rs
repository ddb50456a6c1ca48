use std::path::PathBuf;

use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::error::{AppError, Result};

const MAX_INSTRUMENT_LEN: usize = 100;

/// Checks an instrument name and returns it trimmed.
///
/// Names become file names, so only letters, digits, spaces, `-` and `_`
/// are allowed.
pub fn validate_instrument(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_INSTRUMENT_LEN {
        return Err(AppError::Validation(format!(
            "Instrument name must be between 1 and {} characters",
            MAX_INSTRUMENT_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(AppError::Validation(
            "Instrument name can only contain letters, numbers, spaces, hyphens and underscores"
                .to_string(),
        ));
    }
    Ok(name)
}

/// Plain-text equipment manuals, one `<instrument>.txt` per instrument.
#[derive(Clone)]
pub struct ManualLibrary {
    root: PathBuf,
}

impl ManualLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, instrument: &str) -> PathBuf {
        self.root.join(format!("{}.txt", instrument))
    }

    /// The manual text, or `None` if there is no manual for the instrument.
    pub async fn load(&self, instrument: &str) -> Result<Option<String>> {
        let instrument = validate_instrument(instrument)?;
        match fs::read_to_string(self.path_for(instrument)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Stores or replaces a manual. Only UTF-8 text is accepted.
    pub async fn store(&self, instrument: &str, bytes: &[u8]) -> Result<String> {
        let instrument = validate_instrument(instrument)?.to_string();

        if bytes.is_empty() {
            return Err(AppError::Validation("Manual is empty".to_string()));
        }
        if let Some(kind) = infer::get(bytes) {
            return Err(AppError::Validation(format!(
                "Manuals must be plain text, got {}",
                kind.mime_type()
            )));
        }
        if std::str::from_utf8(bytes).is_err() {
            return Err(AppError::Validation("Manuals must be UTF-8 text".to_string()));
        }

        fs::create_dir_all(&self.root).await?;
        let temp_path = self.root.join(format!(".{}.partial", Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, self.path_for(&instrument)).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::Io(e));
        }

        tracing::info!("📘 Manual stored for {}", instrument);
        Ok(instrument)
    }

    /// Instrument names with a manual, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if validate_instrument(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
