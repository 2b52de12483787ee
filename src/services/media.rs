use base64::{engine::general_purpose, Engine};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::models::{ErrorKind, Failure, StoredArtifact};

pub const GEMINI_FOLDER: &str = "Image_save_forGemini";
pub const GEMINI_SUFFIX: &str = "_gemini";
pub const SD_FOLDER: &str = "Image_save_forSD";
pub const SD_SUFFIX: &str = "_SD";

/// Decode a base64 payload, ignoring line wrapping and an optional
/// `data:<mime>;base64,` prefix.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, Failure> {
    let data = strip_data_url(data.trim());
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();

    general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Failure::new(ErrorKind::DecodeError, format!("invalid base64 payload: {}", e)))
}

fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some((_, payload)) = data.split_once(";base64,") {
            return payload;
        }
    }
    data
}

/// Writes decoded media under `<root>/<folder>/`.
pub struct MediaPersister {
    root: PathBuf,
}

impl MediaPersister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Decode `base64_data` and write it to `<root>/<folder>/<epoch-millis><suffix>.png`.
    ///
    /// An existing file is never overwritten: on a name clash a short random id
    /// is inserted after the timestamp. A failed write removes the partial file.
    pub async fn persist(
        &self,
        base64_data: &str,
        folder: &str,
        suffix: &str,
    ) -> Result<StoredArtifact, Failure> {
        let bytes = decode_base64(base64_data)?;
        if bytes.is_empty() {
            return Err(Failure::new(ErrorKind::DecodeError, "image payload is empty"));
        }

        let dir = self.root.join(folder);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_failure("create directory", &dir, e))?;

        let created_at = Utc::now();
        let (path, file) = open_fresh(&dir, created_at.timestamp_millis(), suffix).await?;

        log::debug!("💾 Writing {} bytes to {}", bytes.len(), path.display());

        write_or_discard(file, &bytes, &path).await?;

        log::info!("✅ Image saved: {}", path.display());
        Ok(StoredArtifact { path, created_at })
    }
}

/// Write `bytes` through `writer`. On any failure the file at `path` is removed
/// so no partial image is left behind.
async fn write_or_discard<W: AsyncWrite + Unpin>(
    mut writer: W,
    bytes: &[u8],
    path: &Path,
) -> Result<(), Failure> {
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path).await {
            log::error!("❌ Could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(io_failure("write", path, e));
    }
    Ok(())
}

async fn open_fresh(dir: &Path, millis: i64, suffix: &str) -> Result<(PathBuf, File), Failure> {
    let primary = dir.join(format!("{}{}.png", millis, suffix));
    match create_new(&primary).await {
        Ok(file) => Ok((primary, file)),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let fallback = dir.join(format!("{}-{}{}.png", millis, &id[..8], suffix));
            log::warn!(
                "⚠️ {} already exists, saving as {}",
                primary.display(),
                fallback.display()
            );
            let file = create_new(&fallback)
                .await
                .map_err(|e| io_failure("create", &fallback, e))?;
            Ok((fallback, file))
        }
        Err(e) => Err(io_failure("create", &primary, e)),
    }
}

async fn create_new(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path).await
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> Failure {
    log::error!("❌ Failed to {} {}: {} ({:?})", action, path.display(), e, e.kind());
    Failure::new(
        ErrorKind::IoError,
        format!("failed to {} {}: {}", action, path.display(), e),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_round_trip_with_line_wrapping() {
        let samples: Vec<Vec<u8>> = vec![
            Vec::new(),
            vec![0],
            b"hello world".to_vec(),
            (0..=255u8).cycle().take(1000).collect(),
        ];

        for bytes in samples {
            let encoded = general_purpose::STANDARD.encode(&bytes);
            let wrapped = encoded
                .as_bytes()
                .chunks(76)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect::<Vec<_>>()
                .join("\r\n");

            assert_eq!(decode_base64(&encoded).unwrap(), bytes);
            assert_eq!(decode_base64(&format!(" {}\n", wrapped)).unwrap(), bytes);
        }
    }

    #[test]
    fn test_decode_accepts_data_url() {
        let decoded = decode_base64("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_decode_rejects_bad_alphabet() {
        let failure = decode_base64("not*base64!").unwrap_err();
        assert_eq!(failure.kind, ErrorKind::DecodeError);
    }

    #[tokio::test]
    async fn test_persist_creates_folder_and_file() {
        let root = tempfile::tempdir().unwrap();
        let persister = MediaPersister::new(root.path());

        let artifact = persister
            .persist("aGVs\nbG8=", SD_FOLDER, SD_SUFFIX)
            .await
            .unwrap();

        assert!(artifact.path.starts_with(root.path().join(SD_FOLDER)));
        let name = artifact.path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_SD.png"));
        assert_eq!(
            name.trim_end_matches("_SD.png"),
            artifact.created_at.timestamp_millis().to_string()
        );
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_persist_distinct_suffixes_do_not_clash() {
        let root = tempfile::tempdir().unwrap();
        let persister = MediaPersister::new(root.path());

        let (a, b) = tokio::join!(
            persister.persist("YQ==", "shared", "_a"),
            persister.persist("Yg==", "shared", "_b"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.path, b.path);
        assert_eq!(std::fs::read(&a.path).unwrap(), b"a");
        assert_eq!(std::fs::read(&b.path).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_persist_never_overwrites_same_name() {
        let root = tempfile::tempdir().unwrap();
        let persister = MediaPersister::new(root.path());

        let mut paths = Vec::new();
        for payload in ["YQ==", "Yg==", "Yw==", "ZA=="] {
            paths.push(persister.persist(payload, "same", "_x").await.unwrap().path);
        }

        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 4);
        assert_eq!(std::fs::read_dir(root.path().join("same")).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_persist_decode_error_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let persister = MediaPersister::new(root.path());

        let failure = persister.persist("%%%", GEMINI_FOLDER, GEMINI_SUFFIX).await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::DecodeError);
        assert!(!root.path().join(GEMINI_FOLDER).exists());

        let failure = persister.persist(" \n ", GEMINI_FOLDER, GEMINI_SUFFIX).await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::DecodeError);
    }

    /// Accepts the first few bytes, then fails like a full disk.
    struct FullDisk {
        accepted: usize,
    }

    impl AsyncWrite for FullDisk {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            if self.accepted == 0 {
                let n = buf.len().min(4);
                self.accepted += n;
                std::task::Poll::Ready(Ok(n))
            } else {
                std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "no space left on device",
                )))
            }
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("1700000000000_SD.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let failure = write_or_discard(FullDisk { accepted: 0 }, b"0123456789", &path)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, ErrorKind::IoError);
        assert!(failure.detail.contains("no space left on device"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_successful_write_keeps_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("ok.png");
        let file = create_new(&path).await.unwrap();

        write_or_discard(file, b"hello", &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_persist_io_error_when_folder_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("blocked"), b"x").unwrap();
        let persister = MediaPersister::new(root.path());

        let failure = persister.persist("YQ==", "blocked", "_x").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::IoError);
    }
}
