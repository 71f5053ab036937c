//! Registry file readers and the raw snapshot store.
//!
//! A [`RegistrySource`] returns the raw bytes of one registry file. Bytes are
//! decoded as Latin-1 into one record per line by [`FetchedFile::decode`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use medwatch_core::registry::{decode_latin1, records, RegistryFile};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for registry file reads.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file could not be fetched or read.
    #[error("{file} unavailable: {reason}")]
    SourceUnavailable { file: RegistryFile, reason: String },

    /// The file was read but its bytes are not a text table.
    #[error("{file} could not be decoded: {reason}")]
    DecodeError { file: RegistryFile, reason: String },
}

impl SourceError {
    pub fn unavailable(file: RegistryFile, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            file,
            reason: reason.to_string(),
        }
    }

    pub fn file(&self) -> RegistryFile {
        match self {
            Self::SourceUnavailable { file, .. } | Self::DecodeError { file, .. } => *file,
        }
    }
}

// ---------------------------------------------------------------------------
// Fetched file
// ---------------------------------------------------------------------------

/// Raw bytes of a registry file and its decoded records.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub file: RegistryFile,
    pub bytes: Vec<u8>,
    pub lines: Vec<String>,
}

impl FetchedFile {
    /// Decode Latin-1 bytes into records, dropping blank lines.
    ///
    /// Every byte is valid Latin-1, but a NUL byte means the payload is not a
    /// tab-separated text file (e.g. a zip archive) and is rejected.
    pub fn decode(file: RegistryFile, bytes: Vec<u8>) -> Result<Self, SourceError> {
        if let Some(offset) = bytes.iter().position(|&b| b == 0) {
            return Err(SourceError::DecodeError {
                file,
                reason: format!("binary content (NUL byte at offset {offset})"),
            });
        }
        let lines = records(&decode_latin1(&bytes));
        Ok(Self { file, bytes, lines })
    }
}

// ---------------------------------------------------------------------------
// RegistrySource
// ---------------------------------------------------------------------------

/// Provides the raw bytes of registry files.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn fetch_raw(&self, file: RegistryFile) -> Result<Vec<u8>, SourceError>;

    /// Fetch and decode a file.
    async fn fetch(&self, file: RegistryFile) -> Result<FetchedFile, SourceError> {
        let bytes = self.fetch_raw(file).await?;
        FetchedFile::decode(file, bytes)
    }
}

/// Downloads registry files over HTTP.
pub struct HttpRegistrySource {
    client: reqwest::Client,
    urls: HashMap<RegistryFile, String>,
}

impl HttpRegistrySource {
    pub fn new(
        urls: HashMap<RegistryFile, String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, urls })
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn fetch_raw(&self, file: RegistryFile) -> Result<Vec<u8>, SourceError> {
        let url = self
            .urls
            .get(&file)
            .ok_or_else(|| SourceError::unavailable(file, "no URL configured"))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(file, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::unavailable(file, format!("HTTP {}", status.as_u16())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::unavailable(file, e))?;

        tracing::debug!(file = %file, url, bytes = bytes.len(), "Fetched registry file");
        Ok(bytes.to_vec())
    }
}

/// Reads registry files from a local directory, using the regulator's file names.
pub struct DirectoryRegistrySource {
    dir: PathBuf,
}

impl DirectoryRegistrySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, file: RegistryFile) -> PathBuf {
        self.dir.join(file.default_file_name())
    }
}

#[async_trait]
impl RegistrySource for DirectoryRegistrySource {
    async fn fetch_raw(&self, file: RegistryFile) -> Result<Vec<u8>, SourceError> {
        let path = self.path_for(file);
        tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::unavailable(file, format!("{}: {e}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Keeps the raw bytes of the last successfully fetched file per registry file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, file: RegistryFile) -> PathBuf {
        self.dir.join(format!("{}.previous", file.default_file_name()))
    }

    /// The snapshot saved by the last pass, if any.
    pub async fn load_previous(&self, file: RegistryFile) -> Option<Vec<u8>> {
        match tokio::fs::read(self.path_for(file)).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "Failed to read snapshot");
                None
            }
        }
    }

    /// Replace the snapshot for `file`. Written to a temporary file first so a
    /// crash never leaves a truncated snapshot behind.
    pub async fn save(&self, file: RegistryFile, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.path_for(file);
        let tmp = tmp_path(&target);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn directory_source_decodes_latin1() {
        let dir = tempfile::tempdir().unwrap();
        // "GÉLULE" in Latin-1, followed by a blank line.
        let bytes = b"CIS001\tG\xC9LULE\r\n\r\nCIS002\tX\n".to_vec();
        std::fs::write(dir.path().join("CIS_bdpm.txt"), bytes).unwrap();

        let source = DirectoryRegistrySource::new(dir.path());
        let fetched = source.fetch(RegistryFile::Catalog).await.unwrap();

        assert_eq!(fetched.lines, vec!["CIS001\tGÉLULE", "CIS002\tX"]);
    }

    #[tokio::test]
    async fn missing_local_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryRegistrySource::new(dir.path());

        let err = source.fetch(RegistryFile::Shortage).await.unwrap_err();

        assert_matches!(
            err,
            SourceError::SourceUnavailable {
                file: RegistryFile::Shortage,
                ..
            }
        );
    }

    #[tokio::test]
    async fn http_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shortage.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let urls = HashMap::from([(
            RegistryFile::Shortage,
            format!("{}/shortage.txt", server.uri()),
        )]);
        let source = HttpRegistrySource::new(urls, Duration::from_secs(5)).unwrap();

        let err = source.fetch(RegistryFile::Shortage).await.unwrap_err();

        assert_matches!(err, SourceError::SourceUnavailable { ref reason, .. } if reason == "HTTP 500");
    }

    #[tokio::test]
    async fn http_source_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CIS001\tA\n".to_vec()))
            .mount(&server)
            .await;
        let urls = HashMap::from([(
            RegistryFile::Catalog,
            format!("{}/catalog.txt", server.uri()),
        )]);
        let source = HttpRegistrySource::new(urls, Duration::from_secs(5)).unwrap();

        let fetched = source.fetch(RegistryFile::Catalog).await.unwrap();
        assert_eq!(fetched.lines, vec!["CIS001\tA"]);

        let err = source.fetch(RegistryFile::Composition).await.unwrap_err();
        assert_eq!(err.file(), RegistryFile::Composition);
    }

    #[test]
    fn binary_payload_is_a_decode_error() {
        let err = FetchedFile::decode(RegistryFile::Catalog, vec![b'P', b'K', 0, 3]).unwrap_err();
        assert_matches!(err, SourceError::DecodeError { .. });
    }

    #[tokio::test]
    async fn snapshot_round_trip_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"));

        assert!(store.load_previous(RegistryFile::Shortage).await.is_none());
        store.save(RegistryFile::Shortage, b"one").await.unwrap();
        store.save(RegistryFile::Shortage, b"two").await.unwrap();

        assert_eq!(
            store.load_previous(RegistryFile::Shortage).await.as_deref(),
            Some(&b"two"[..])
        );
    }
}
