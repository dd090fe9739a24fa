use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;

use super::types::FileType;
use super::ExtractionError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp"];
const IMAGE_CONTENT_MARKERS: &[&str] = &["image/", "jpeg", "jpg", "png", "tiff", "bmp"];

/// Where a document comes from: an `http(s)` URL or a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Remote(String),
    Local(PathBuf),
}

impl DocumentSource {
    pub fn parse(source_ref: &str) -> Self {
        let trimmed = source_ref.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(trimmed.to_string())
        } else {
            Self::Local(PathBuf::from(trimmed))
        }
    }

    /// Last path segment, without query string or fragment.
    pub fn file_name(&self) -> Option<String> {
        let name = match self {
            Self::Remote(url) => url_path(url).rsplit('/').next().unwrap_or_default().to_string(),
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        (!name.is_empty()).then_some(name)
    }

    /// Lowercase extension without the leading dot, or empty.
    pub fn extension(&self) -> String {
        self.file_name()
            .and_then(|name| {
                Path::new(&name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
            })
            .unwrap_or_default()
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl std::fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Path component of a URL: scheme and authority removed, query and
/// fragment cut off.
fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let end = without_scheme
        .find(['?', '#'])
        .unwrap_or(without_scheme.len());
    let without_query = &without_scheme[..end];
    match without_query.find('/') {
        Some(idx) => &without_query[idx..],
        None => "",
    }
}

/// Raw bytes of a fetched document plus the server-declared content type.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Byte retrieval abstraction (allows mocking for tests)
pub trait DocumentFetcher {
    fn fetch(&self, source: &DocumentSource) -> Result<FetchedDocument, ExtractionError>;
}

/// Fetches remote documents with a blocking HTTP GET and reads local ones
/// from disk.
pub struct SourceFetcher {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl SourceFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Fetch {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn fetch_remote(&self, url: &str) -> Result<FetchedDocument, ExtractionError> {
        let response = self.client.get(url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timed out after {}s", self.timeout_secs)
            } else {
                e.to_string()
            };
            ExtractionError::Fetch {
                url: url.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        let bytes = response.bytes().map_err(|e| ExtractionError::Fetch {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

        debug!(
            url = %url,
            content_type = ?content_type,
            size = bytes.len(),
            "Downloaded document"
        );

        Ok(FetchedDocument {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

impl DocumentFetcher for SourceFetcher {
    fn fetch(&self, source: &DocumentSource) -> Result<FetchedDocument, ExtractionError> {
        match source {
            DocumentSource::Remote(url) => self.fetch_remote(url),
            DocumentSource::Local(path) => Ok(FetchedDocument {
                bytes: std::fs::read(path)?,
                content_type: None,
            }),
        }
    }
}

/// Decide the document format from the declared content type and the
/// path extension. PDF wins over image, image over plain text.
pub fn classify_format(
    content_type: Option<&str>,
    extension: &str,
) -> Result<FileType, ExtractionError> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();

    if content_type.contains("pdf") || extension == "pdf" {
        return Ok(FileType::Pdf);
    }

    if IMAGE_CONTENT_MARKERS.iter().any(|m| content_type.contains(m))
        || IMAGE_EXTENSIONS.contains(&extension.as_str())
    {
        return Ok(FileType::Image);
    }

    if content_type.contains("text/plain") || extension == "txt" {
        return Ok(FileType::Text);
    }

    Err(ExtractionError::UnsupportedFormat {
        content_type,
        extension,
    })
}

// ── Mock for testing ──────────────────────────────────────

/// Mock fetcher serving fixed bytes, or a fixed HTTP failure status.
pub struct MockDocumentFetcher {
    bytes: Vec<u8>,
    content_type: Option<String>,
    status: Option<u16>,
    fetch_count: AtomicUsize,
}

impl MockDocumentFetcher {
    pub fn new(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        Self {
            bytes,
            content_type: content_type.map(str::to_string),
            status: None,
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Every fetch fails with the given HTTP status.
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(Vec::new(), None)
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl DocumentFetcher for MockDocumentFetcher {
    fn fetch(&self, source: &DocumentSource) -> Result<FetchedDocument, ExtractionError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.status {
            return Err(ExtractionError::HttpStatus {
                url: source.to_string(),
                status,
            });
        }
        Ok(FetchedDocument {
            bytes: self.bytes.clone(),
            content_type: self.content_type.clone(),
        })
    }
}
