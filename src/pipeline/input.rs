//! Input resolution: normalise a user-supplied path or URL to a local PDF.
//!
//! pdfium needs a file-system path, and the analysis service needs the raw
//! bytes. A URL input is downloaded into a `TempDir` that lives as long as
//! the [`ResolvedInput`], so cleanup happens even on early return. The PDF
//! magic bytes (`%PDF`) are checked before anything is uploaded.

use crate::error::AnalysisError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A PDF ready for upload: its bytes plus a path pdfium can open.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    bytes: Vec<u8>,
    _temp_dir: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file and its contents.
///
/// An empty input is rejected: the upload boundary requires exactly one file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, AnalysisError> {
    if input.trim().is_empty() {
        return Err(AnalysisError::InvalidInput {
            input: input.to_string(),
            reason: "no file attached".into(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Reject anything that does not start with `%PDF`.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), AnalysisError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(AnalysisError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

async fn resolve_local(path_str: &str) -> Result<ResolvedInput, AnalysisError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AnalysisError::FileNotFound { path });
        }
        Err(e) => {
            return Err(AnalysisError::InvalidInput {
                input: path_str.to_string(),
                reason: e.to_string(),
            });
        }
    };
    check_pdf_magic(&bytes)?;

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        path,
        bytes,
        _temp_dir: None,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, AnalysisError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| AnalysisError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?
        .to_vec();
    check_pdf_magic(&bytes)?;

    let temp_dir = TempDir::new().map_err(|e| AnalysisError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename_from_url(url));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| AnalysisError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded to: {}", path.display());
    Ok(ResolvedInput {
        path,
        bytes,
        _temp_dir: Some(temp_dir),
    })
}

/// Last path segment when it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/dua.pdf"));
        assert!(is_url("http://example.com/dua.pdf"));
        assert!(!is_url("/tmp/dua.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_extraction() {
        assert_eq!(filename_from_url("https://x.test/a/dua-123.pdf"), "dua-123.pdf");
        assert_eq!(filename_from_url("https://x.test/a/"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://x.test/download"), "downloaded.pdf");
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic(b"%PDF-1.4").is_ok());
        let err = check_pdf_magic(b"GIF8").unwrap_err();
        assert_eq!(err.kind(), "NOT_A_PDF");
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert_eq!(err.kind(), "FILE_NOT_FOUND");
    }

    #[tokio::test]
    async fn local_pdf_resolves() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.7\n%%EOF").unwrap();
        let resolved = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.bytes(), b"%PDF-1.7\n%%EOF");
        assert_eq!(resolved.path(), tmp.path());
    }

    #[tokio::test]
    async fn local_non_pdf_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let err = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_A_PDF");
    }
}
