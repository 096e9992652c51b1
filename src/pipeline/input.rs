//! Input resolution: turn a user-supplied path or URL into a local PDF.
//!
//! pdfium opens files by path, so URL inputs are downloaded into a `TempDir`
//! that lives as long as the [`ResolvedInput`]. Both branches check the `%PDF`
//! magic before returning.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF ready to open, local or downloaded.
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded from `url`; the file is removed when this value is dropped.
    Downloaded {
        url: String,
        path: PathBuf,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// The URL the document came from, when it was downloaded.
    pub fn source_url(&self) -> Option<&str> {
        match self {
            ResolvedInput::Local(_) => None,
            ResolvedInput::Downloaded { url, .. } => Some(url),
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF, downloading HTTP(S) URLs first.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    if input.trim().is_empty() {
        return Err(ExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ExtractError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(ExtractError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(ExtractError::FileNotFound { path }),
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| ExtractError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let temp_dir = TempDir::new().map_err(|e| ExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    if bytes.len() < PDF_MAGIC.len() || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ExtractError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExtractError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        url: url.to_string(),
        path: file_path,
        _temp_dir: temp_dir,
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
        assert!(is_url("https://www.njta.com/media/7436/2024-annual-report.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            filename_from_url("https://example.com/reports/fy2025.pdf?x=1"),
            "fy2025.pdf"
        );
        assert_eq!(filename_from_url("https://example.com/download"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/no/such/file.pdf", 5).await.err().unwrap();
        assert!(matches!(err, ExtractError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.err().unwrap();
        assert!(matches!(err, ExtractError::InvalidInput { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_input(tmp.path().to_str().unwrap(), 5)
            .await
            .err()
            .unwrap();
        match err {
            ExtractError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_pdf_resolves_without_source_url() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), tmp.path());
        assert!(resolved.source_url().is_none());
    }
}
