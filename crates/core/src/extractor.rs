use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Formats accepted for ingestion, declared by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Text,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl FileFormat {
    /// Reject unknown extensions before any I/O happens.
    pub fn detect(path: &Path) -> Result<FileFormat, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileFormat::Pdf),
            "docx" | "doc" => Ok(FileFormat::Docx),
            "txt" => Ok(FileFormat::Text),
            other => Err(ExtractError::Unsupported(format!(".{}", other))),
        }
    }
}

/// Pull the raw text out of a file.
///
/// PDF pages and DOCX paragraphs are concatenated in document order. The
/// parsers are synchronous, so they run on the blocking pool.
pub async fn extract_text(path: &Path, format: FileFormat) -> Result<String, ExtractError> {
    match format {
        FileFormat::Text => {
            let bytes = tokio::fs::read(path).await.map_err(|e| ExtractError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            String::from_utf8(bytes).map_err(|e| ExtractError::Parse {
                path: path.to_path_buf(),
                message: format!("not valid utf-8: {}", e),
            })
        }
        FileFormat::Pdf => {
            let owned = path.to_path_buf();
            let result = tokio::task::spawn_blocking(move || pdf_text(&owned))
                .await
                .map_err(|e| ExtractError::Parse {
                    path: path.to_path_buf(),
                    message: format!("extraction task failed: {}", e),
                })?;
            result
        }
        FileFormat::Docx => {
            let owned = path.to_path_buf();
            let result = tokio::task::spawn_blocking(move || docx_text(&owned))
                .await
                .map_err(|e| ExtractError::Parse {
                    path: path.to_path_buf(),
                    message: format!("extraction task failed: {}", e),
                })?;
            result
        }
    }
}

fn pdf_text(path: &Path) -> Result<String, ExtractError> {
    pdf_extract::extract_text(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "pdf extraction failed");
        ExtractError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })
}

/// A .docx is a zip archive; the paragraph text lives in `word/document.xml`
/// as `w:t` runs grouped under `w:p` paragraphs.
fn docx_text(path: &Path) -> Result<String, ExtractError> {
    let file = std::fs::File::open(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractError::Parse {
        path: path.to_path_buf(),
        message: format!("not a docx archive: {}", e),
    })?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Parse {
            path: path.to_path_buf(),
            message: format!("missing word/document.xml: {}", e),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    document_xml_text(&xml).map_err(|message| ExtractError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn document_xml_text(xml: &str) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Event::Text(t) if in_text_run => {
                out.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}
