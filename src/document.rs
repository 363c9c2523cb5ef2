use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_by_pages;
use std::fs;
use std::path::Path;

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The full extracted text of the document
    pub content: String,
    /// The document's file name (used as document ID)
    pub document_id: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .context("Invalid file name")?
            .to_str()
            .context("Invalid file name encoding")?
            .to_string();

        // Detect MIME type
        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(path, &mime_type)?;

        if content.trim().is_empty() {
            warn!("Extracted content of {} is empty", file_name);
        }

        Ok(Document {
            content,
            document_id: file_name,
            mime_type,
        })
    }
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            extract_pdf_text(path)
        }

        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            Ok(content)
        }

        _ => Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only text and PDF files are supported.",
            mime_type
        )),
    }
}

/// Extract the text of every page, in page order, joined without a separator
pub fn extract_pdf_text<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let path = file_path.as_ref();
    let pages = extract_text_by_pages(path)
        .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;
    debug!("Extracted {} pages from {}", pages.len(), path.display());

    Ok(pages.concat())
}
