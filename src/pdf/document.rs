// src/pdf/document.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lopdf::{Document, ObjectId};

use crate::pdf::layout::PageLayout;
use crate::utils::error::PdfError;

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Layout,   // glyph geometry grouped into lines
    Fallback, // pdf-extract plain text
}

#[derive(Debug, Clone)]
pub struct TranscriptPage {
    pub number: u32, // 1-based
    pub text: String,
}

/// Read-only text model of a transcript PDF.
#[derive(Debug, Clone)]
pub struct TranscriptDocument {
    pub pages: Vec<TranscriptPage>,
    pub source: TextSource,
}

impl TranscriptDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::Unreadable(e.to_string()))?;
        let pages = layout_pages(&doc, doc.get_pages());

        if pages.iter().any(|page| !page.text.trim().is_empty()) {
            return Ok(Self { pages, source: TextSource::Layout });
        }

        tracing::warn!("No text found via page layout, falling back to pdf-extract");
        let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| PdfError::Unreadable(e.to_string()))?;
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(idx, text)| TranscriptPage {
                number: idx as u32 + 1,
                text: collapse_columns(&text),
            })
            .collect();
        Ok(Self { pages, source: TextSource::Fallback })
    }

    /// All pages joined by newlines, the input the grade extractor consumes.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Page text from the layout model. A page that cannot be interpreted keeps an empty
/// text so the remaining pages are still graded.
fn layout_pages(doc: &Document, page_ids: BTreeMap<u32, ObjectId>) -> Vec<TranscriptPage> {
    page_ids
        .into_iter()
        .map(|(number, page_id)| {
            let text = match PageLayout::build(doc, page_id) {
                Ok(layout) => layout.text(),
                Err(e) => {
                    tracing::warn!("Skipping page {}: {}", number, e);
                    String::new()
                }
            };
            tracing::trace!("Page {}: {} chars of layout text", number, text.len());
            TranscriptPage { number, text }
        })
        .collect()
}

// pdf-extract pads columns with runs of spaces; reduce them to one.
fn collapse_columns(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}
