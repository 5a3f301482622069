// src/pdf/redact.rs
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::Serialize;

use crate::pdf::geometry::Rect;
use crate::pdf::layout::{PageLayout, RedactionStats};
use crate::storage::write_atomically;
use crate::utils::error::PdfError;

/// Identity lines blacked out on the first page of every transcript.
pub const DEFAULT_MARKERS: [&str; 2] = ["Information for", "Name :"];

/// A page that can be searched for text and irreversibly redacted.
pub trait RedactablePage {
    fn width(&self) -> f32;

    /// Bounding rectangles of every occurrence of `phrase`, top-left origin.
    fn search_for(&self, phrase: &str) -> Vec<Rect>;

    /// Queues a region; nothing changes until `apply_redactions`.
    fn add_redaction(&mut self, region: Rect);

    /// Removes content under every queued region and paints the regions black.
    fn apply_redactions(&mut self) -> Result<RedactionStats, PdfError>;
}

/// First-page view over a loaded lopdf document.
pub struct LopdfPage<'d> {
    doc: &'d mut Document,
    layout: PageLayout,
    pending: Vec<Rect>,
}

impl<'d> LopdfPage<'d> {
    pub fn new(doc: &'d mut Document, page_id: ObjectId) -> Result<Self, PdfError> {
        let layout = PageLayout::build(doc, page_id)?;
        Ok(Self { doc, layout, pending: Vec::new() })
    }

    pub fn first(doc: &'d mut Document) -> Result<Self, PdfError> {
        let page_id = doc.page_iter().next().ok_or(PdfError::PageNotFound(1))?;
        Self::new(doc, page_id)
    }
}

impl RedactablePage for LopdfPage<'_> {
    fn width(&self) -> f32 {
        self.layout.width
    }

    fn search_for(&self, phrase: &str) -> Vec<Rect> {
        self.layout.search(phrase)
    }

    fn add_redaction(&mut self, region: Rect) {
        self.pending.push(region);
    }

    fn apply_redactions(&mut self) -> Result<RedactionStats, PdfError> {
        if self.pending.is_empty() {
            return Ok(RedactionStats::default());
        }
        let redacted = self.layout.encode_redacted(&self.pending)?;
        let stream_id = self.doc.add_object(Stream::new(dictionary! {}, redacted.page));

        let page_id = self.layout.page_id;
        self.doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)?
            .set("Contents", stream_id);

        // forms are shared by reference, so a rewritten form is redacted wherever it is drawn
        for (form_id, content) in redacted.forms {
            tracing::debug!("Rewriting form XObject {:?} on page {:?}", form_id, page_id);
            self.doc
                .get_object_mut(form_id)
                .and_then(Object::as_stream_mut)?
                .set_plain_content(content);
        }

        self.pending.clear();
        self.layout = PageLayout::build(self.doc, page_id)?;
        Ok(redacted.stats)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactionOutcome {
    pub path: PathBuf,
    pub regions: Vec<Rect>,
    pub removed: usize, // text operations, paths and images taken out of the stream
    pub modified: bool,
}

/// Blacks out identity lines, stretched to the full page width.
#[derive(Debug, Clone)]
pub struct IdentityRedactor {
    markers: Vec<String>,
}

impl Default for IdentityRedactor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl IdentityRedactor {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Full-width regions covering every marker occurrence on `page`.
    pub fn plan<P: RedactablePage + ?Sized>(&self, page: &P) -> Vec<Rect> {
        let width = page.width();
        self.markers
            .iter()
            .flat_map(|marker| {
                let hits = page.search_for(marker);
                if hits.is_empty() {
                    tracing::debug!("Marker '{}' not found", marker);
                }
                hits
            })
            .map(|hit| hit.full_width(width))
            .collect()
    }

    /// Registers all regions, then commits them in one pass.
    pub fn redact_page<P: RedactablePage + ?Sized>(&self, page: &mut P) -> Result<(Vec<Rect>, RedactionStats), PdfError> {
        let regions = self.plan(page);
        if regions.is_empty() {
            return Ok((regions, RedactionStats::default()));
        }
        for region in &regions {
            page.add_redaction(*region);
        }
        let stats = page.apply_redactions()?;
        Ok((regions, stats))
    }

    /// Redacts the first page of the PDF at `path` in place.
    ///
    /// The file is only rewritten when at least one marker matched, and then through a
    /// temporary sibling that replaces the original in a single rename.
    pub fn redact_file<P: AsRef<Path>>(&self, path: P) -> Result<RedactionOutcome, PdfError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut doc = Document::load_mem(&bytes).map_err(|e| PdfError::Unreadable(e.to_string()))?;

        let (regions, stats) = {
            let mut page = LopdfPage::first(&mut doc)?;
            self.redact_page(&mut page)?
        };

        if regions.is_empty() {
            tracing::info!("No identity markers in {}, leaving it untouched", path.display());
            return Ok(RedactionOutcome {
                path: path.to_path_buf(),
                regions,
                removed: 0,
                modified: false,
            });
        }

        doc.prune_objects();
        doc.delete_zero_length_streams();
        doc.renumber_objects();
        doc.compress();
        write_atomically(path, |file| doc.save_to(file))?;

        tracing::info!(
            "Redacted {} region(s) in {} ({} text ops, {} paths, {} images removed)",
            regions.len(),
            path.display(),
            stats.text_ops_removed,
            stats.paths_removed,
            stats.images_removed
        );
        Ok(RedactionOutcome {
            path: path.to_path_buf(),
            regions,
            removed: stats.total(),
            modified: true,
        })
    }
}
