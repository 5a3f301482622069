// src/pdf/layout.rs
//! Content-stream interpreter producing the geometric model of one page.
//!
//! Glyphs are positioned in page space (top-left origin) so that search hits and
//! redaction regions share one coordinate system. The decoded operations are kept
//! alongside the geometry so a redacted stream can be re-emitted from them.
//!
//! Form XObjects are interpreted in place. Their operations are kept per form so that
//! text a form draws can be removed by rewriting the form stream itself.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Range;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::pdf::fonts::FontInfo;
use crate::pdf::geometry::{Matrix, Rect};
use crate::utils::error::PdfError;

// --- Constants ---
/// US Letter, used when neither CropBox nor MediaBox can be found.
const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
/// Horizontal gap, as a fraction of the font size, that separates two words.
const WORD_GAP_RATIO: f32 = 0.15;
/// Baseline drift, as a fraction of the font size, still treated as the same line.
const BASELINE_TOLERANCE_RATIO: f32 = 0.3;
/// Guards against runaway Parent chains when looking up inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;
/// Nesting limit for forms drawing forms.
const MAX_FORM_DEPTH: usize = 16;
/// Stream index of the page's own content; form `n` is stream `n + 1`.
pub const PAGE_STREAM: usize = 0;

// --- Data Structures ---
#[derive(Debug, Clone)]
pub struct Glyph {
    pub text: String,
    pub rect: Rect,
    pub baseline: f32,
    pub size: f32, // rendered font size in page units
}

/// Operator form of a text-showing operation, needed to re-emit its positioning.
#[derive(Debug, Clone)]
pub enum ShowKind {
    Show,     // Tj
    ShowList, // TJ
    NextLine, // '
    NextLineSpaced { word_spacing: Object, char_spacing: Object }, // "
}

#[derive(Debug, Clone)]
pub struct TextShow {
    pub stream: usize,
    pub op_index: usize,
    pub kind: ShowKind,
    pub advance: f32, // horizontal text-space displacement of the whole operation
    pub font_size: f32,
    pub h_scale: f32,
    pub glyphs: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct PathPaint {
    pub stream: usize,
    pub ops: Range<usize>, // first construction operator through the painting operator
    pub rect: Option<Rect>,
    pub clips: bool,
}

#[derive(Debug, Clone)]
pub struct ImagePlacement {
    pub stream: usize,
    pub op_index: usize,
    pub rect: Rect,
}

/// Decoded operations of a Form XObject reached from the page.
#[derive(Debug, Clone)]
pub struct FormStream {
    pub id: ObjectId,
    pub operations: Vec<Operation>,
}

/// A visual line of text with the page rectangle of each contributing glyph.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    spans: Vec<(Range<usize>, Rect)>,
}

impl TextLine {
    /// Rectangles of every occurrence of `phrase`, whitespace-normalized, in this line.
    pub fn find(&self, phrase: &str) -> Vec<Rect> {
        let needle = normalize_whitespace(phrase);
        if needle.is_empty() {
            return Vec::new();
        }
        self.text
            .match_indices(&needle)
            .filter_map(|(start, matched)| {
                let end = start + matched.len();
                self.spans
                    .iter()
                    .filter(|(range, _)| range.start < end && range.end > start)
                    .map(|(_, rect)| *rect)
                    .reduce(|acc, rect| acc.union(&rect))
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RedactionStats {
    pub text_ops_removed: usize,
    pub paths_removed: usize,
    pub images_removed: usize,
}

impl RedactionStats {
    pub fn total(&self) -> usize {
        self.text_ops_removed + self.paths_removed + self.images_removed
    }
}

/// Rewritten operations for the page and for every form that lost content.
#[derive(Debug, Clone)]
pub struct RedactedContent {
    pub page: Vec<Operation>,
    pub forms: Vec<(ObjectId, Vec<Operation>)>,
    pub stats: RedactionStats,
}

/// Encoded form of [`RedactedContent`], ready to be stored back into the document.
#[derive(Debug, Clone)]
pub struct RedactedStreams {
    pub page: Vec<u8>,
    pub forms: Vec<(ObjectId, Vec<u8>)>,
    pub stats: RedactionStats,
}

#[derive(Debug, Clone)]
pub struct PageLayout {
    pub page_id: ObjectId,
    pub width: f32,
    page_box: [f32; 4],
    pub operations: Vec<Operation>,
    pub forms: Vec<FormStream>,
    pub glyphs: Vec<Glyph>,
    pub shows: Vec<TextShow>,
    pub paths: Vec<PathPaint>,
    pub images: Vec<ImagePlacement>,
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- Page attributes ---
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let read = |key: &[u8]| -> Option<[f32; 4]> {
        let values = inherited_attribute(doc, page_id, key)?.as_array().ok()?;
        let nums: Vec<f32> = values.iter().filter_map(|v| v.as_float().ok()).collect();
        match nums.as_slice() {
            [a, b, c, d] => Some([a.min(*c), b.min(*d), a.max(*c), b.max(*d)]),
            _ => None,
        }
    };
    read(b"CropBox")
        .or_else(|| read(b"MediaBox"))
        .unwrap_or(DEFAULT_PAGE_BOX)
}

// --- Resources ---
#[derive(Debug, Clone, Copy)]
enum XObjectKind {
    Image,
    Form(ObjectId),
}

fn resolved_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let value = dict.get(key).ok()?;
    doc.dereference(value).ok().and_then(|(_, obj)| obj.as_dict().ok())
}

fn collect_xobjects(doc: &Document, resources: &Dictionary, into: &mut BTreeMap<Vec<u8>, XObjectKind>) {
    let Some(xobjects) = resolved_dict(doc, resources, b"XObject") else {
        return;
    };
    for (name, value) in xobjects.iter() {
        let Ok((id, object)) = doc.dereference(value) else {
            continue;
        };
        let Ok(stream) = object.as_stream() else {
            continue;
        };
        let kind = match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(subtype) if subtype == b"Image" => XObjectKind::Image,
            Ok(subtype) if subtype == b"Form" => match id {
                Some(id) => XObjectKind::Form(id),
                None => continue,
            },
            _ => continue,
        };
        into.insert(name.clone(), kind);
    }
}

fn page_xobjects(doc: &Document, page_id: ObjectId) -> BTreeMap<Vec<u8>, XObjectKind> {
    let mut xobjects = BTreeMap::new();
    let Ok((resource_dict, resource_ids)) = doc.get_page_resources(page_id) else {
        return xobjects;
    };
    if let Some(resources) = resource_dict {
        collect_xobjects(doc, resources, &mut xobjects);
    }
    for id in resource_ids {
        if let Ok(resources) = doc.get_dictionary(id) {
            collect_xobjects(doc, resources, &mut xobjects);
        }
    }
    xobjects
}

fn resource_fonts<'a>(doc: &'a Document, resources: &'a Dictionary) -> BTreeMap<Vec<u8>, FontInfo<'a>> {
    let mut fonts = BTreeMap::new();
    let Some(font_dict) = resolved_dict(doc, resources, b"Font") else {
        return fonts;
    };
    for (name, value) in font_dict.iter() {
        if let Some(dict) = doc.dereference(value).ok().and_then(|(_, obj)| obj.as_dict().ok()) {
            fonts.insert(name.clone(), FontInfo::from_dict(doc, dict));
        }
    }
    fonts
}

// --- Interpreter ---
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct PendingPath {
    start: usize,
    points: Vec<(f32, f32)>,
    clips: bool,
}

struct Interpreter<'a> {
    doc: &'a Document,
    page_box: [f32; 4],
    fonts: BTreeMap<Vec<u8>, FontInfo<'a>>,
    fallback_font: FontInfo<'a>,
    xobjects: BTreeMap<Vec<u8>, XObjectKind>,
    gs: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    path: Option<PendingPath>,
    stream: usize,
    active_forms: Vec<ObjectId>,
    form_index: BTreeMap<ObjectId, usize>,
    forms: Vec<FormStream>,
    glyphs: Vec<Glyph>,
    shows: Vec<TextShow>,
    paths: Vec<PathPaint>,
    placements: Vec<ImagePlacement>,
}

fn operand(operands: &[Object], idx: usize) -> f32 {
    operands.get(idx).and_then(|o| o.as_float().ok()).unwrap_or(0.0)
}

fn matrix_operands(operands: &[Object]) -> Matrix {
    Matrix::new(
        operand(operands, 0),
        operand(operands, 1),
        operand(operands, 2),
        operand(operands, 3),
        operand(operands, 4),
        operand(operands, 5),
    )
}

impl<'a> Interpreter<'a> {
    /// PDF user space (y up) to page space (y down, origin at the page box corner).
    fn to_page(&self, rect: Rect) -> Rect {
        let [llx, _, _, ury] = self.page_box;
        Rect::new(rect.x0 - llx, ury - rect.y1, rect.x1 - llx, ury - rect.y0)
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn run(&mut self, operations: &[Operation]) {
        for (idx, op) in operations.iter().enumerate() {
            let args = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.gs.clone()),
                "Q" => {
                    if let Some(saved) = self.stack.pop() {
                        self.gs = saved;
                    }
                }
                "cm" => self.gs.ctm = matrix_operands(args).then(&self.gs.ctm),
                "BT" => {
                    self.tm = Matrix::identity();
                    self.tlm = Matrix::identity();
                }
                "Tf" => {
                    self.gs.font = args.first().and_then(|o| o.as_name().ok()).map(|n| n.to_vec());
                    self.gs.font_size = operand(args, 1);
                }
                "Tc" => self.gs.char_spacing = operand(args, 0),
                "Tw" => self.gs.word_spacing = operand(args, 0),
                "Tz" => self.gs.h_scale = operand(args, 0) / 100.0,
                "TL" => self.gs.leading = operand(args, 0),
                "Ts" => self.gs.rise = operand(args, 0),
                "Td" => self.move_line(operand(args, 0), operand(args, 1)),
                "TD" => {
                    self.gs.leading = -operand(args, 1);
                    self.move_line(operand(args, 0), operand(args, 1));
                }
                "Tm" => {
                    self.tm = matrix_operands(args);
                    self.tlm = self.tm;
                }
                "T*" => self.move_line(0.0, -self.gs.leading),
                "Tj" => self.show(idx, ShowKind::Show, args),
                "TJ" => {
                    let parts = args.first().and_then(|o| o.as_array().ok()).map(Vec::as_slice).unwrap_or(&[]);
                    self.show(idx, ShowKind::ShowList, parts);
                }
                "'" => {
                    self.move_line(0.0, -self.gs.leading);
                    self.show(idx, ShowKind::NextLine, args);
                }
                "\"" => {
                    let word_spacing = args.first().cloned().unwrap_or(Object::Integer(0));
                    let char_spacing = args.get(1).cloned().unwrap_or(Object::Integer(0));
                    self.gs.word_spacing = operand(args, 0);
                    self.gs.char_spacing = operand(args, 1);
                    self.move_line(0.0, -self.gs.leading);
                    let shown: Vec<Object> = args.iter().skip(2).cloned().collect();
                    self.show(idx, ShowKind::NextLineSpaced { word_spacing, char_spacing }, &shown);
                }
                "m" | "l" => self.path_points(idx, &[(operand(args, 0), operand(args, 1))]),
                "c" => self.path_points(
                    idx,
                    &[
                        (operand(args, 0), operand(args, 1)),
                        (operand(args, 2), operand(args, 3)),
                        (operand(args, 4), operand(args, 5)),
                    ],
                ),
                "v" | "y" => self.path_points(
                    idx,
                    &[(operand(args, 0), operand(args, 1)), (operand(args, 2), operand(args, 3))],
                ),
                "re" => {
                    let (x, y, w, h) = (operand(args, 0), operand(args, 1), operand(args, 2), operand(args, 3));
                    self.path_points(idx, &[(x, y), (x + w, y), (x, y + h), (x + w, y + h)]);
                }
                "h" => self.path_points(idx, &[]),
                "W" | "W*" => {
                    if let Some(path) = self.path.as_mut() {
                        path.clips = true;
                    }
                }
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => self.paint(idx),
                "Do" => {
                    let Some(name) = args.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    match self.xobjects.get(name).copied() {
                        Some(XObjectKind::Image) => {
                            let rect = self.to_page(self.gs.ctm.apply_box(0.0, 0.0, 1.0, 1.0));
                            self.placements.push(ImagePlacement {
                                stream: self.stream,
                                op_index: idx,
                                rect,
                            });
                        }
                        Some(XObjectKind::Form(id)) => self.draw_form(id),
                        None => {}
                    }
                }
                _ => {}
            }
        }
    }

    /// Runs a form's operations under its own matrix and resources, as if wrapped in q/Q.
    fn draw_form(&mut self, id: ObjectId) {
        if self.active_forms.contains(&id) || self.active_forms.len() >= MAX_FORM_DEPTH {
            tracing::warn!("Skipping form XObject {:?}: recursive or nested too deeply", id);
            return;
        }
        let doc = self.doc;
        let Some(stream) = doc.get_object(id).ok().and_then(|obj| obj.as_stream().ok()) else {
            return;
        };

        let stream_index = match self.form_index.get(&id).copied() {
            Some(index) => index,
            None => {
                let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
                let operations = match Content::decode(&data) {
                    Ok(content) => content.operations,
                    Err(e) => {
                        tracing::warn!("Form XObject {:?} could not be decoded: {}", id, e);
                        return;
                    }
                };
                self.forms.push(FormStream { id, operations });
                let index = self.forms.len();
                self.form_index.insert(id, index);
                index
            }
        };
        let operations = self.forms[stream_index - 1].operations.clone();

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .map(|values| matrix_operands(values))
            .unwrap_or_else(|_| Matrix::identity());
        let resources = resolved_dict(doc, &stream.dict, b"Resources");

        let saved_gs = self.gs.clone();
        let saved_text = (self.tm, self.tlm);
        let saved_path = self.path.take();
        let saved_depth = self.stack.len();
        let saved_stream = std::mem::replace(&mut self.stream, stream_index);
        let saved_resources = resources.map(|resources| {
            let mut xobjects = BTreeMap::new();
            collect_xobjects(doc, resources, &mut xobjects);
            (
                std::mem::replace(&mut self.fonts, resource_fonts(doc, resources)),
                std::mem::replace(&mut self.xobjects, xobjects),
            )
        });

        self.gs.ctm = form_matrix.then(&self.gs.ctm);
        self.active_forms.push(id);
        self.run(&operations);
        self.active_forms.pop();

        if let Some((fonts, xobjects)) = saved_resources {
            self.fonts = fonts;
            self.xobjects = xobjects;
        }
        self.stream = saved_stream;
        self.stack.truncate(saved_depth);
        self.path = saved_path;
        (self.tm, self.tlm) = saved_text;
        self.gs = saved_gs;
    }

    fn path_points(&mut self, idx: usize, points: &[(f32, f32)]) {
        let mapped: Vec<(f32, f32)> = points.iter().map(|&(x, y)| self.gs.ctm.apply(x, y)).collect();
        let path = self.path.get_or_insert_with(|| PendingPath {
            start: idx,
            points: Vec::new(),
            clips: false,
        });
        path.points.extend(mapped);
    }

    fn paint(&mut self, idx: usize) {
        let Some(path) = self.path.take() else {
            return;
        };
        let rect = Rect::from_points(&path.points).map(|r| self.to_page(r));
        self.paths.push(PathPaint {
            stream: self.stream,
            ops: path.start..idx + 1,
            rect,
            clips: path.clips,
        });
    }

    fn show(&mut self, idx: usize, kind: ShowKind, parts: &[Object]) {
        let first_glyph = self.glyphs.len();
        let font_size = self.gs.font_size;
        let h_scale = self.gs.h_scale;
        let mut advance = 0.0;

        for part in parts {
            match part {
                Object::String(bytes, _) => {
                    let font = self
                        .gs
                        .font
                        .as_ref()
                        .and_then(|name| self.fonts.get(name))
                        .unwrap_or(&self.fallback_font);
                    let mut pending = Vec::new();
                    for code in font.codes(bytes) {
                        let w0 = font.width(code);
                        let render = Matrix::new(font_size * h_scale, 0.0, 0.0, font_size, 0.0, self.gs.rise)
                            .then(&self.tm)
                            .then(&self.gs.ctm);
                        let text = font.decode(code);
                        if !text.is_empty() {
                            let (_, base_y) = render.apply(0.0, 0.0);
                            let size = (render.c * render.c + render.d * render.d).sqrt();
                            pending.push(Glyph {
                                text,
                                rect: render.apply_box(0.0, font.descent, w0, font.ascent),
                                baseline: base_y,
                                size,
                            });
                        }
                        let spacing = if font.is_word_space(code) { self.gs.word_spacing } else { 0.0 };
                        let tx = (w0 * font_size + self.gs.char_spacing + spacing) * h_scale;
                        self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                        advance += tx;
                    }
                    for mut glyph in pending {
                        glyph.rect = self.to_page(glyph.rect);
                        glyph.baseline = self.page_box[3] - glyph.baseline;
                        self.glyphs.push(glyph);
                    }
                }
                other => {
                    if let Ok(adjust) = other.as_float() {
                        let tx = -adjust / 1000.0 * font_size * h_scale;
                        self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                        advance += tx;
                    }
                }
            }
        }

        self.shows.push(TextShow {
            stream: self.stream,
            op_index: idx,
            kind,
            advance,
            font_size,
            h_scale,
            glyphs: first_glyph..self.glyphs.len(),
        });
    }
}

impl PageLayout {
    /// Interprets the content stream of `page_id`, descending into the forms it draws.
    pub fn build(doc: &Document, page_id: ObjectId) -> Result<Self, PdfError> {
        doc.get_dictionary(page_id)?;
        let page_box = page_box(doc, page_id);
        let content = doc.get_and_decode_page_content(page_id)?;

        let fonts = doc
            .get_page_fonts(page_id)?
            .into_iter()
            .map(|(name, dict)| (name, FontInfo::from_dict(doc, dict)))
            .collect();

        let mut interpreter = Interpreter {
            doc,
            page_box,
            fonts,
            fallback_font: FontInfo::fallback(),
            xobjects: page_xobjects(doc, page_id),
            gs: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::identity(),
            tlm: Matrix::identity(),
            path: None,
            stream: PAGE_STREAM,
            active_forms: Vec::new(),
            form_index: BTreeMap::new(),
            forms: Vec::new(),
            glyphs: Vec::new(),
            shows: Vec::new(),
            paths: Vec::new(),
            placements: Vec::new(),
        };
        interpreter.run(&content.operations);

        tracing::trace!(
            "Page {:?}: {} ops, {} forms, {} glyphs, {} paths, {} images",
            page_id,
            content.operations.len(),
            interpreter.forms.len(),
            interpreter.glyphs.len(),
            interpreter.paths.len(),
            interpreter.placements.len()
        );

        Ok(PageLayout {
            page_id,
            width: page_box[2] - page_box[0],
            page_box,
            operations: content.operations,
            forms: interpreter.forms,
            glyphs: interpreter.glyphs,
            shows: interpreter.shows,
            paths: interpreter.paths,
            images: interpreter.placements,
        })
    }

    /// Groups glyphs into visual lines, top to bottom, left to right within a line.
    pub fn lines(&self) -> Vec<TextLine> {
        let mut order: Vec<usize> = (0..self.glyphs.len()).collect();
        order.sort_by(|&a, &b| self.glyphs[a].baseline.total_cmp(&self.glyphs[b].baseline));

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        let mut current_baseline = f32::NAN;
        for idx in order {
            let glyph = &self.glyphs[idx];
            let tolerance = BASELINE_TOLERANCE_RATIO * glyph.size.max(1.0);
            let same_line = !clusters.is_empty() && (glyph.baseline - current_baseline).abs() <= tolerance;
            if same_line {
                if let Some(cluster) = clusters.last_mut() {
                    cluster.push(idx);
                }
            } else {
                clusters.push(vec![idx]);
                current_baseline = glyph.baseline;
            }
        }

        clusters
            .into_iter()
            .map(|mut cluster| {
                cluster.sort_by(|&a, &b| self.glyphs[a].rect.x0.total_cmp(&self.glyphs[b].rect.x0));
                self.assemble_line(&cluster)
            })
            .filter(|line| !line.text.is_empty())
            .collect()
    }

    fn assemble_line(&self, cluster: &[usize]) -> TextLine {
        let mut text = String::new();
        let mut spans = Vec::new();
        let mut prev: Option<&Glyph> = None;

        for &idx in cluster {
            let glyph = &self.glyphs[idx];
            if let Some(prev) = prev {
                let gap = glyph.rect.x0 - prev.rect.x1;
                if gap > WORD_GAP_RATIO * glyph.size && !text.ends_with(' ') && !text.is_empty() {
                    text.push(' ');
                }
            }
            let start = text.len();
            for ch in glyph.text.chars() {
                if ch.is_whitespace() {
                    if !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                } else {
                    text.push(ch);
                }
            }
            if text.len() > start {
                spans.push((start..text.len(), glyph.rect));
            }
            prev = Some(glyph);
        }

        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
        spans.retain(|(range, _)| range.start < trimmed);
        TextLine { text, spans }
    }

    /// Layout-preserving text: one line per visual line, words separated by single spaces.
    pub fn text(&self) -> String {
        self.lines()
            .into_iter()
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every rectangle where `phrase` occurs on the page.
    pub fn search(&self, phrase: &str) -> Vec<Rect> {
        self.lines().iter().flat_map(|line| line.find(phrase)).collect()
    }

    /// Rewrites the content streams without anything under `regions`, then paints the regions black.
    ///
    /// Removed text operations are replaced by a bare TJ advance so that later text on the
    /// same line keeps its position. Forms are rewritten in place, so every placement of an
    /// affected form loses the removed operations. The black fills go on the page stream only.
    pub fn redacted_operations(&self, regions: &[Rect]) -> RedactedContent {
        let mut stats = RedactionStats::default();
        let covered = |rect: &Rect| regions.iter().any(|region| region.contains(rect));

        let mut replaced: BTreeMap<(usize, usize), Vec<Operation>> = BTreeMap::new();
        for show in &self.shows {
            let key = (show.stream, show.op_index);
            if replaced.contains_key(&key) {
                continue;
            }
            let hit = self.glyphs[show.glyphs.clone()].iter().any(|glyph| {
                let (cx, cy) = glyph.rect.center();
                regions.iter().any(|region| region.contains_point(cx, cy))
            });
            if hit {
                replaced.insert(key, advance_only(show));
                stats.text_ops_removed += 1;
            }
        }

        let mut dropped: HashSet<(usize, usize)> = HashSet::new();
        for path in &self.paths {
            if path.clips || dropped.contains(&(path.stream, path.ops.start)) {
                continue;
            }
            if path.rect.as_ref().map(covered).unwrap_or(false) {
                dropped.extend(path.ops.clone().map(|idx| (path.stream, idx)));
                stats.paths_removed += 1;
            }
        }
        for image in &self.images {
            if covered(&image.rect) && dropped.insert((image.stream, image.op_index)) {
                stats.images_removed += 1;
            }
        }

        let rewrite = |stream: usize, operations: &[Operation]| -> Vec<Operation> {
            let mut out = Vec::with_capacity(operations.len());
            for (idx, op) in operations.iter().enumerate() {
                if let Some(replacement) = replaced.get(&(stream, idx)) {
                    out.extend(replacement.iter().cloned());
                } else if !dropped.contains(&(stream, idx)) {
                    out.push(op.clone());
                }
            }
            out
        };

        let mut page = Vec::with_capacity(self.operations.len() + 2 + regions.len() * 5);
        page.push(Operation::new("q", vec![]));
        page.extend(rewrite(PAGE_STREAM, &self.operations));
        page.push(Operation::new("Q", vec![]));

        let [llx, _, _, ury] = self.page_box;
        for region in regions {
            page.extend([
                Operation::new("q", vec![]),
                Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
                Operation::new(
                    "re",
                    vec![
                        Object::Real(llx + region.x0),
                        Object::Real(ury - region.y1),
                        Object::Real(region.width()),
                        Object::Real(region.height()),
                    ],
                ),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ]);
        }

        let touched: BTreeSet<usize> = replaced
            .keys()
            .chain(dropped.iter())
            .map(|&(stream, _)| stream)
            .filter(|&stream| stream != PAGE_STREAM)
            .collect();
        let forms = touched
            .into_iter()
            .map(|stream| {
                let form = &self.forms[stream - 1];
                (form.id, rewrite(stream, &form.operations))
            })
            .collect();

        RedactedContent { page, forms, stats }
    }

    /// Encodes the redacted page stream and every rewritten form.
    pub fn encode_redacted(&self, regions: &[Rect]) -> Result<RedactedStreams, PdfError> {
        let RedactedContent { page, forms, stats } = self.redacted_operations(regions);
        let page = Content { operations: page }.encode()?;
        let forms = forms
            .into_iter()
            .map(|(id, operations)| -> Result<_, PdfError> { Ok((id, Content { operations }.encode()?)) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RedactedStreams { page, forms, stats })
    }
}

// Keeps the text-matrix movement of a removed show without painting anything.
fn advance_only(show: &TextShow) -> Vec<Operation> {
    let mut ops = Vec::new();
    match &show.kind {
        ShowKind::NextLine => ops.push(Operation::new("T*", vec![])),
        ShowKind::NextLineSpaced { word_spacing, char_spacing } => {
            ops.push(Operation::new("Tw", vec![word_spacing.clone()]));
            ops.push(Operation::new("Tc", vec![char_spacing.clone()]));
            ops.push(Operation::new("T*", vec![]));
        }
        ShowKind::Show | ShowKind::ShowList => {}
    }
    let scale = show.font_size * show.h_scale;
    if scale.abs() > f32::EPSILON && show.advance.abs() > f32::EPSILON {
        let adjust = -show.advance * 1000.0 / scale;
        ops.push(Operation::new("TJ", vec![Object::Array(vec![Object::Real(adjust)])]));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{self, FixtureBuilder, FixtureLine};

    fn first_page_layout(bytes: &[u8]) -> PageLayout {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.page_iter().next().unwrap();
        PageLayout::build(&doc, page_id).unwrap()
    }

    // "operand operand operator", with TJ arrays rendered as [n n].
    fn rendered(operations: &[Operation]) -> Vec<String> {
        operations
            .iter()
            .map(|op| {
                let mut parts: Vec<String> = op
                    .operands
                    .iter()
                    .map(|o| match o {
                        Object::Array(items) => format!(
                            "[{}]",
                            items
                                .iter()
                                .filter_map(|i| i.as_float().ok())
                                .map(|v| v.to_string())
                                .collect::<Vec<_>>()
                                .join(" ")
                        ),
                        other => other.as_float().map(|v| v.to_string()).unwrap_or_else(|_| "_".to_string()),
                    })
                    .collect();
                parts.push(op.operator.clone());
                parts.join(" ")
            })
            .collect()
    }

    fn contains_run(ops: &[String], run: &[&str]) -> bool {
        ops.windows(run.len()).any(|window| window.iter().map(String::as_str).eq(run.iter().copied()))
    }

    fn line_rects(layout: &PageLayout, baseline: f32) -> Vec<Rect> {
        layout
            .glyphs
            .iter()
            .filter(|g| (g.baseline - baseline).abs() < 1e-3)
            .map(|g| g.rect)
            .collect()
    }

    #[test]
    fn test_glyph_geometry_in_page_space() {
        let bytes = fixtures::single_page(&[FixtureLine::new(50.0, 100.0, "Name :")]);
        let layout = first_page_layout(&bytes);

        assert_eq!(layout.width, 612.0);
        assert_eq!(layout.glyphs.len(), 6);
        let first = &layout.glyphs[0];
        assert_eq!(first.text, "N");
        // 10pt Helvetica without a Widths table: half an em per glyph
        assert!((first.rect.x0 - 50.0).abs() < 1e-3);
        assert!((first.rect.x1 - 55.0).abs() < 1e-3);
        // baseline 100 from the top, ascent 8 above and descent 2 below
        assert!((first.rect.y0 - 92.0).abs() < 1e-3);
        assert!((first.rect.y1 - 102.0).abs() < 1e-3);
        assert!((first.baseline - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_crop_box_inherited_from_page_tree() {
        let bytes = FixtureBuilder::new()
            .crop_box([50, 50, 550, 742])
            .page(fixtures::text_ops(&[FixtureLine::new(100.0, 150.0, "Name :")]))
            .build();
        let layout = first_page_layout(&bytes);

        // CropBox wins over the 612x792 MediaBox, both set on the Pages node
        assert_eq!(layout.width, 500.0);
        let first = &layout.glyphs[0];
        assert!((first.rect.x0 - 50.0).abs() < 1e-3);
        assert!((first.baseline - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_dictionary_page_is_an_error() {
        let bytes = fixtures::single_page(&[FixtureLine::new(50.0, 100.0, "Name :")]);
        let mut doc = Document::load_mem(&bytes).unwrap();
        let page_id = doc.page_iter().next().unwrap();
        doc.objects.insert(page_id, Object::Integer(0));
        assert!(PageLayout::build(&doc, page_id).is_err());
    }

    #[test]
    fn test_lines_merge_cells_on_one_baseline() {
        let bytes = fixtures::single_page(&[
            FixtureLine::new(300.0, 200.0, "B + 4.000"),
            FixtureLine::new(50.0, 200.0, "MATH 221 UG Discrete Mathematics"),
            FixtureLine::new(50.0, 180.0, "Fall Quarter 2023-24"),
        ]);
        let layout = first_page_layout(&bytes);
        assert_eq!(
            layout.text(),
            "Fall Quarter 2023-24\nMATH 221 UG Discrete Mathematics B + 4.000"
        );
    }

    #[test]
    fn test_search_returns_union_of_glyph_boxes() {
        let bytes = fixtures::single_page(&[
            FixtureLine::new(50.0, 100.0, "Name : Smith, Jane"),
            FixtureLine::new(50.0, 300.0, "Unrelated line"),
        ]);
        let layout = first_page_layout(&bytes);
        let hits = layout.search("Name   :");
        assert_eq!(hits.len(), 1);
        assert!((hits[0].x0 - 50.0).abs() < 1e-3);
        assert!((hits[0].x1 - 80.0).abs() < 1e-3);
        assert!((hits[0].y0 - 92.0).abs() < 1e-3);
        assert!((hits[0].y1 - 102.0).abs() < 1e-3);
        assert!(layout.search("Information for").is_empty());
    }

    #[test]
    fn test_type0_identity_h_text_is_decoded() {
        let bytes = FixtureBuilder::new()
            .page(fixtures::cid_text_ops(50.0, 100.0, "Name : Jane Smith"))
            .build();
        let layout = first_page_layout(&bytes);

        assert_eq!(layout.text(), "Name : Jane Smith");
        // W gives 600 units per code, 6pt at 10pt
        let first = &layout.glyphs[0];
        assert!((first.rect.width() - 6.0).abs() < 1e-3);
        let hits = layout.search("Name :");
        assert_eq!(hits.len(), 1);
        assert!((hits[0].x1 - 86.0).abs() < 1e-3);
    }

    #[test]
    fn test_form_text_is_placed_with_form_matrix() {
        let bytes = FixtureBuilder::new()
            .form(
                [1.0, 0.0, 0.0, 1.0, 0.0, 600.0],
                fixtures::text_ops(&[FixtureLine::new(50.0, 700.0, "Name : Smith, Jane")]),
            )
            .page(
                [
                    fixtures::text_ops(&[FixtureLine::new(50.0, 300.0, "MATH 221 UG Discrete Mathematics A 4.000")]),
                    vec![
                        Operation::new("q", vec![]),
                        Operation::new("Do", vec![Object::Name(b"Fm1".to_vec())]),
                        Operation::new("Q", vec![]),
                    ],
                ]
                .concat(),
            )
            .build();
        let layout = first_page_layout(&bytes);

        assert_eq!(layout.forms.len(), 1);
        assert_eq!(
            layout.text(),
            "Name : Smith, Jane\nMATH 221 UG Discrete Mathematics A 4.000"
        );
        // text at 92 in form space, lifted by the form matrix to a baseline of 100
        let hits = layout.search("Name :");
        assert_eq!(hits.len(), 1);
        assert!((hits[0].y0 - 92.0).abs() < 1e-3);

        let redacted = layout.redacted_operations(&[hits[0].full_width(layout.width)]);
        assert_eq!(redacted.stats.text_ops_removed, 1);
        assert_eq!(redacted.forms.len(), 1);
        let form_ops = rendered(&redacted.forms[0].1);
        assert!(!form_ops.iter().any(|op| op.ends_with(" Tj")));
        // the page keeps its Do and its own text
        let page_ops = rendered(&redacted.page);
        assert!(page_ops.iter().any(|op| op == "_ Do"));
        assert!(page_ops.iter().any(|op| op == "_ Tj"));
    }

    #[test]
    fn test_redacted_operations_drop_text_and_keep_positions() {
        let bytes = fixtures::single_page(&[
            FixtureLine::new(50.0, 100.0, "Name : Smith, Jane"),
            FixtureLine::new(50.0, 300.0, "MATH 221 UG Discrete Mathematics A 4.000"),
        ]);
        let layout = first_page_layout(&bytes);
        let band = Rect::new(0.0, 92.0, 612.0, 102.0);
        let redacted = layout.redacted_operations(&[band]);
        let operations = &redacted.page;

        assert_eq!(redacted.stats.text_ops_removed, 1);
        assert!(redacted.forms.is_empty());
        assert!(!operations.iter().any(|op| op.operator == "Tj"
            && op.operands.iter().any(|o| matches!(o, Object::String(s, _) if s.starts_with(b"Name")))));
        let fills = operations.iter().filter(|op| op.operator == "f").count();
        assert_eq!(fills, 1);
        // the replacement advances by the full string width: 18 glyphs * 5pt
        let advance = operations
            .iter()
            .find(|op| op.operator == "TJ")
            .and_then(|op| op.operands[0].as_array().ok())
            .and_then(|arr| arr[0].as_float().ok())
            .unwrap();
        assert!((advance + 9000.0).abs() < 1e-2);
    }

    #[test]
    fn test_removed_shows_keep_advances_for_every_operator() {
        let s = |text: &str| Object::string_literal(text);
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("TL", vec![20.into()]),
            Operation::new("Td", vec![50.into(), 692.into()]),
            Operation::new("Tj", vec![s("Transcript")]),
            Operation::new("'", vec![s("Name : Jane")]),
            Operation::new("T*", vec![]),
            Operation::new("TJ", vec![Object::Array(vec![s("Name :"), (-1000).into(), s("Smith")])]),
            Operation::new("Tj", vec![s("Kept")]),
            Operation::new("\"", vec![2.into(), 1.into(), s("Name : Bob")]),
            Operation::new("'", vec![s("MATH 221 UG Discrete Mathematics A 4.000")]),
            Operation::new("ET", vec![]),
        ];
        let layout = first_page_layout(&FixtureBuilder::new().page(ops).build());
        let hits = layout.search("Name :");
        assert_eq!(hits.len(), 3);

        let redacted = layout.redacted_operations(&hits);
        assert_eq!(redacted.stats.text_ops_removed, 3);
        let page_ops = rendered(&redacted.page);
        // ': next line, then 11 glyphs * 5pt
        assert!(contains_run(&page_ops, &["T*", "[-5500] TJ"]));
        // TJ: 30pt + 10pt kerning + 25pt
        assert!(contains_run(&page_ops, &["[-6500] TJ", "_ Tj"]));
        // ": spacing restored, then 8 glyphs * 6pt + 2 spaces * 8pt
        assert!(contains_run(&page_ops, &["2 Tw", "1 Tc", "T*", "[-6400] TJ"]));

        let after = first_page_layout(&FixtureBuilder::new().page(redacted.page).build());
        assert_eq!(after.text(), "Transcript\nKept\nMATH 221 UG Discrete Mathematics A 4.000");
        for baseline in [100.0, 180.0] {
            assert_eq!(line_rects(&after, baseline), line_rects(&layout, baseline));
        }
        // "Kept" follows the removed TJ on the same line and has not moved
        let before = line_rects(&layout, 140.0);
        let kept = line_rects(&after, 140.0);
        assert_eq!(kept, before[before.len() - 4..].to_vec());
        assert!((kept[0].x0 - 115.0).abs() < 1e-3);
    }

    #[test]
    fn test_paths_fully_inside_band_are_removed() {
        let bytes = fixtures::single_page_with_ops(
            &[FixtureLine::new(50.0, 100.0, "Name : Smith, Jane")],
            vec![
                // underline inside the band: y = 792 - 101
                Operation::new("re", vec![50.into(), 691.into(), 100.into(), Object::Real(0.5)]),
                Operation::new("f", vec![]),
                // page frame crossing the band
                Operation::new("re", vec![10.into(), 10.into(), 590.into(), 770.into()]),
                Operation::new("S", vec![]),
            ],
        );
        let layout = first_page_layout(&bytes);
        assert_eq!(layout.paths.len(), 2);
        let redacted = layout.redacted_operations(&[Rect::new(0.0, 92.0, 612.0, 102.0)]);
        assert_eq!(redacted.stats.paths_removed, 1);
    }

    #[test]
    fn test_images_inside_band_are_removed() {
        let image_at = |y: i64| {
            vec![
                Operation::new("q", vec![]),
                Operation::new("cm", vec![20.into(), 0.into(), 0.into(), 8.into(), 50.into(), y.into()]),
                Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
                Operation::new("Q", vec![]),
            ]
        };
        let bytes = FixtureBuilder::new().page([image_at(692), image_at(392)].concat()).build();
        let layout = first_page_layout(&bytes);

        assert_eq!(layout.images.len(), 2);
        assert!((layout.images[0].rect.y0 - 92.0).abs() < 1e-3);
        assert!((layout.images[0].rect.y1 - 100.0).abs() < 1e-3);

        let redacted = layout.redacted_operations(&[Rect::new(0.0, 90.0, 612.0, 104.0)]);
        assert_eq!(redacted.stats.images_removed, 1);
        let draws = redacted.page.iter().filter(|op| op.operator == "Do").count();
        assert_eq!(draws, 1);
    }
}
