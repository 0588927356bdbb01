//! Deterministic software engine for headless hosts, demos and tests
//!
//! Documents are line-oriented text:
//!
//! ```text
//! %RDOC-1
//! security standard <password>
//! meta <Tag> <value...>
//! page <width> <height> <rotation-quadrant>
//! text <line...>
//! fill <x0> <y0> <x1> <y1> <AARRGGBB>
//! annot <x0> <y0> <x1> <y1> <AARRGGBB>
//! field <x0> <y0> <x1> <y1> <AARRGGBB>
//! endpage
//! %EOF
//! ```
//!
//! Rectangles are in page space (origin bottom-left). `fill` is page
//! content, `annot` is drawn only with [`RenderFlags::ANNOT`], and `field`
//! is drawn only by the form-fill environment.

use crate::bitmap::EngineBitmap;
use crate::engine::{
    BlockSource, Engine, EngineDocument, EnginePage, FormFillEnvironment, RenderFlags, SaveFlags,
    WriteBlock,
};
use crate::error::EngineError;
use crate::transform::{Placement, Rotation};
use std::any::Any;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const HEADER: &str = "%RDOC-1";
const TRAILER: &str = "%EOF";
const SECURITY_HANDLER: &str = "standard";

/// Bytes requested per source read while indexing.
const READ_BLOCK: usize = 512;

/// Bytes handed to the writer per call while saving.
const WRITE_CHUNK: usize = 256;

#[derive(Debug, Default)]
struct Counters {
    init: AtomicUsize,
    destroy: AtomicUsize,
    open_documents: AtomicUsize,
    page_loads: AtomicUsize,
    form_inits: AtomicUsize,
    form_exits: AtomicUsize,
}

/// The reference engine.
///
/// Clones share their call counters.
#[derive(Debug, Default, Clone)]
pub struct ReferenceEngine {
    counters: Arc<Counters>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `init_library` calls.
    pub fn init_calls(&self) -> usize {
        self.counters.init.load(Ordering::SeqCst)
    }

    /// Number of `destroy_library` calls.
    pub fn destroy_calls(&self) -> usize {
        self.counters.destroy.load(Ordering::SeqCst)
    }

    /// Engine documents not yet closed.
    pub fn open_documents(&self) -> usize {
        self.counters.open_documents.load(Ordering::SeqCst)
    }

    /// Number of successful page loads.
    pub fn page_loads(&self) -> usize {
        self.counters.page_loads.load(Ordering::SeqCst)
    }

    /// Form-fill environments created so far.
    pub fn form_environments_opened(&self) -> usize {
        self.counters.form_inits.load(Ordering::SeqCst)
    }

    /// Form-fill environments torn down so far.
    pub fn form_environments_closed(&self) -> usize {
        self.counters.form_exits.load(Ordering::SeqCst)
    }

    fn open(
        &self,
        backing: Backing,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Box<dyn EngineDocument>, EngineError> {
        let index = DocumentIndex::parse(bytes)?;
        if let Some(security) = &index.security {
            if security.handler != SECURITY_HANDLER {
                tracing::debug!("Unsupported security handler {}", security.handler);
                return Err(EngineError::Security);
            }
            if password != Some(security.password.as_str()) {
                return Err(EngineError::Password);
            }
        }
        self.counters.open_documents.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ReferenceDocument {
            backing,
            index,
            counters: self.counters.clone(),
        }))
    }
}

impl Engine for ReferenceEngine {
    fn init_library(&self) {
        self.counters.init.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy_library(&self) {
        self.counters.destroy.fetch_add(1, Ordering::SeqCst);
    }

    fn load_custom_document(
        &self,
        source: Arc<dyn BlockSource>,
        password: Option<&str>,
    ) -> Result<Box<dyn EngineDocument>, EngineError> {
        let bytes = read_all(source.as_ref())?;
        self.open(Backing::Source(source), &bytes, password)
    }

    fn load_mem_document(
        &self,
        data: Arc<[u8]>,
        password: Option<&str>,
    ) -> Result<Box<dyn EngineDocument>, EngineError> {
        let backing = Backing::Memory(data.clone());
        self.open(backing, &data, password)
    }
}

fn read_all(source: &dyn BlockSource) -> Result<Vec<u8>, EngineError> {
    let length = usize::try_from(source.len()).map_err(|_| EngineError::OutOfMemory)?;
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(length)
        .map_err(|_| EngineError::OutOfMemory)?;

    let mut block = [0u8; READ_BLOCK];
    while bytes.len() < length {
        let want = READ_BLOCK.min(length - bytes.len());
        let read = source
            .get_block(bytes.len() as u64, &mut block[..want])
            .map_err(|e| {
                tracing::debug!("Block read failed at {}: {}", bytes.len(), e);
                EngineError::File
            })?;
        if read == 0 {
            return Err(EngineError::File);
        }
        bytes.extend_from_slice(&block[..read.min(want)]);
    }
    Ok(bytes)
}

/// Where page bytes are re-read from on page load.
enum Backing {
    Source(Arc<dyn BlockSource>),
    Memory(Arc<[u8]>),
}

impl Backing {
    fn read_range(&self, range: Range<usize>) -> Result<Vec<u8>, EngineError> {
        match self {
            Backing::Memory(data) => data.get(range).map(<[u8]>::to_vec).ok_or(EngineError::Page),
            Backing::Source(source) => {
                let mut out = vec![0u8; range.len()];
                let mut filled = 0;
                while filled < out.len() {
                    let end = (filled + READ_BLOCK).min(out.len());
                    let read = source
                        .get_block((range.start + filled) as u64, &mut out[filled..end])
                        .map_err(|_| EngineError::File)?;
                    if read == 0 {
                        return Err(EngineError::File);
                    }
                    filled += read.min(end - filled);
                }
                Ok(out)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Security {
    handler: String,
    password: String,
}

#[derive(Debug, Clone)]
struct PageEntry {
    range: Range<usize>,
    width: f32,
    height: f32,
}

/// Document structure found at open time.
#[derive(Debug)]
struct DocumentIndex {
    security: Option<Security>,
    meta: Vec<(String, String)>,
    pages: Vec<PageEntry>,
    has_form: bool,
}

/// Lines of `bytes` with the byte range each occupies.
fn lines_with_offsets(bytes: &[u8]) -> impl Iterator<Item = (Range<usize>, &[u8])> {
    let mut offset = 0;
    bytes.split_inclusive(|&b| b == b'\n').map(move |raw| {
        let range = offset..offset + raw.len();
        offset += raw.len();
        (range, raw)
    })
}

fn decode_line(raw: &[u8]) -> Result<&str, EngineError> {
    std::str::from_utf8(raw)
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .map_err(|_| EngineError::Format)
}

impl DocumentIndex {
    fn parse(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut lines = lines_with_offsets(bytes);
        match lines.next() {
            Some((_, raw)) if decode_line(raw)? == HEADER => {}
            _ => return Err(EngineError::Format),
        }

        let mut index = DocumentIndex {
            security: None,
            meta: Vec::new(),
            pages: Vec::new(),
            has_form: false,
        };
        let mut open_page: Option<(usize, Vec<&str>)> = None;
        let mut terminated = false;

        for (range, raw) in lines {
            let line = decode_line(raw)?;
            if terminated {
                if line.trim().is_empty() {
                    continue;
                }
                return Err(EngineError::Format);
            }
            let keyword = line.split_whitespace().next().unwrap_or("");

            if let Some((start, page_lines)) = open_page.as_mut() {
                page_lines.push(line);
                if keyword == "endpage" {
                    let content = PageContent::parse(page_lines)?;
                    index.has_form |= content.has_fields();
                    index.pages.push(PageEntry {
                        range: *start..range.end,
                        width: content.width,
                        height: content.height,
                    });
                    open_page = None;
                }
                continue;
            }

            match keyword {
                "" => {}
                "security" => {
                    let mut parts = line.split_whitespace().skip(1);
                    let handler = parts.next().ok_or(EngineError::Format)?;
                    index.security = Some(Security {
                        handler: handler.to_string(),
                        password: parts.next().unwrap_or("").to_string(),
                    });
                }
                "meta" => {
                    let rest = line.trim_start()["meta".len()..].trim_start();
                    let (tag, value) = rest.split_once(' ').unwrap_or((rest, ""));
                    if tag.is_empty() {
                        return Err(EngineError::Format);
                    }
                    index.meta.push((tag.to_string(), value.to_string()));
                }
                "page" => open_page = Some((range.start, vec![line])),
                TRAILER => terminated = true,
                _ => return Err(EngineError::Format),
            }
        }

        if open_page.is_some() || !terminated {
            return Err(EngineError::Format);
        }
        Ok(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeKind {
    Fill,
    Annot,
    Field,
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    kind: ShapeKind,
    rect: [f32; 4],
    color: u32,
}

#[derive(Debug, Clone)]
struct PageContent {
    width: f32,
    height: f32,
    rotation: Rotation,
    text: Vec<String>,
    shapes: Vec<Shape>,
}

fn parse_number<T: std::str::FromStr>(token: Option<&str>) -> Result<T, EngineError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or(EngineError::Format)
}

impl PageContent {
    /// Parse a `page ... endpage` block.
    fn parse(lines: &[&str]) -> Result<Self, EngineError> {
        let mut lines = lines.iter();
        let header = lines.next().ok_or(EngineError::Format)?;
        let mut parts = header.split_whitespace().skip(1);
        let width: f32 = parse_number(parts.next())?;
        let height: f32 = parse_number(parts.next())?;
        let rotation = Rotation::from_quadrant(parse_number(parts.next())?);
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
            return Err(EngineError::Format);
        }

        let mut content = PageContent {
            width,
            height,
            rotation,
            text: Vec::new(),
            shapes: Vec::new(),
        };
        for line in lines {
            let mut parts = line.split_whitespace();
            let kind = match parts.next() {
                Some("text") => {
                    let rest = line.trim_start()["text".len()..].strip_prefix(' ');
                    content.text.push(rest.unwrap_or("").to_string());
                    continue;
                }
                Some("endpage") => break,
                Some("fill") => ShapeKind::Fill,
                Some("annot") => ShapeKind::Annot,
                Some("field") => ShapeKind::Field,
                None => continue,
                Some(_) => return Err(EngineError::Format),
            };
            let rect = [
                parse_number(parts.next())?,
                parse_number(parts.next())?,
                parse_number(parts.next())?,
                parse_number(parts.next())?,
            ];
            let color = parts
                .next()
                .and_then(|c| u32::from_str_radix(c, 16).ok())
                .ok_or(EngineError::Format)?;
            content.shapes.push(Shape { kind, rect, color });
        }
        Ok(content)
    }

    fn has_fields(&self) -> bool {
        self.shapes.iter().any(|s| s.kind == ShapeKind::Field)
    }

    fn paint(
        &self,
        bitmap: &mut EngineBitmap<'_>,
        placement: &Placement,
        flags: RenderFlags,
        kind: impl Fn(ShapeKind) -> bool,
    ) {
        bitmap.set_reverse_byte_order(flags.contains(RenderFlags::REVERSE_BYTE_ORDER));
        let matrix = placement.device_matrix(self.width, self.height);
        let clip = placement.clip().normalized();
        let (width, height) = (i64::from(bitmap.width()), i64::from(bitmap.height()));

        for shape in self.shapes.iter().filter(|s| kind(s.kind)) {
            let [x0, y0, x1, y1] = shape.rect;
            let (min_x, min_y, max_x, max_y) = matrix.transform_bounds(x0, y0, x1, y1);
            let left = min_x.max(clip.left);
            let top = min_y.max(clip.top);
            let right = max_x.min(clip.right);
            let bottom = max_y.min(clip.bottom);
            if !(left < right && top < bottom) {
                continue;
            }

            let px_left = (left.round() as i64).max(0);
            let px_top = (top.round() as i64).max(0);
            let px_right = (right.round() as i64).min(width);
            let px_bottom = (bottom.round() as i64).min(height);
            for y in px_top..px_bottom {
                for x in px_left..px_right {
                    bitmap.set_pixel(x, y, shape.color);
                }
            }
        }
    }
}

/// An open reference document.
struct ReferenceDocument {
    backing: Backing,
    index: DocumentIndex,
    counters: Arc<Counters>,
}

impl Drop for ReferenceDocument {
    fn drop(&mut self) {
        self.counters.open_documents.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReferenceDocument {
    fn write_chunked(writer: &mut dyn WriteBlock, data: &[u8]) -> Result<(), EngineError> {
        for chunk in data.chunks(WRITE_CHUNK) {
            if writer.write_block(chunk) < 0 {
                return Err(EngineError::File);
            }
        }
        Ok(())
    }
}

impl EngineDocument for ReferenceDocument {
    fn page_count(&self) -> usize {
        self.index.pages.len()
    }

    fn load_page(&self, index: usize) -> Result<Box<dyn EnginePage>, EngineError> {
        let entry = self.index.pages.get(index).ok_or(EngineError::Page)?;
        let bytes = self.backing.read_range(entry.range.clone())?;
        let lines = lines_with_offsets(&bytes)
            .map(|(_, raw)| decode_line(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| EngineError::Page)?;
        let content = PageContent::parse(&lines).map_err(|_| EngineError::Page)?;
        self.counters.page_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ReferencePage { content }))
    }

    fn page_size(&self, index: usize) -> Option<(f32, f32)> {
        self.index.pages.get(index).map(|p| (p.width, p.height))
    }

    fn meta_text(&self, tag: &str) -> Option<String> {
        self.index
            .meta
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, value)| value.clone())
    }

    fn init_form_fill(&self) -> Option<Box<dyn FormFillEnvironment + '_>> {
        if !self.index.has_form {
            return None;
        }
        self.counters.form_inits.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(ReferenceForm { doc: self }))
    }

    fn save_as_copy(&self, writer: &mut dyn WriteBlock, flags: SaveFlags) -> Result<(), EngineError> {
        let mut head = String::new();
        let _ = writeln!(head, "{}", HEADER);
        if let Some(security) = &self.index.security {
            if flags != SaveFlags::REMOVE_SECURITY {
                let _ = writeln!(head, "security {} {}", security.handler, security.password);
            }
        }
        for (tag, value) in &self.index.meta {
            let _ = writeln!(head, "meta {} {}", tag, value);
        }
        Self::write_chunked(writer, head.as_bytes())?;

        for entry in &self.index.pages {
            let mut page = self.backing.read_range(entry.range.clone())?;
            if page.last() != Some(&b'\n') {
                page.push(b'\n');
            }
            Self::write_chunked(writer, &page)?;
        }
        Self::write_chunked(writer, format!("{}\n", TRAILER).as_bytes())
    }
}

/// A loaded reference page.
struct ReferencePage {
    content: PageContent,
}

impl EnginePage for ReferencePage {
    fn width(&self) -> f32 {
        self.content.width
    }

    fn height(&self) -> f32 {
        self.content.height
    }

    fn rotation(&self) -> Rotation {
        self.content.rotation
    }

    fn text(&self) -> String {
        self.content.text.join("\n")
    }

    fn render(&self, bitmap: &mut EngineBitmap<'_>, placement: &Placement, flags: RenderFlags) {
        let annotations = flags.contains(RenderFlags::ANNOT);
        self.content.paint(bitmap, placement, flags, |kind| match kind {
            ShapeKind::Fill => true,
            ShapeKind::Annot => annotations,
            ShapeKind::Field => false,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Form-fill environment of a reference document.
struct ReferenceForm<'a> {
    doc: &'a ReferenceDocument,
}

impl FormFillEnvironment for ReferenceForm<'_> {
    fn draw(
        &self,
        bitmap: &mut EngineBitmap<'_>,
        page: &dyn EnginePage,
        placement: &Placement,
        flags: RenderFlags,
    ) {
        let Some(page) = page.as_any().downcast_ref::<ReferencePage>() else {
            tracing::debug!("Form draw skipped: page from another engine");
            return;
        };
        page.content
            .paint(bitmap, placement, flags, |kind| kind == ShapeKind::Field);
    }
}

impl Drop for ReferenceForm<'_> {
    fn drop(&mut self) {
        self.doc.counters.form_exits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct DraftPage {
    width: f32,
    height: f32,
    rotation: i32,
    text: Vec<String>,
    shapes: Vec<(&'static str, [f32; 4], u32)>,
}

/// Builds documents in the reference format.
///
/// Content calls (`text`, `fill`, `annot`, `field`) apply to the most
/// recently added page and are ignored before the first page.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDocumentBuilder {
    security: Option<(String, String)>,
    meta: Vec<(String, String)>,
    pages: Vec<DraftPage>,
}

impl ReferenceDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect the document with the standard handler.
    pub fn password(self, password: &str) -> Self {
        self.security(SECURITY_HANDLER, password)
    }

    /// Protect the document with an arbitrary handler name.
    pub fn security(mut self, handler: &str, password: &str) -> Self {
        self.security = Some((handler.to_string(), password.to_string()));
        self
    }

    pub fn meta(mut self, tag: &str, value: &str) -> Self {
        self.meta.push((tag.to_string(), value.to_string()));
        self
    }

    /// Add an upright page of `width` x `height` points.
    pub fn page(self, width: f32, height: f32) -> Self {
        self.page_rotated(width, height, 0)
    }

    /// Add a page with an intrinsic rotation quadrant.
    pub fn page_rotated(mut self, width: f32, height: f32, quadrant: i32) -> Self {
        self.pages.push(DraftPage {
            width,
            height,
            rotation: quadrant,
            text: Vec::new(),
            shapes: Vec::new(),
        });
        self
    }

    pub fn text(mut self, line: &str) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.text.push(line.replace('\n', " "));
        }
        self
    }

    /// Page content rectangle, page space.
    pub fn fill(self, x0: f32, y0: f32, x1: f32, y1: f32, argb: u32) -> Self {
        self.shape("fill", [x0, y0, x1, y1], argb)
    }

    /// Annotation rectangle.
    pub fn annot(self, x0: f32, y0: f32, x1: f32, y1: f32, argb: u32) -> Self {
        self.shape("annot", [x0, y0, x1, y1], argb)
    }

    /// Form field rectangle.
    pub fn field(self, x0: f32, y0: f32, x1: f32, y1: f32, argb: u32) -> Self {
        self.shape("field", [x0, y0, x1, y1], argb)
    }

    fn shape(mut self, kind: &'static str, rect: [f32; 4], argb: u32) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.shapes.push((kind, rect, argb));
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = String::new();
        let _ = writeln!(out, "{}", HEADER);
        if let Some((handler, password)) = &self.security {
            let _ = writeln!(out, "security {} {}", handler, password);
        }
        for (tag, value) in &self.meta {
            let _ = writeln!(out, "meta {} {}", tag, value);
        }
        for page in &self.pages {
            let _ = writeln!(out, "page {} {} {}", page.width, page.height, page.rotation);
            for line in &page.text {
                let _ = writeln!(out, "text {}", line);
            }
            for (kind, [x0, y0, x1, y1], color) in &page.shapes {
                let _ = writeln!(out, "{} {} {} {} {} {:08x}", kind, x0, y0, x1, y1, color);
            }
            let _ = writeln!(out, "endpage");
        }
        let _ = writeln!(out, "{}", TRAILER);
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::BitmapFormat;

    fn open(bytes: &[u8], password: Option<&str>) -> Result<Box<dyn EngineDocument>, EngineError> {
        ReferenceEngine::new().load_mem_document(Arc::from(bytes), password)
    }

    #[test]
    fn test_parse_builder_output() {
        let bytes = ReferenceDocumentBuilder::new()
            .meta("Title", "Two words")
            .page(100.0, 50.0)
            .text("hello world")
            .text("")
            .fill(0.0, 0.0, 10.0, 10.0, 0xff00ff00)
            .page_rotated(20.0, 30.0, 3)
            .build();
        let doc = open(&bytes, None).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.meta_text("Title").as_deref(), Some("Two words"));
        assert_eq!(doc.page_size(1), Some((20.0, 30.0)));

        let page = doc.load_page(0).unwrap();
        assert_eq!(page.text(), "hello world\n");
        assert_eq!(doc.load_page(1).unwrap().rotation(), Rotation::Clockwise270);
    }

    #[test]
    fn test_format_errors() {
        assert_eq!(open(b"%PDF-1.7\n", None).err(), Some(EngineError::Format));
        assert_eq!(
            open(b"%RDOC-1\npage 10 10 0\n%EOF\n", None).err(),
            Some(EngineError::Format)
        );
        assert_eq!(
            open(b"%RDOC-1\nbogus\n%EOF\n", None).err(),
            Some(EngineError::Format)
        );
        assert_eq!(open(b"%RDOC-1\n", None).err(), Some(EngineError::Format));
    }

    #[test]
    fn test_security() {
        let locked = ReferenceDocumentBuilder::new()
            .password("secret")
            .page(10.0, 10.0)
            .build();
        assert_eq!(open(&locked, None).err(), Some(EngineError::Password));
        assert_eq!(open(&locked, Some("wrong")).err(), Some(EngineError::Password));
        assert!(open(&locked, Some("secret")).is_ok());

        let foreign = ReferenceDocumentBuilder::new()
            .security("rot13", "x")
            .page(10.0, 10.0)
            .build();
        assert_eq!(open(&foreign, Some("x")).err(), Some(EngineError::Security));
    }

    #[test]
    fn test_remove_security_on_save() {
        let locked = ReferenceDocumentBuilder::new()
            .password("secret")
            .page(10.0, 10.0)
            .build();
        let doc = open(&locked, Some("secret")).unwrap();

        let mut kept = Vec::new();
        doc.save_as_copy(&mut kept, SaveFlags::NO_INCREMENTAL).unwrap();
        assert_eq!(open(&kept, None).err(), Some(EngineError::Password));

        let mut stripped = Vec::new();
        doc.save_as_copy(&mut stripped, SaveFlags::REMOVE_SECURITY).unwrap();
        assert_eq!(open(&stripped, None).unwrap().page_count(), 1);
    }

    #[test]
    fn test_render_respects_clip_and_flags() {
        let bytes = ReferenceDocumentBuilder::new()
            .page(4.0, 4.0)
            .fill(0.0, 0.0, 4.0, 4.0, 0xff0000ff)
            .annot(0.0, 0.0, 1.0, 1.0, 0xffff0000)
            .build();
        let doc = open(&bytes, None).unwrap();
        let page = doc.load_page(0).unwrap();

        let mut buf = vec![0u8; 4 * 4 * 4];
        let mut bitmap = EngineBitmap::new(&mut buf, 4, 4, 16, BitmapFormat::Bgra, true).unwrap();
        let placement = Placement::Matrix {
            matrix: crate::transform::Matrix::identity(),
            clip: crate::transform::ClipRect::new(0.0, 0.0, 2.0, 4.0),
        };
        page.render(&mut bitmap, &placement, RenderFlags::REVERSE_BYTE_ORDER);

        assert_eq!(bitmap.pixel(0, 0), Some(0xff0000ff));
        assert_eq!(bitmap.pixel(1, 3), Some(0xff0000ff));
        assert_eq!(bitmap.pixel(2, 0), Some(0));
        // Annotation sits at the bottom-left corner of the page.
        assert_eq!(bitmap.pixel(0, 3), Some(0xff0000ff));

        page.render(
            &mut bitmap,
            &placement,
            RenderFlags::REVERSE_BYTE_ORDER | RenderFlags::ANNOT,
        );
        assert_eq!(bitmap.pixel(0, 3), Some(0xffff0000));
    }

    #[test]
    fn test_form_environment_lifecycle() {
        let engine = ReferenceEngine::new();
        let bytes = ReferenceDocumentBuilder::new()
            .page(10.0, 10.0)
            .field(0.0, 0.0, 5.0, 5.0, 0xff00ff00)
            .build();
        let doc = engine.load_mem_document(Arc::from(&bytes[..]), None).unwrap();
        {
            let form = doc.init_form_fill();
            assert!(form.is_some());
            assert_eq!(engine.form_environments_opened(), 1);
            assert_eq!(engine.form_environments_closed(), 0);
        }
        assert_eq!(engine.form_environments_closed(), 1);

        let plain = ReferenceDocumentBuilder::new().page(10.0, 10.0).build();
        let doc = engine.load_mem_document(Arc::from(&plain[..]), None).unwrap();
        assert!(doc.init_form_fill().is_none());
    }

    #[test]
    fn test_open_document_counter() {
        let engine = ReferenceEngine::new();
        let bytes = ReferenceDocumentBuilder::new().page(1.0, 1.0).build();
        let doc = engine.load_mem_document(Arc::from(&bytes[..]), None).unwrap();
        assert_eq!(engine.open_documents(), 1);
        drop(doc);
        assert_eq!(engine.open_documents(), 0);
    }
}
