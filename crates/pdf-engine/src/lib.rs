//! Paginated document access for the certificate viewer.
//!
//! The engine mirrors the small surface a browser-side PDF library offers:
//! open a document from a reference, ask for a page's viewport at a scale,
//! and rasterize that viewport. Documents are addressed by opaque handles.
//!
//! Rasters are bounded. A viewport wider or taller than
//! [`MAX_RASTER_EDGE_PX`], or holding more than [`MAX_RASTER_PIXELS`], is
//! refused with [`PdfEngineError::RasterTooLarge`] before any allocation.

use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

pub const MAX_RASTER_EDGE_PX: u32 = 16_384;
pub const MAX_RASTER_PIXELS: u64 = 1 << 26;

const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_EDGE: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Page tree levels searched for an inherited MediaBox.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// US Letter, assumed for pages that declare no usable MediaBox.
    pub const LETTER: Self = Self { width_pt: 612.0, height_pt: 792.0 };

    fn from_media_box(corners: &[Object]) -> Option<Self> {
        let [x0, y0, x1, y1] = corners else {
            return None;
        };

        let width_pt = (x1.as_float().ok()? - x0.as_float().ok()?).abs();
        let height_pt = (y1.as_float().ok()? - y0.as_float().ok()?).abs();

        (width_pt > 0.0 && height_pt > 0.0).then_some(Self { width_pt, height_pt })
    }
}

/// Pixel dimensions of one page at a display scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageViewport {
    pub page_index: u32,
    pub scale: f32,
    pub width_px: u32,
    pub height_px: u32,
}

impl PageViewport {
    /// Fits a page of `size` at `scale`. The scale must be finite and
    /// positive, and the result must fit the raster limits.
    pub fn new(page_index: u32, size: PageSize, scale: f32) -> Result<Self, PdfEngineError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PdfEngineError::InvalidScale(scale));
        }

        let viewport = Self {
            page_index,
            scale,
            width_px: scaled_edge(size.width_pt, scale),
            height_px: scaled_edge(size.height_pt, scale),
        };
        viewport.check_raster_size()?;

        Ok(viewport)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width_px) * u64::from(self.height_px)
    }

    pub fn check_raster_size(&self) -> Result<(), PdfEngineError> {
        let too_large = self.width_px > MAX_RASTER_EDGE_PX
            || self.height_px > MAX_RASTER_EDGE_PX
            || self.pixel_count() > MAX_RASTER_PIXELS;

        if too_large {
            return Err(PdfEngineError::RasterTooLarge {
                width_px: self.width_px,
                height_px: self.height_px,
            });
        }

        Ok(())
    }
}

// Float-to-int `as` saturates, so absurd sizes land on u32::MAX and fail
// the raster check instead of wrapping.
fn scaled_edge(points: f32, scale: f32) -> u32 {
    (f64::from(points) * f64::from(scale)).round().max(1.0) as u32
}

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Url(String),
    Bytes(Vec<u8>),
}

impl DocumentSource {
    /// Interprets a user-supplied reference. `http://` and `https://`
    /// references are fetched remotely, anything else is a filesystem path.
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_owned())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>, PdfEngineError> {
        match self {
            Self::Path(path) => Ok(fs::read(path)?),
            Self::Url(url) => fetch_remote(&url),
            Self::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("render scale must be finite and positive, got {0}")]
    InvalidScale(f32),
    #[error("page raster of {width_px}x{height_px} px exceeds the raster limit")]
    RasterTooLarge { width_px: u32, height_px: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rendering backend used by the viewer. Page indices are 0-based here;
/// the viewer converts from its 1-based page numbers.
pub trait PdfEngine {
    fn open(&mut self, source: DocumentSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, PdfEngineError>;

    fn viewport(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<PageViewport, PdfEngineError> {
        PageViewport::new(page_index, self.page_size(handle, page_index)?, scale)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        viewport: &PageViewport,
    ) -> Result<RgbaImage, PdfEngineError>;

    /// Small raster of one page for card previews.
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, PdfEngineError> {
        let viewport = self.viewport(handle, page_index, scale)?;
        self.render_page(handle, &viewport)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

/// Reads page geometry with `lopdf` and paints each page as a blank sheet
/// of the right size.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    documents: HashMap<DocumentHandle, Vec<PageSize>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn pages(&self, handle: DocumentHandle) -> Result<&[PageSize], PdfEngineError> {
        self.documents
            .get(&handle)
            .map(Vec::as_slice)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

fn read_page_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
    if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }

    let doc = Document::load_mem(bytes)?;
    let sizes = doc
        .get_pages()
        .into_values()
        .map(|page_id| page_media_box(&doc, page_id))
        .collect::<Result<Vec<_>, _>>()?;

    if sizes.is_empty() {
        return Err(PdfEngineError::Backend("document has no pages".to_owned()));
    }

    Ok(sizes)
}

/// Finds the MediaBox for a page, walking up the page tree when the page
/// inherits it from an ancestor.
fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<PageSize, PdfEngineError> {
    let mut node = doc.get_dictionary(page_id)?;

    for _ in 0..MAX_TREE_DEPTH {
        let declared = node
            .get(b"MediaBox")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_array().ok())
            .and_then(|corners| PageSize::from_media_box(corners));

        if let Some(size) = declared {
            return Ok(size);
        }

        match node.get(b"Parent").and_then(|parent| parent.as_reference()) {
            Ok(parent_id) => node = doc.get_dictionary(parent_id)?,
            Err(_) => break,
        }
    }

    Ok(PageSize::LETTER)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        direct => Some(direct),
    }
}

fn paint_blank_page(width: u32, height: u32) -> RgbaImage {
    let framed = width >= 4 && height >= 4;

    RgbaImage::from_fn(width, height, |x, y| {
        let on_edge = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
        if framed && on_edge {
            PAGE_EDGE
        } else {
            PAGE_BACKGROUND
        }
    })
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: DocumentSource) -> Result<DocumentHandle, PdfEngineError> {
        let origin = source.to_string();
        let pages = read_page_sizes(&source.into_bytes()?)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("opened {origin} as document {} with {} page(s)", handle.raw(), pages.len());
        self.documents.insert(handle, pages);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.pages(handle)?.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let pages = self.pages(handle)?;

        pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: pages.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        viewport: &PageViewport,
    ) -> Result<RgbaImage, PdfEngineError> {
        self.page_size(handle, viewport.page_index)?;
        viewport.check_raster_size()?;

        Ok(paint_blank_page(viewport.width_px.max(1), viewport.height_px.max(1)))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        match self.documents.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(PdfEngineError::InvalidHandle(handle.raw())),
        }
    }
}

fn fetch_remote(url: &str) -> Result<Vec<u8>, PdfEngineError> {
    log::debug!("fetching {url}");

    let response = ureq::get(url).call().map_err(|err| match err {
        ureq::Error::Status(code, _) => PdfEngineError::Network(format!("{url} returned {code}")),
        ureq::Error::Transport(transport) => PdfEngineError::Network(transport.to_string()),
    })?;

    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;

    Ok(bytes)
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
