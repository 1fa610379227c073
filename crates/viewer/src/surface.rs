use image::Rgba;
use pdf_engine::RgbaImage;

/// Width and height of a freshly created canvas before any page is drawn.
pub const DEFAULT_SURFACE_SIZE: (u32, u32) = (300, 150);

/// Raster target the viewer draws pages and inline messages onto.
pub trait Surface {
    fn resize(&mut self, width: u32, height: u32);
    fn draw_page(&mut self, page: u32, image: &RgbaImage);
    fn draw_message(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceContent {
    Blank,
    Page(u32),
    Message(String),
}

/// In-memory RGBA canvas.
///
/// Messages do not clear the canvas; they are kept alongside the pixels and
/// left to the presenter to lay out as text.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pixels: RgbaImage,
    content: SurfaceContent,
}

impl Default for RasterSurface {
    fn default() -> Self {
        let (width, height) = DEFAULT_SURFACE_SIZE;
        Self { pixels: RgbaImage::new(width, height), content: SurfaceContent::Blank }
    }
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn content(&self) -> &SurfaceContent {
        &self.content
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn message(&self) -> Option<&str> {
        match &self.content {
            SurfaceContent::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl Surface for RasterSurface {
    fn resize(&mut self, width: u32, height: u32) {
        // Resizing a canvas clears it.
        self.pixels = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([0, 0, 0, 0]));
        self.content = SurfaceContent::Blank;
    }

    fn draw_page(&mut self, page: u32, image: &RgbaImage) {
        image::imageops::replace(&mut self.pixels, image, 0, 0);
        self.content = SurfaceContent::Page(page);
    }

    fn draw_message(&mut self, message: &str) {
        self.content = SurfaceContent::Message(message.to_owned());
    }
}
