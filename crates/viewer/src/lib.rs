//! Certificate viewer runtime.
//!
//! Pairs the [`viewer_core::PageViewer`] state machine with a document
//! engine running on a background worker and a drawing surface, and renders
//! the small first-page previews used on certificate cards.

pub mod cancel;
pub mod preview;
pub mod session;
pub mod surface;
mod worker;

pub use cancel::CancellationToken;
pub use preview::{render_catalog_previews, render_preview, CertificatePreview};
pub use session::{ViewerError, ViewerEvent, ViewerSession};
pub use surface::{RasterSurface, Surface, SurfaceContent};
pub use viewer_core::{is_usable_scale, PageLabel, LOAD_ERROR_MESSAGE, MAX_RENDER_SCALE};
pub use worker::RenderedPage;
