//! Single-page document viewer state.
//!
//! [`PageViewer`] holds everything the certificate modal needs to know about
//! the document on screen: the handle, the current page, whether a render is
//! in flight and the one navigation request waiting behind it. It performs no
//! I/O. Every operation that needs work done hands back a ticket, and the
//! driver reports the result through `finish_*` once the work completes.
//!
//! Each `open` and `close` starts a new [`Generation`]. Tickets carry the
//! generation they were issued in, so results that arrive after the viewer
//! moved on are recognised as stale and dropped.

use std::fmt;

pub const DEFAULT_RENDER_SCALE: f32 = 1.5;

/// Largest zoom the viewer and previews accept.
pub const MAX_RENDER_SCALE: f32 = 10.0;

pub const LOAD_ERROR_MESSAGE: &str = "Error loading document. Please check the file path.";

pub fn render_error_message(page: u32) -> String {
    format!("Error rendering page {page}.")
}

pub fn is_usable_scale(scale: f32) -> bool {
    scale.is_finite() && scale > 0.0 && scale <= MAX_RENDER_SCALE
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn raw(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Text shown next to the navigation buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLabel {
    pub page: u32,
    pub page_count: u32,
}

impl fmt::Display for PageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {} of {}", self.page, self.page_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedDocument<H> {
    pub handle: H,
    pub page_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: Generation,
}

/// One page render the driver should perform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTicket<H> {
    pub generation: Generation,
    pub handle: H,
    /// 1-based page number.
    pub page: u32,
    pub scale: f32,
}

impl<H> RenderTicket<H> {
    pub fn page_index(&self) -> u32 {
        self.page.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOutcome<H> {
    /// The document is installed; render its first page.
    Render(RenderTicket<H>),
    /// The document loaded but cannot be shown (it has no pages).
    Failed,
    /// The load belongs to an earlier generation.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome<H> {
    /// The render is current: draw it, then dispatch the follow-up if any.
    Current { follow_up: Option<RenderTicket<H>> },
    Stale,
}

#[derive(Debug, Clone)]
pub struct PageViewer<H> {
    scale: f32,
    generation: Generation,
    document: Option<LoadedDocument<H>>,
    current_page: u32,
    rendering: bool,
    pending_page: Option<u32>,
    label: Option<PageLabel>,
    modal_visible: bool,
}

impl<H: Copy> Default for PageViewer<H> {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_SCALE)
    }
}

impl<H: Copy> PageViewer<H> {
    /// Creates an idle viewer. A scale outside `(0, MAX_RENDER_SCALE]` is
    /// replaced by [`DEFAULT_RENDER_SCALE`].
    pub fn new(scale: f32) -> Self {
        let scale = if is_usable_scale(scale) {
            scale
        } else {
            log::warn!("render scale {scale} is unusable, using {DEFAULT_RENDER_SCALE}");
            DEFAULT_RENDER_SCALE
        };

        Self {
            scale,
            generation: Generation::default(),
            document: None,
            current_page: 1,
            rendering: false,
            pending_page: None,
            label: None,
            modal_visible: false,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn document(&self) -> Option<&LoadedDocument<H>> {
        self.document.as_ref()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.document.as_ref().map(|doc| doc.page_count)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.pending_page
    }

    pub fn label(&self) -> Option<PageLabel> {
        self.label
    }

    pub fn is_modal_visible(&self) -> bool {
        self.modal_visible
    }

    /// Shows the modal and starts a new viewing session. Any document from
    /// the previous session is returned so the caller can release it.
    pub fn open(&mut self) -> (LoadTicket, Option<H>) {
        let released = self.reset();
        self.modal_visible = true;

        log::debug!("viewer open, generation {}", self.generation.raw());
        (LoadTicket { generation: self.generation }, released)
    }

    pub fn finish_load(&mut self, ticket: LoadTicket, loaded: LoadedDocument<H>) -> LoadOutcome<H> {
        if ticket.generation != self.generation {
            return LoadOutcome::Stale;
        }

        if loaded.page_count == 0 {
            log::warn!("document has no pages");
            return LoadOutcome::Failed;
        }

        self.document = Some(loaded);
        self.current_page = 1;
        self.label = Some(PageLabel { page: 1, page_count: loaded.page_count });

        match self.render_page(1) {
            Some(ticket) => LoadOutcome::Render(ticket),
            None => LoadOutcome::Failed,
        }
    }

    /// Records a failed load. Returns whether the failure belongs to the
    /// current session and should be shown.
    pub fn fail_load(&mut self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Starts rendering `page`, or parks it in the pending slot if a render
    /// is already running. The label follows `page` either way.
    pub fn render_page(&mut self, page: u32) -> Option<RenderTicket<H>> {
        let document = self.document?;

        if page == 0 || page > document.page_count {
            return None;
        }

        self.label = Some(PageLabel { page, page_count: document.page_count });

        if self.rendering {
            self.park(page);
            return None;
        }

        self.rendering = true;
        log::debug!("render page {page}, generation {}", self.generation.raw());

        Some(RenderTicket {
            generation: self.generation,
            handle: document.handle,
            page,
            scale: self.scale,
        })
    }

    /// Navigation entry point: moves to `page` and renders it now or after
    /// the render in flight.
    pub fn queue_render_page(&mut self, page: u32) -> Option<RenderTicket<H>> {
        let page_count = self.page_count()?;

        if page == 0 || page > page_count {
            return None;
        }

        self.current_page = page;

        if self.rendering {
            self.park(page);
            None
        } else {
            self.render_page(page)
        }
    }

    pub fn previous_page(&mut self) -> Option<RenderTicket<H>> {
        if !self.has_document() || self.current_page <= 1 {
            return None;
        }

        self.queue_render_page(self.current_page - 1)
    }

    pub fn next_page(&mut self) -> Option<RenderTicket<H>> {
        let page_count = self.page_count()?;

        if self.current_page >= page_count {
            return None;
        }

        self.queue_render_page(self.current_page + 1)
    }

    /// Completes a render, successful or not. A current render clears the
    /// in-flight flag and drains the pending slot by exactly one step.
    pub fn finish_render(&mut self, ticket: &RenderTicket<H>) -> RenderOutcome<H> {
        if ticket.generation != self.generation || !self.rendering {
            return RenderOutcome::Stale;
        }

        self.rendering = false;

        let follow_up = self.pending_page.take().and_then(|page| self.render_page(page));

        RenderOutcome::Current { follow_up }
    }

    /// Hides the modal and discards the document. Renders still running
    /// become stale.
    pub fn close(&mut self) -> Option<H> {
        let released = self.reset();
        self.modal_visible = false;

        log::debug!("viewer closed, generation {}", self.generation.raw());
        released
    }

    fn reset(&mut self) -> Option<H> {
        self.generation = self.generation.next();
        self.current_page = 1;
        self.rendering = false;
        self.pending_page = None;
        self.label = None;
        self.document.take().map(|doc| doc.handle)
    }

    fn park(&mut self, page: u32) {
        if let Some(previous) = self.pending_page.replace(page) {
            log::debug!("pending page {previous} superseded by {page}");
        }
    }
}
