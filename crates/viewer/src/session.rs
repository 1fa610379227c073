//! Certificate viewer session: viewer state, render worker and surface wired
//! together.
//!
//! The session is driven from one thread. Navigation calls return at once;
//! loads and renders complete on the worker and take effect when the owner
//! calls [`ViewerSession::step`], [`ViewerSession::pump`] or
//! [`ViewerSession::wait_idle`].

use crate::cancel::CancellationToken;
use crate::surface::{RasterSurface, Surface};
use crate::worker::{BoxedEngine, Completion, Job, RenderWorker, RenderedPage};
use pdf_engine::{DocumentHandle, DocumentSource, PdfEngine, PdfEngineError};
use std::sync::mpsc::TryRecvError;
use viewer_core::{
    is_usable_scale, render_error_message, LoadOutcome, LoadTicket, LoadedDocument, PageLabel,
    PageViewer, RenderOutcome, RenderTicket, LOAD_ERROR_MESSAGE, MAX_RENDER_SCALE,
};

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to start render worker: {0}")]
    Worker(#[from] std::io::Error),
    #[error(
        "render scale must be greater than 0 and at most {max}, got {0}",
        max = MAX_RENDER_SCALE
    )]
    InvalidScale(f32),
}

/// User interface events the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    Previous,
    Next,
    Close,
}

pub struct ViewerSession<S: Surface = RasterSurface> {
    viewer: PageViewer<DocumentHandle>,
    surface: S,
    worker: RenderWorker,
    token: CancellationToken,
    outstanding: usize,
    // Submitted to the worker and not yet applied. Failed as a unit if the
    // worker dies.
    loading: Option<LoadTicket>,
    in_flight: Option<RenderTicket<DocumentHandle>>,
}

impl ViewerSession<RasterSurface> {
    pub fn new<E>(engine: E, scale: f32) -> Result<Self, ViewerError>
    where
        E: PdfEngine + Send + 'static,
    {
        Self::with_surface(engine, RasterSurface::new(), scale)
    }
}

impl<S: Surface> ViewerSession<S> {
    pub fn with_surface<E>(engine: E, surface: S, scale: f32) -> Result<Self, ViewerError>
    where
        E: PdfEngine + Send + 'static,
    {
        if !is_usable_scale(scale) {
            return Err(ViewerError::InvalidScale(scale));
        }

        let engine: BoxedEngine = Box::new(engine);

        Ok(Self {
            viewer: PageViewer::new(scale),
            surface,
            worker: RenderWorker::spawn(engine)?,
            token: CancellationToken::new(),
            outstanding: 0,
            loading: None,
            in_flight: None,
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn current_page(&self) -> u32 {
        self.viewer.current_page()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.viewer.page_count()
    }

    pub fn page_label(&self) -> Option<PageLabel> {
        self.viewer.label()
    }

    pub fn has_document(&self) -> bool {
        self.viewer.has_document()
    }

    pub fn is_modal_visible(&self) -> bool {
        self.viewer.is_modal_visible()
    }

    pub fn is_rendering(&self) -> bool {
        self.viewer.is_rendering()
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.viewer.pending_page()
    }

    /// Loads and renders jobs submitted but not yet applied.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Shows the modal and starts loading `source`. A document from an
    /// earlier session is released.
    pub fn open(&mut self, source: DocumentSource) {
        log::debug!("opening {source}");

        self.token.rotate();
        let (ticket, released) = self.viewer.open();
        self.release(released);

        let job = Job::Open { ticket, source, token: self.token.clone() };
        if self.worker.submit(job) {
            self.outstanding += 1;
            self.loading = Some(ticket);
        } else {
            log::error!("render worker unavailable");
            self.apply_load(ticket, Err(worker_gone()));
        }
    }

    pub fn render_page(&mut self, page: u32) {
        let ticket = self.viewer.render_page(page);
        self.dispatch(ticket);
    }

    pub fn queue_render_page(&mut self, page: u32) {
        let ticket = self.viewer.queue_render_page(page);
        self.dispatch(ticket);
    }

    pub fn previous_page(&mut self) {
        let ticket = self.viewer.previous_page();
        self.dispatch(ticket);
    }

    pub fn next_page(&mut self) {
        let ticket = self.viewer.next_page();
        self.dispatch(ticket);
    }

    /// Hides the modal and discards the document. Work already queued for
    /// this session is skipped or ignored when it completes.
    pub fn close(&mut self) {
        self.token.rotate();
        self.loading = None;
        self.in_flight = None;
        let released = self.viewer.close();
        self.release(released);
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::Previous => self.previous_page(),
            ViewerEvent::Next => self.next_page(),
            ViewerEvent::Close => self.close(),
        }
    }

    /// Waits for one completion and applies it. Returns `false` when nothing
    /// was outstanding.
    pub fn step(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }

        match self.worker.recv() {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => {
                self.worker_lost();
                self.outstanding > 0
            }
        }
    }

    /// Applies every completion that is already available. Returns how many
    /// were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;

        while self.outstanding > 0 {
            match self.worker.try_recv() {
                Ok(completion) => {
                    self.apply(completion);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_lost();
                    break;
                }
            }
        }

        applied
    }

    /// Applies completions until no load or render is outstanding.
    pub fn wait_idle(&mut self) {
        while self.step() {}
    }

    fn apply(&mut self, completion: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);

        match completion {
            Completion::Loaded { ticket, result } => self.apply_load(ticket, result),
            Completion::Rendered { ticket, result } => self.apply_render(ticket, result),
            Completion::Skipped => log::debug!("skipped job from a closed session"),
        }
    }

    /// Fails the load and render the dead worker still owed us, so the
    /// in-flight flag clears and the failure is drawn.
    fn worker_lost(&mut self) {
        log::error!("render worker stopped with {} job(s) outstanding", self.outstanding);
        self.outstanding = 0;

        if let Some(ticket) = self.loading.take() {
            self.apply_load(ticket, Err(worker_gone()));
        }

        if let Some(ticket) = self.in_flight.take() {
            self.apply_render(ticket, Err(worker_gone()));
        }
    }

    fn apply_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<LoadedDocument<DocumentHandle>, PdfEngineError>,
    ) {
        if self.loading == Some(ticket) {
            self.loading = None;
        }

        match result {
            Ok(document) => match self.viewer.finish_load(ticket, document) {
                LoadOutcome::Render(render) => self.dispatch(Some(render)),
                LoadOutcome::Failed => {
                    self.release(Some(document.handle));
                    self.surface.draw_message(LOAD_ERROR_MESSAGE);
                }
                LoadOutcome::Stale => self.release(Some(document.handle)),
            },
            Err(err) => {
                if self.viewer.fail_load(ticket) {
                    log::warn!("error loading document: {err}");
                    self.surface.draw_message(LOAD_ERROR_MESSAGE);
                } else {
                    log::debug!("ignoring stale load failure: {err}");
                }
            }
        }
    }

    fn apply_render(
        &mut self,
        ticket: RenderTicket<DocumentHandle>,
        result: Result<RenderedPage, PdfEngineError>,
    ) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }

        let RenderOutcome::Current { follow_up } = self.viewer.finish_render(&ticket) else {
            log::debug!("dropping stale render of page {}", ticket.page);
            return;
        };

        match result {
            Ok(rendered) => {
                self.surface.resize(rendered.viewport.width_px, rendered.viewport.height_px);
                self.surface.draw_page(ticket.page, &rendered.image);
            }
            Err(err) => {
                log::warn!("error rendering page {}: {err}", ticket.page);
                self.surface.draw_message(&render_error_message(ticket.page));
            }
        }

        self.dispatch(follow_up);
    }

    fn dispatch(&mut self, ticket: Option<RenderTicket<DocumentHandle>>) {
        let Some(ticket) = ticket else {
            return;
        };

        if self.worker.submit(Job::Render { ticket, token: self.token.clone() }) {
            self.outstanding += 1;
            self.in_flight = Some(ticket);
        } else {
            log::error!("render worker unavailable");
            self.apply_render(ticket, Err(worker_gone()));
        }
    }

    fn release(&mut self, handle: Option<DocumentHandle>) {
        if let Some(handle) = handle {
            // Fire and forget; a dead worker has nothing left to release.
            let _ = self.worker.submit(Job::Release { handle });
        }
    }
}

fn worker_gone() -> PdfEngineError {
    PdfEngineError::Backend("render worker unavailable".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceContent;
    use pdf_engine::{fixtures, LopdfEngine, PageSize, PageViewport, RgbaImage};

    #[derive(Debug, Default)]
    struct RecordingSurface {
        draws: Vec<SurfaceContent>,
        size: (u32, u32),
    }

    impl Surface for RecordingSurface {
        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn draw_page(&mut self, page: u32, _image: &RgbaImage) {
            self.draws.push(SurfaceContent::Page(page));
        }

        fn draw_message(&mut self, message: &str) {
            self.draws.push(SurfaceContent::Message(message.to_owned()));
        }
    }

    /// Delegates to [`LopdfEngine`] but fails or panics on one page.
    struct FaultyPage {
        inner: LopdfEngine,
        page_index: u32,
        panic: bool,
    }

    impl FaultyPage {
        fn failing(page_index: u32) -> Self {
            Self { inner: LopdfEngine::new(), page_index, panic: false }
        }

        fn panicking(page_index: u32) -> Self {
            Self { inner: LopdfEngine::new(), page_index, panic: true }
        }
    }

    impl PdfEngine for FaultyPage {
        fn open(&mut self, source: DocumentSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            viewport: &PageViewport,
        ) -> Result<RgbaImage, PdfEngineError> {
            if viewport.page_index == self.page_index {
                if self.panic {
                    panic!("rasterizer crashed on page index {}", self.page_index);
                }
                return Err(PdfEngineError::Backend("corrupt content stream".to_owned()));
            }

            self.inner.render_page(handle, viewport)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }
    }

    fn source(pages: usize) -> DocumentSource {
        let sizes = vec![(200.0, 100.0); pages];
        DocumentSource::Bytes(fixtures::document_with_pages(&sizes))
    }

    fn session() -> ViewerSession<RecordingSurface> {
        ViewerSession::with_surface(LopdfEngine::new(), RecordingSurface::default(), 1.5)
            .expect("worker should start")
    }

    fn pages(draws: &[SurfaceContent]) -> Vec<u32> {
        draws
            .iter()
            .filter_map(|draw| match draw {
                SurfaceContent::Page(page) => Some(*page),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn open_renders_first_page_at_scale() {
        let mut viewer = session();

        viewer.open(source(3));
        assert!(viewer.is_modal_visible());
        viewer.wait_idle();

        assert_eq!(pages(&viewer.surface().draws), vec![1]);
        assert_eq!(viewer.surface().size, (300, 150));
        assert_eq!(
            viewer.page_label().map(|label| label.to_string()).as_deref(),
            Some("Page 1 of 3")
        );
    }

    #[test]
    fn queued_page_is_rendered_and_current() {
        let mut viewer = session();
        viewer.open(source(5));
        viewer.wait_idle();

        viewer.queue_render_page(4);
        viewer.wait_idle();

        assert_eq!(viewer.current_page(), 4);
        assert_eq!(viewer.surface().draws.last(), Some(&SurfaceContent::Page(4)));
    }

    #[test]
    fn navigation_stops_at_both_ends() {
        let mut viewer = session();
        viewer.open(source(2));
        viewer.wait_idle();

        viewer.handle_event(ViewerEvent::Previous);
        viewer.wait_idle();
        assert_eq!(viewer.current_page(), 1);

        viewer.handle_event(ViewerEvent::Next);
        viewer.wait_idle();
        viewer.handle_event(ViewerEvent::Next);
        viewer.wait_idle();

        assert_eq!(viewer.current_page(), 2);
        assert_eq!(pages(&viewer.surface().draws), vec![1, 2]);
    }

    #[test]
    fn requests_while_rendering_coalesce() {
        let mut viewer = session();
        viewer.open(source(5));

        // Applying the load dispatches the first page; it stays in flight
        // until its completion is applied.
        assert!(viewer.step());
        assert!(viewer.is_rendering());

        viewer.queue_render_page(2);
        viewer.queue_render_page(3);
        assert_eq!(viewer.pending_page(), Some(3));

        viewer.wait_idle();

        assert_eq!(pages(&viewer.surface().draws), vec![1, 3]);
        assert_eq!(viewer.current_page(), 3);
    }

    #[test]
    fn reopen_after_close_starts_at_first_page() {
        let mut viewer = session();
        viewer.open(source(3));
        viewer.wait_idle();
        viewer.next_page();
        viewer.wait_idle();

        viewer.handle_event(ViewerEvent::Close);
        assert!(!viewer.is_modal_visible());
        assert!(!viewer.has_document());
        assert_eq!(viewer.current_page(), 1);

        viewer.open(source(7));
        viewer.wait_idle();

        assert_eq!(viewer.current_page(), 1);
        assert_eq!(
            viewer.page_label().map(|label| label.to_string()).as_deref(),
            Some("Page 1 of 7")
        );
    }

    #[test]
    fn unreachable_reference_draws_error() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut viewer = session();

        viewer.open(DocumentSource::Path(temp.path().join("missing.pdf")));
        viewer.wait_idle();

        assert!(!viewer.has_document());
        assert_eq!(
            viewer.surface().draws,
            vec![SurfaceContent::Message(LOAD_ERROR_MESSAGE.to_owned())]
        );

        viewer.next_page();
        assert_eq!(viewer.outstanding(), 0);
        assert_eq!(viewer.current_page(), 1);
    }

    #[test]
    fn render_in_flight_at_close_never_draws() {
        let mut viewer = session();
        viewer.open(source(3));
        assert!(viewer.step());
        assert!(viewer.is_rendering());

        viewer.close();
        viewer.wait_idle();

        assert!(viewer.surface().draws.is_empty());
        assert!(!viewer.is_rendering());
    }

    #[test]
    fn load_superseded_by_second_open_is_ignored() {
        let mut viewer = session();

        viewer.open(source(2));
        viewer.open(source(4));
        viewer.wait_idle();

        assert_eq!(viewer.page_count(), Some(4));
        assert_eq!(pages(&viewer.surface().draws), vec![1]);
    }

    #[test]
    fn raster_session_holds_rendered_page() {
        let mut viewer = ViewerSession::new(LopdfEngine::new(), 1.0).expect("worker should start");

        viewer.open(source(1));
        viewer.wait_idle();

        assert_eq!(viewer.surface().content(), &SurfaceContent::Page(1));
        assert_eq!(viewer.surface().dimensions(), (200, 100));
    }

    #[test]
    fn failed_page_draws_error_and_runs_pending_page() {
        let mut viewer =
            ViewerSession::with_surface(FaultyPage::failing(0), RecordingSurface::default(), 1.0)
                .expect("worker should start");
        viewer.open(source(3));

        assert!(viewer.step());
        assert!(viewer.is_rendering());
        viewer.queue_render_page(3);
        assert_eq!(viewer.pending_page(), Some(3));

        viewer.wait_idle();

        assert!(!viewer.is_rendering());
        assert_eq!(viewer.pending_page(), None);
        assert_eq!(
            viewer.surface().draws,
            vec![
                SurfaceContent::Message("Error rendering page 1.".to_owned()),
                SurfaceContent::Page(3),
            ]
        );
    }

    #[test]
    fn worker_crash_clears_render_flag_and_draws_error() {
        let mut viewer =
            ViewerSession::with_surface(FaultyPage::panicking(0), RecordingSurface::default(), 1.0)
                .expect("worker should start");
        viewer.open(source(2));
        viewer.wait_idle();

        assert!(viewer.has_document());
        assert!(!viewer.is_rendering());
        assert_eq!(viewer.outstanding(), 0);
        assert_eq!(
            viewer.surface().draws,
            vec![SurfaceContent::Message("Error rendering page 1.".to_owned())]
        );

        viewer.next_page();
        viewer.wait_idle();

        assert_eq!(viewer.current_page(), 2);
        assert!(!viewer.is_rendering());
        assert_eq!(
            viewer.surface().draws.last(),
            Some(&SurfaceContent::Message("Error rendering page 2.".to_owned()))
        );
    }

    #[test]
    fn oversized_page_draws_error_and_navigation_continues() {
        let sizes = [(14_400.0, 14_400.0), (200.0, 100.0)];
        let mut viewer = session();
        viewer.open(DocumentSource::Bytes(fixtures::document_with_pages(&sizes)));
        viewer.wait_idle();

        assert!(!viewer.is_rendering());
        assert_eq!(
            viewer.surface().draws,
            vec![SurfaceContent::Message("Error rendering page 1.".to_owned())]
        );

        viewer.next_page();
        viewer.wait_idle();

        assert_eq!(pages(&viewer.surface().draws), vec![2]);
    }

    #[test]
    fn unusable_scale_is_rejected() {
        for scale in [0.0, -1.0, f32::NAN, 1.0e9] {
            let err = ViewerSession::new(LopdfEngine::new(), scale)
                .err()
                .expect("scale should be rejected");
            assert!(matches!(err, ViewerError::InvalidScale(_)));
        }
    }

    #[test]
    fn unreachable_remote_reference_draws_load_error() {
        let mut viewer = session();

        viewer.open(DocumentSource::parse("http://127.0.0.1:1/cert.pdf"));
        viewer.wait_idle();

        assert!(!viewer.has_document());
        assert_eq!(
            viewer.surface().draws,
            vec![SurfaceContent::Message(LOAD_ERROR_MESSAGE.to_owned())]
        );
    }
}
