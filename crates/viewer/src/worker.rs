//! Background render worker.
//!
//! One thread owns the document engine and executes jobs in submission
//! order: document loads, page renders and handle releases. Results travel
//! back over a channel and are applied by the thread that owns the viewer,
//! so the surface is only ever touched from one place.

use crate::cancel::CancellationToken;
use pdf_engine::{
    DocumentHandle, DocumentSource, PageViewport, PdfEngine, PdfEngineError, RgbaImage,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use viewer_core::{LoadTicket, LoadedDocument, RenderTicket};

pub type BoxedEngine = Box<dyn PdfEngine + Send>;

#[derive(Debug)]
pub(crate) enum Job {
    Open { ticket: LoadTicket, source: DocumentSource, token: CancellationToken },
    Render { ticket: RenderTicket<DocumentHandle>, token: CancellationToken },
    Release { handle: DocumentHandle },
}

#[derive(Debug)]
pub struct RenderedPage {
    pub viewport: PageViewport,
    pub image: RgbaImage,
}

#[derive(Debug)]
pub(crate) enum Completion {
    Loaded {
        ticket: LoadTicket,
        result: Result<LoadedDocument<DocumentHandle>, PdfEngineError>,
    },
    Rendered {
        ticket: RenderTicket<DocumentHandle>,
        result: Result<RenderedPage, PdfEngineError>,
    },
    /// The job's session was cancelled before it started.
    Skipped,
}

pub(crate) struct RenderWorker {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub(crate) fn spawn(engine: BoxedEngine) -> io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("folio-render".to_owned())
            .spawn(move || run(engine, job_rx, done_tx))?;

        Ok(Self { jobs: Some(job_tx), completions: done_rx, thread: Some(thread) })
    }

    /// Queues a job. Returns `false` if the worker thread has gone away.
    pub(crate) fn submit(&self, job: Job) -> bool {
        match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        }
    }

    /// Blocks until the next completion. `None` means the worker is gone.
    pub(crate) fn recv(&self) -> Option<Completion> {
        self.completions.recv().ok()
    }

    pub(crate) fn try_recv(&self) -> Result<Completion, TryRecvError> {
        self.completions.try_recv()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render worker panicked");
            }
        }
    }
}

fn run(mut engine: BoxedEngine, jobs: Receiver<Job>, completions: Sender<Completion>) {
    for job in jobs {
        let completion = match job {
            Job::Open { token, .. } | Job::Render { token, .. } if token.is_cancelled() => {
                Some(Completion::Skipped)
            }
            Job::Open { ticket, source, .. } => {
                Some(Completion::Loaded { ticket, result: load(engine.as_mut(), source) })
            }
            Job::Render { ticket, .. } => {
                Some(Completion::Rendered { ticket, result: render(engine.as_ref(), &ticket) })
            }
            Job::Release { handle } => {
                if let Err(err) = engine.close(handle) {
                    log::debug!("release of document {} failed: {err}", handle.raw());
                }
                None
            }
        };

        if let Some(completion) = completion {
            if completions.send(completion).is_err() {
                break;
            }
        }
    }
}

fn load(
    engine: &mut (dyn PdfEngine + Send),
    source: DocumentSource,
) -> Result<LoadedDocument<DocumentHandle>, PdfEngineError> {
    let handle = engine.open(source)?;

    match engine.page_count(handle) {
        Ok(page_count) => Ok(LoadedDocument { handle, page_count }),
        Err(err) => {
            let _ = engine.close(handle);
            Err(err)
        }
    }
}

fn render(
    engine: &(dyn PdfEngine + Send),
    ticket: &RenderTicket<DocumentHandle>,
) -> Result<RenderedPage, PdfEngineError> {
    let viewport = engine.viewport(ticket.handle, ticket.page_index(), ticket.scale)?;
    let image = engine.render_page(ticket.handle, &viewport)?;

    Ok(RenderedPage { viewport, image })
}
