use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_viewer::{
    is_usable_scale, render_catalog_previews, CertificatePreview, ViewerSession, MAX_RENDER_SCALE,
};
use pdf_engine::{default_engine, DocumentSource, PdfEngine};
use portfolio_model::{
    load_certificates, load_projects, CounterAnimation, ProjectCard, ProjectDetail, RevealTrigger,
    Settings, CERTIFICATES_MISSING_MESSAGE, PROJECTS_MISSING_MESSAGE,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

mod logger;

#[derive(Debug, Parser)]
#[command(name = "folio-cli")]
#[command(about = "Certificate viewer and portfolio content tools")]
pub struct Cli {
    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print debug logging to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "REF")]
        reference: String,
    },
    /// Open a document in the viewer, go to a page and save what is drawn.
    View {
        #[arg(value_name = "REF")]
        reference: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_parser = parse_scale)]
        scale: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render first-page previews for every certificate in a catalog.
    Previews {
        /// Defaults to `data/certificates.json` under the content root.
        #[arg(value_name = "CERTIFICATES_JSON")]
        catalog: Option<PathBuf>,
        /// Directory holding the certificate files.
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value = "previews")]
        out: PathBuf,
        #[arg(long, value_parser = parse_scale)]
        scale: Option<f32>,
    },
    /// List project cards or show one project in full.
    Projects {
        /// Defaults to `data/projects.json` under the content root.
        #[arg(value_name = "PROJECTS_JSON")]
        catalog: Option<PathBuf>,
        #[arg(long, value_name = "TITLE")]
        detail: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print the frames of a stat counter.
    Counter {
        target: u32,
        #[arg(long)]
        speed: Option<u32>,
        /// Wait one tick between frames.
        #[arg(long)]
        animate: bool,
        /// Fraction of the stats section on screen. The counter starts once
        /// half of it is visible.
        #[arg(long, default_value_t = 1.0)]
        visible_ratio: f32,
    },
    /// Print the effective settings.
    Settings,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    source: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    logger::init(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { reference } => run_info(&reference),
        Commands::View { reference, page, scale, output } => {
            run_view(&reference, page, scale.unwrap_or(settings.viewer_scale), output.as_deref())
        }
        Commands::Previews { catalog, root, out, scale } => {
            let catalog = catalog.unwrap_or_else(|| settings.data_dir().join("certificates.json"));
            let root = root.unwrap_or_else(|| settings.certificates_dir());
            run_previews(&catalog, &root, &out, scale.unwrap_or(settings.preview_scale))
        }
        Commands::Projects { catalog, detail, json } => {
            let catalog = catalog.unwrap_or_else(|| settings.data_dir().join("projects.json"));
            run_projects(&catalog, detail.as_deref(), json)
        }
        Commands::Counter { target, speed, animate, visible_ratio } => {
            run_counter(&settings, target, speed, animate, visible_ratio)
        }
        Commands::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let settings = match config {
        Some(path) => storage::read_settings_file(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => match storage::Storage::from_default_project() {
            Ok(store) => store.load_settings().context("failed to load settings")?,
            Err(err) => {
                log::debug!("{err}; using default settings");
                Settings::default()
            }
        },
    };

    Ok(storage::apply_env_overrides(settings)?)
}

fn run_info(reference: &str) -> Result<()> {
    let source = resolve_source(reference)?;
    let label = source.to_string();

    let mut engine = default_engine();
    let handle = engine.open(source).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let size = engine.page_size(handle, 0)?;

    let payload = InfoOutput {
        source: label,
        page_count,
        first_page_size_pt: Some(PageSizeOutput { width: size.width_pt, height: size.height_pt }),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);

    engine.close(handle)?;

    Ok(())
}

fn run_view(reference: &str, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let source = resolve_source(reference)?;
    let mut session = ViewerSession::new(default_engine(), scale)?;

    session.open(source);
    session.wait_idle();

    if !session.has_document() {
        let message = session.surface().message().unwrap_or(folio_viewer::LOAD_ERROR_MESSAGE);
        anyhow::bail!("{message}");
    }

    let page_count = session.page_count().unwrap_or(0);
    if page > page_count {
        anyhow::bail!("page {page} out of range (page_count={page_count})");
    }

    // Navigation requests made while a render is running coalesce, so only
    // the last page asked for gets drawn.
    for _ in 1..page {
        session.next_page();
    }
    session.wait_idle();

    if let Some(message) = session.surface().message() {
        anyhow::bail!("{message}");
    }

    if let Some(label) = session.page_label() {
        println!("{label}");
    }

    if let Some(output) = output {
        write_png(session.surface().pixels(), output)?;
        println!("{}", output.display());
    }

    session.close();

    Ok(())
}

fn run_previews(catalog: &Path, root: &Path, out: &Path, scale: f32) -> Result<()> {
    let certificates = load_certificates(catalog).context(CERTIFICATES_MISSING_MESSAGE)?;

    let mut engine = default_engine();
    let previews = render_catalog_previews(&mut engine, &certificates, root, scale);

    for (certificate, preview) in previews {
        match preview {
            CertificatePreview::Image(image) => {
                let path = out.join(certificate.preview_file_name());
                write_png(&image, &path)?;
                println!("{}", path.display());
            }
            CertificatePreview::Fallback { .. } => println!("fallback:{}", certificate.file),
        }
    }

    Ok(())
}

fn run_projects(catalog: &Path, detail: Option<&str>, json: bool) -> Result<()> {
    let projects = load_projects(catalog).context(PROJECTS_MISSING_MESSAGE)?;

    if let Some(title) = detail {
        let project = projects
            .iter()
            .find(|project| project.title == title)
            .with_context(|| format!("no project titled {title:?}"))?;
        let detail = ProjectDetail::from(project);

        if json {
            println!("{}", serde_json::to_string_pretty(&detail)?);
        } else {
            print!("{detail}");
        }
        return Ok(());
    }

    let cards: Vec<ProjectCard> = projects.iter().map(ProjectCard::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }

    for card in cards {
        println!("{} ({})", card.title, card.icon);
        println!("  {}", card.description);
        println!("  {}", card.technologies.join(", "));
    }

    Ok(())
}

fn run_counter(
    settings: &Settings,
    target: u32,
    speed: Option<u32>,
    animate: bool,
    visible_ratio: f32,
) -> Result<()> {
    if !RevealTrigger::default().observe(visible_ratio) {
        log::info!("stats section not visible enough ({visible_ratio}); counter not started");
        return Ok(());
    }

    let speed = speed.unwrap_or(settings.counter_speed);
    let animation = CounterAnimation::new(
        target,
        speed,
        std::time::Duration::from_millis(settings.counter_tick_ms),
    );
    let tick = animation.tick();
    let mut out = io::stdout().lock();

    for frame in animation {
        writeln!(out, "{frame}")?;
        if animate {
            out.flush()?;
            thread::sleep(tick);
        }
    }

    Ok(())
}

fn parse_scale(value: &str) -> Result<f32, String> {
    let scale: f32 = value.trim().parse().map_err(|err| format!("{err}"))?;

    if is_usable_scale(scale) {
        Ok(scale)
    } else {
        Err(format!("must be greater than 0 and at most {MAX_RENDER_SCALE}"))
    }
}

fn resolve_source(reference: &str) -> Result<DocumentSource> {
    let source = DocumentSource::parse(reference);

    if let DocumentSource::Path(path) = &source {
        ensure_pdf_exists(path)?;
    }

    Ok(source)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn write_png(image: &pdf_engine::RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image.save(path).with_context(|| format!("failed to write image to {}", path.display()))
}
