//! First-page previews for certificate cards.

use pdf_engine::{DocumentSource, PdfEngine, PdfEngineError, RgbaImage};
use portfolio_model::Certificate;
use std::path::Path;

#[derive(Debug)]
pub enum CertificatePreview {
    Image(RgbaImage),
    /// The document could not be shown; the card displays an icon instead.
    Fallback { reason: String },
}

impl CertificatePreview {
    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            Self::Image(image) => Some(image),
            Self::Fallback { .. } => None,
        }
    }
}

/// Renders page 1 of `source` at `scale`.
pub fn render_preview(
    engine: &mut dyn PdfEngine,
    source: DocumentSource,
    scale: f32,
) -> CertificatePreview {
    let label = source.to_string();

    match render_first_page(engine, source, scale) {
        Ok(image) => CertificatePreview::Image(image),
        Err(err) => {
            log::warn!("error loading preview for {label}: {err}");
            CertificatePreview::Fallback { reason: err.to_string() }
        }
    }
}

/// Renders a preview for every certificate, resolving files against
/// `certificates_dir`. Results keep the catalog order.
pub fn render_catalog_previews<'a>(
    engine: &mut dyn PdfEngine,
    certificates: &'a [Certificate],
    certificates_dir: &Path,
    scale: f32,
) -> Vec<(&'a Certificate, CertificatePreview)> {
    certificates
        .iter()
        .map(|certificate| {
            let source = DocumentSource::Path(certificate.document_path(certificates_dir));
            (certificate, render_preview(engine, source, scale))
        })
        .collect()
}

fn render_first_page(
    engine: &mut dyn PdfEngine,
    source: DocumentSource,
    scale: f32,
) -> Result<RgbaImage, PdfEngineError> {
    let handle = engine.open(source)?;

    let rendered = engine.render_thumbnail(handle, 0, scale);

    if let Err(err) = engine.close(handle) {
        log::debug!("failed to release preview document: {err}");
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::{fixtures, LopdfEngine};
    use std::fs;

    fn certificate(file: &str) -> Certificate {
        Certificate {
            name: file.to_owned(),
            issuer: "Issuer".to_owned(),
            date: "2024".to_owned(),
            file: file.to_owned(),
        }
    }

    #[test]
    fn preview_renders_first_page_at_half_scale() {
        let mut engine = LopdfEngine::new();
        let bytes = fixtures::document_with_pages(&[(400.0, 300.0), (100.0, 100.0)]);

        let preview = render_preview(&mut engine, DocumentSource::Bytes(bytes), 0.5);

        let image = preview.image().expect("preview should render");
        assert_eq!(image.dimensions(), (200, 150));
    }

    #[test]
    fn catalog_previews_fall_back_per_certificate() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join("good.pdf"), fixtures::document_with_pages(&[(200.0, 200.0)]))
            .expect("fixture should be written");
        fs::write(temp.path().join("broken.pdf"), b"not a pdf").expect("fixture should be written");

        let certificates =
            vec![certificate("good.pdf"), certificate("broken.pdf"), certificate("absent.pdf")];
        let mut engine = LopdfEngine::new();

        let previews = render_catalog_previews(&mut engine, &certificates, temp.path(), 0.5);

        assert_eq!(previews.len(), 3);
        assert!(matches!(previews[0].1, CertificatePreview::Image(_)));
        assert!(matches!(previews[1].1, CertificatePreview::Fallback { .. }));
        assert!(matches!(previews[2].1, CertificatePreview::Fallback { .. }));
        assert_eq!(previews[2].0.file, "absent.pdf");
    }
}
