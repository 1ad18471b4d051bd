// SPDX-License-Identifier: MIT

use image::codecs::png::PngDecoder;
use image::ImageDecoder;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use super::layout::{layout, FontStyle};
use super::Renderer;
use crate::adk::error::ReportError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LAYER: &str = "Report";
/// Box a figure is scaled to fit, in millimetres
const FIGURE_WIDTH: f32 = 150.0;
const FIGURE_HEIGHT: f32 = 95.0;
const FIGURE_GAP: f32 = 2.0;
const MM_PER_INCH: f32 = 25.4;
const MAX_NAME_ATTEMPTS: usize = 8;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self, ReportError> {
        let font = |f: BuiltinFont| doc.add_builtin_font(f).map_err(render_error);
        Ok(Self {
            regular: font(BuiltinFont::Helvetica)?,
            bold: font(BuiltinFont::HelveticaBold)?,
            mono: font(BuiltinFont::Courier)?,
        })
    }

    fn for_style(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Mono => &self.mono,
        }
    }
}

fn render_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Render(e.to_string())
}

/// A decoded PNG with its placed height
struct Figure {
    image: Image,
    dpi: f32,
    height: f32,
}

impl Figure {
    fn load(path: &Path) -> Result<Self, ReportError> {
        let file = BufReader::new(File::open(path)?);
        let decoder = PngDecoder::new(file).map_err(render_error)?;
        let (width_px, height_px) = decoder.dimensions();
        let dpi = (width_px as f32 * MM_PER_INCH / FIGURE_WIDTH)
            .max(height_px as f32 * MM_PER_INCH / FIGURE_HEIGHT)
            .max(1.0);
        let image = Image::try_from(decoder).map_err(render_error)?;
        Ok(Self {
            image,
            dpi,
            height: height_px as f32 * MM_PER_INCH / dpi,
        })
    }

    /// Load a figure, or log and fall back to the caption alone
    fn try_load(target: &str) -> Option<Self> {
        match Self::load(Path::new(target)) {
            Ok(figure) => Some(figure),
            Err(e) => {
                log::warn!("Figure {} not embedded: {}", target, e);
                None
            }
        }
    }
}

fn random_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// A4 PDF renderer using the builtin Helvetica and Courier faces
pub struct PdfRenderer {
    output_dir: PathBuf,
}

impl PdfRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create a new `final_report_<id>.pdf`, never reusing an existing file
    fn create_output<F>(&self, mut next_id: F) -> Result<(PathBuf, File), ReportError>
    where
        F: FnMut() -> String,
    {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self
                .output_dir
                .join(format!("final_report_{}.pdf", next_id()));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!("{} exists, picking another name", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReportError::Render(format!(
            "no unused report name in {} after {} attempts",
            self.output_dir.display(),
            MAX_NAME_ATTEMPTS
        )))
    }
}

impl Renderer for PdfRenderer {
    fn render(&self, markdown: &str) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let (doc, first_page, first_layer) = PdfDocument::new(
            "Property Submarket Analysis Report",
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            LAYER,
        );
        let fonts = Fonts::load(&doc)?;

        let mut layer = doc.get_page(first_page).get_layer(first_layer);
        let mut y = PAGE_HEIGHT - MARGIN;
        let mut pages = 1;

        for line in layout(markdown, PAGE_WIDTH - 2.0 * MARGIN) {
            let figure = line.image.as_deref().and_then(Figure::try_load);
            let figure_height = figure.as_ref().map_or(0.0, |f| f.height + FIGURE_GAP);
            let advance = line.space_before + figure_height + line.height();
            if y - advance < MARGIN {
                let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
                layer = doc.get_page(page).get_layer(page_layer);
                y = PAGE_HEIGHT - MARGIN;
                pages += 1;
            } else {
                y -= line.space_before;
            }
            if let Some(figure) = figure {
                y -= figure.height;
                figure.image.add_to_layer(
                    layer.clone(),
                    ImageTransform {
                        translate_x: Some(Mm(MARGIN)),
                        translate_y: Some(Mm(y)),
                        dpi: Some(figure.dpi),
                        ..Default::default()
                    },
                );
                y -= FIGURE_GAP;
            }
            y -= line.height();
            layer.use_text(
                line.text,
                line.size,
                Mm(MARGIN + line.indent),
                Mm(y),
                fonts.for_style(line.style),
            );
        }

        let (path, file) = self.create_output(random_id)?;
        let mut writer = BufWriter::new(file);
        doc.save(&mut writer).map_err(render_error)?;

        log::info!("Rendered {} ({} pages)", path.display(), pages);
        Ok(path)
    }
}
