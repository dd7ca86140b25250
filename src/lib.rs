//! Memory-conscious SVG rendering for embedded and low-RAM targets.
//!
//! The crate parses a restricted SVG subset into a compact document
//! model, evaluates SMIL-style `<animate>`/`<animateTransform>`
//! timelines, normalizes everything through the viewBox, and rasterizes
//! tile by tile into caller-owned BGRA8888 or RGB565 buffers so a
//! full-frame intermediate is never required.
//!
//! The [`Svg`] façade ties the pieces together:
//!
//! ```
//! use microsvg::{Svg, SvgOptions};
//!
//! let mut svg = Svg::new(
//!     "<svg width=\"32\" height=\"32\"><circle cx=\"16\" cy=\"16\" r=\"12\" fill=\"red\"/></svg>",
//!     SvgOptions::default(),
//! );
//! svg.load().unwrap();
//! let (w, h) = (svg.width() as u32, svg.height() as u32);
//! let mut frame = vec![0u8; (w * h * 4) as usize];
//! svg.rasterize(&mut frame, 0.0, 0.0, w, h, (w * 4) as usize, 1.0).unwrap();
//! ```
//!
//! The lower layers are public as well: [`Document`] for parsing and
//! animation without any output driver, and [`Renderer`] /
//! [`ScanlineRasterizer`] for custom buffer management.

mod anim;
mod color;
mod debug;
mod error;
mod gradient;
mod model;
mod parser;
mod raster;
mod scan;
mod scanline;
mod viewbox;
mod xform;
mod xml;

pub use color::Color;
pub use error::SvgError;
pub use model::{
    Align, AlignType, Coordinate, Document, FillRule, Gradient, GradientStop, LineCap, LineJoin,
    Paint, Path, Shape, ShapeNode, SpreadMode, Units,
};
pub use raster::{PixelFormat, RenderOptions, Renderer};
pub use scanline::{ScanlineRasterizer, SharedRasterizer};
pub use xform::{Bounds, Point, Transform};

use std::path::PathBuf;

use crate::debug::DebugLogger;

/// Default tile height used when the caller never configures a buffer.
const DEFAULT_TILE_ROWS: u32 = 64;

/// Configuration for the [`Svg`] façade.
#[derive(Clone, Debug)]
pub struct SvgOptions {
    /// Unit the caller's lengths are expressed in ("px", "mm", ...).
    pub units: String,
    pub dpi: f32,
    pub format: PixelFormat,
    pub antialias: bool,
    pub swap_bytes: bool,
    pub large_buffer: bool,
    /// When set, a JSON-lines debug log is written to this path.
    pub debug_log_path: Option<PathBuf>,
}

impl Default for SvgOptions {
    fn default() -> Self {
        SvgOptions {
            units: "px".to_string(),
            dpi: 96.0,
            format: PixelFormat::Bgra8888,
            antialias: true,
            swap_bytes: false,
            large_buffer: false,
            debug_log_path: None,
        }
    }
}

impl SvgOptions {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format,
            antialias: self.antialias,
            swap_bytes: self.swap_bytes,
            large_buffer: self.large_buffer,
        }
    }
}

/// Owning façade over the parser, animator, and output driver. Holds
/// the source so the document can be unloaded to reclaim memory and
/// reloaded later.
pub struct Svg {
    source: String,
    options: SvgOptions,
    buf_width: u32,
    buf_height: u32,
    rasterizer: SharedRasterizer,
    document: Option<Document>,
    renderer: Option<Renderer>,
    logger: Option<DebugLogger>,
}

impl Svg {
    pub fn new(source: impl Into<String>, options: SvgOptions) -> Svg {
        Svg::with_rasterizer(source, options, ScanlineRasterizer::new_shared())
    }

    /// Builds a façade around an existing rasterizer handle, so several
    /// documents can share one set of compiled-shape buffers. Each
    /// render recompiles the drawn document into the handle, so sharing
    /// trades memory for per-frame compile work.
    pub fn with_rasterizer(
        source: impl Into<String>,
        options: SvgOptions,
        rasterizer: SharedRasterizer,
    ) -> Svg {
        let logger = options
            .debug_log_path
            .as_ref()
            .and_then(|path| DebugLogger::new(path).ok());
        Svg {
            source: source.into(),
            options,
            buf_width: 0,
            buf_height: 0,
            rasterizer,
            document: None,
            renderer: None,
            logger,
        }
    }

    pub fn from_file(
        path: impl AsRef<std::path::Path>,
        options: SvgOptions,
    ) -> Result<Svg, SvgError> {
        let source = std::fs::read_to_string(path)?;
        Ok(Svg::new(source, options))
    }

    /// Parses the held source and sets up the output driver. Loading an
    /// already loaded document re-parses from scratch.
    pub fn load(&mut self) -> Result<(), SvgError> {
        let started = std::time::Instant::now();
        let document = Document::parse(&self.source, &self.options.units, self.options.dpi);
        let mut renderer = Renderer::new(self.rasterizer.clone(), self.options.render_options());
        if self.buf_width == 0 || self.buf_height == 0 {
            // one tile spans the full width by a fixed band of rows
            self.buf_width = (document.width().ceil() as u32).max(1);
            self.buf_height = DEFAULT_TILE_ROWS;
        }
        renderer.set_buffer(self.buf_width, self.buf_height);
        if let Some(logger) = &self.logger {
            logger.event(
                "svg.load",
                &[
                    ("width", format!("{:.2}", document.width())),
                    ("height", format!("{:.2}", document.height())),
                    ("shapes", document.shapes().count().to_string()),
                    ("animated", document.is_animated().to_string()),
                    ("bytes", document.memory_size().to_string()),
                    ("micros", started.elapsed().as_micros().to_string()),
                ],
            );
        }
        self.document = Some(document);
        self.renderer = Some(renderer);
        Ok(())
    }

    /// Drops the parsed document and driver state, keeping the source.
    pub fn unload(&mut self) {
        self.document = None;
        self.renderer = None;
        self.rasterizer.borrow_mut().clear();
        if let Some(logger) = &self.logger {
            logger.emit_summary("unload");
            logger.flush();
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Document width in the configured units; 0 before `load`.
    pub fn width(&self) -> f32 {
        self.document.as_ref().map_or(0.0, |d| d.width())
    }

    pub fn height(&self) -> f32 {
        self.document.as_ref().map_or(0.0, |d| d.height())
    }

    pub fn is_animated(&self) -> bool {
        self.document.as_ref().is_some_and(|d| d.is_animated())
    }

    /// Advances animations to `time_ms`. Returns true when the document
    /// carries animations and a redraw may be needed.
    pub fn update(&mut self, time_ms: i64) -> Result<bool, SvgError> {
        let Some(document) = self.document.as_mut() else {
            return Err(SvgError::NotLoaded);
        };
        let animated = document.update(time_ms);
        if let Some(logger) = &self.logger {
            logger.increment("update.calls", 1);
        }
        Ok(animated)
    }

    /// Sizes the intermediate tile buffer. Takes effect immediately
    /// when loaded, otherwise at the next `load`.
    pub fn set_buffer(&mut self, width: u32, height: u32) {
        self.buf_width = width;
        self.buf_height = height;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_buffer(width, height);
        }
    }

    /// Renders the loaded document into `dst`; see [`Renderer::render`]
    /// for the parameter semantics.
    #[allow(clippy::too_many_arguments)]
    pub fn rasterize(
        &mut self,
        dst: &mut [u8],
        tx: f32,
        ty: f32,
        width: u32,
        height: u32,
        stride: usize,
        scale: f32,
    ) -> Result<(), SvgError> {
        let (Some(document), Some(renderer)) = (self.document.as_ref(), self.renderer.as_mut())
        else {
            return Err(SvgError::NotLoaded);
        };
        let started = std::time::Instant::now();
        renderer.render(document, dst, tx, ty, width, height, stride, scale)?;
        if let Some(logger) = &self.logger {
            logger.increment("rasterize.calls", 1);
            logger.increment("rasterize.pixels", width as u64 * height as u64);
            logger.increment("rasterize.micros", started.elapsed().as_micros() as u64);
        }
        Ok(())
    }

    /// Bytes attributed to the parsed document model.
    pub fn image_memory(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.memory_size())
    }

    /// Bytes held by the rasterizer: compiled shapes plus the tile
    /// buffer.
    pub fn rasterizer_memory(&self) -> usize {
        let compiled = self.rasterizer.borrow().memory_size();
        compiled + self.renderer.as_ref().map_or(0, |r| r.buffer_size())
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }
}
