//! Builtin document engine: parse, lay out, paint, rasterize.

pub mod layout;
pub mod paint;
pub mod raster;
pub mod style;

use crate::{Result, Viewport};
use image::RgbaImage;
use scraper::Html;

/// Render a planning document to an RGBA frame of exactly `viewport` size.
pub fn render_document(html: &str, viewport: Viewport) -> Result<RgbaImage> {
    let document = Html::parse_document(html);
    let doc_style = style::DocumentStyle::from_document(&document);
    let nodes = layout::layout_document(&document, viewport);
    let cmds = paint::build_display_list(&nodes, &doc_style, viewport);
    raster::rasterize(viewport, &cmds, &doc_style.font_family)
}
