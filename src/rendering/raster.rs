//! Rasterizer for builtin display lists.
//!
//! Paint commands are serialized into an SVG scene and rendered with resvg,
//! which gives us real font shaping from the system font database.

use crate::rendering::paint::PaintCommand;
use crate::{Error, Result, Viewport};
use base64::Engine as Base64Engine;
use image::RgbaImage;
use log::{debug, warn};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, OnceLock};

static FONT_DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();

/// System font database, loaded once per process.
pub fn font_db() -> Arc<usvg::fontdb::Database> {
    FONT_DB
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            debug!("loaded {} font faces", db.len());
            Arc::new(db)
        })
        .clone()
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn image_data_uri(path: &Path) -> Option<String> {
    let mime = match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => {
            warn!("unsupported background image type: {}", path.display());
            return None;
        }
    };
    match std::fs::read(path) {
        Ok(bytes) => Some(format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )),
        Err(e) => {
            // A missing sub-resource leaves a hole in the page, like a browser would.
            warn!("could not read background image {}: {}", path.display(), e);
            None
        }
    }
}

/// Serialize a display list as an SVG document.
pub fn to_svg(viewport: Viewport, cmds: &[PaintCommand], font_family: &str) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = viewport.width,
        h = viewport.height
    );
    let family = xml_escape(font_family);

    for cmd in cmds {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, radius, rgba } => {
                let _ = write!(
                    svg,
                    r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" rx="{radius}" fill="rgb({},{},{})" fill-opacity="{:.3}"/>"#,
                    rgba.0,
                    rgba.1,
                    rgba.2,
                    rgba.3 as f32 / 255.0
                );
            }
            PaintCommand::Image { path, x, y, width, height } => {
                if let Some(uri) = image_data_uri(path) {
                    let _ = write!(
                        svg,
                        r#"<image x="{x}" y="{y}" width="{width}" height="{height}" preserveAspectRatio="xMidYMid slice" xlink:href="{uri}"/>"#
                    );
                }
            }
            PaintCommand::Text { x, baseline, text, size, bold, rgb } => {
                let _ = write!(
                    svg,
                    r#"<text x="{x}" y="{baseline}" font-family="{family}" font-size="{size}" font-weight="{}" text-anchor="middle" fill="rgb({},{},{})">{}</text>"#,
                    if *bold { 700 } else { 400 },
                    rgb.0,
                    rgb.1,
                    rgb.2,
                    xml_escape(text)
                );
            }
        }
    }
    svg.push_str("</svg>");
    svg
}

/// Paint a display list onto a fresh RGBA frame.
pub fn rasterize(viewport: Viewport, cmds: &[PaintCommand], font_family: &str) -> Result<RgbaImage> {
    let svg = to_svg(viewport, cmds, font_family);
    let opts = usvg::Options {
        fontdb: font_db(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts)
        .map_err(|e| Error::RenderLoadError(format!("Failed to build scene: {}", e)))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(viewport.width, viewport.height).ok_or_else(|| {
        Error::RenderLoadError(format!(
            "Failed to allocate {}x{} surface",
            viewport.width, viewport.height
        ))
    })?;
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut raw = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        raw.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(viewport.width, viewport.height, raw)
        .ok_or_else(|| Error::RenderLoadError("Frame buffer size mismatch".into()))
}
