//! Display list for the builtin engine

use crate::rendering::layout::{ElementType, LayoutNode};
use crate::rendering::style::{DocumentStyle, Rgb};
use crate::Viewport;
use std::path::PathBuf;

pub const CANVAS_COLOR: Rgb = (16, 16, 20);
const CARD_ALPHA: u8 = 140;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
        rgba: (u8, u8, u8, u8),
    },
    /// Image scaled to cover the rect
    Image {
        path: PathBuf,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Text horizontally centered on `x`, sitting on `baseline`
    Text {
        x: f32,
        baseline: f32,
        text: String,
        size: f32,
        bold: bool,
        rgb: Rgb,
    },
}

/// Build the paint commands for a laid out document, back to front.
pub fn build_display_list(nodes: &[LayoutNode], style: &DocumentStyle, viewport: Viewport) -> Vec<PaintCommand> {
    let (w, h) = (viewport.width as f32, viewport.height as f32);
    let mut cmds = vec![PaintCommand::SolidRect {
        x: 0.0,
        y: 0.0,
        width: w,
        height: h,
        radius: 0.0,
        rgba: (CANVAS_COLOR.0, CANVAS_COLOR.1, CANVAS_COLOR.2, 255),
    }];

    if let Some(path) = &style.background_image {
        cmds.push(PaintCommand::Image { path: path.clone(), x: 0.0, y: 0.0, width: w, height: h });
    }

    for node in nodes {
        let r = node.rect;
        match node.elem_type {
            ElementType::DayCard { off } => {
                cmds.push(PaintCommand::SolidRect {
                    x: r.x,
                    y: r.y,
                    width: r.width,
                    height: r.height,
                    radius: 16.0 * node.scale,
                    rgba: (0, 0, 0, CARD_ALPHA),
                });
                let (cr, cg, cb) = if off { style.day_off } else { style.accent };
                cmds.push(PaintCommand::SolidRect {
                    x: r.x,
                    y: r.y,
                    width: r.width,
                    height: 12.0 * node.scale,
                    radius: 0.0,
                    rgba: (cr, cg, cb, 255),
                });
            }
            ty => {
                let rgb = match ty {
                    ElementType::Title | ElementType::DayName => style.titles,
                    ElementType::Subtitle | ElementType::Channel => style.accent,
                    ElementType::Time => style.day_on,
                    ElementType::Label { off: true } => style.day_off,
                    _ => style.day_on,
                };
                cmds.push(PaintCommand::Text {
                    x: r.center_x(),
                    baseline: node.baseline(),
                    text: node.text.clone(),
                    size: node.font_size,
                    bold: node.bold,
                    rgb,
                });
            }
        }
    }

    cmds
}
