//! Box layout for planning documents.
//!
//! The builtin engine understands the structure the markup generator emits:
//! a header (`h1`, `.subtitle`), a row of `section.day` cards and an optional
//! footer `.channel`. Geometry is designed on a 1920x1080 canvas and scaled to
//! the viewport.

use crate::Viewport;
use scraper::{ElementRef, Html, Selector};

const DESIGN_WIDTH: f32 = 1920.0;
const DESIGN_HEIGHT: f32 = 1080.0;
// Average advance of a glyph relative to the font size, used for fitting.
const GLYPH_ADVANCE: f32 = 0.58;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Title,
    Subtitle,
    /// Card background of a day
    DayCard { off: bool },
    DayName,
    Time,
    Label { off: bool },
    Channel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub text: String,
    pub elem_type: ElementType,
    pub font_size: f32,
    pub bold: bool,
    /// Uniform canvas scale, used by the painter for borders and radii
    pub scale: f32,
}

impl LayoutNode {
    /// Baseline for text vertically centered in the node rect
    pub fn baseline(&self) -> f32 {
        self.rect.y + self.rect.height / 2.0 + self.font_size * 0.35
    }
}

struct Day {
    name: String,
    time: String,
    label: String,
    off: bool,
}

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(scope: ElementRef<'_>, sel: &str) -> String {
    scope.select(&selector(sel)).next().map(text_of).unwrap_or_default()
}

fn doc_text(document: &Html, sel: &str) -> String {
    document.select(&selector(sel)).next().map(text_of).unwrap_or_default()
}

/// Shrink `size` until `text` fits in `width`.
fn fit_font(text: &str, size: f32, width: f32, min: f32) -> f32 {
    let chars = text.chars().count().max(1) as f32;
    let needed = chars * size * GLYPH_ADVANCE;
    if needed <= width {
        size
    } else {
        (width / (chars * GLYPH_ADVANCE)).max(min)
    }
}

/// Lay out a planning document on the viewport.
pub fn layout_document(document: &Html, viewport: Viewport) -> Vec<LayoutNode> {
    let w = viewport.width as f32;
    let h = viewport.height as f32;
    let s = (w / DESIGN_WIDTH).min(h / DESIGN_HEIGHT);
    let pad_x = 96.0 * s;
    let content_w = (w - 2.0 * pad_x).max(1.0);
    let mut nodes = Vec::new();

    let push_text = |nodes: &mut Vec<LayoutNode>, rect: Rect, text: String, ty: ElementType, size: f32, bold: bool| {
        if !text.is_empty() {
            nodes.push(LayoutNode { rect, text, elem_type: ty, font_size: size, bold, scale: s });
        }
    };

    // Header: prefer <h1>, then <title>
    let mut title = doc_text(document, "header h1");
    if title.is_empty() {
        title = doc_text(document, "h1");
    }
    if title.is_empty() {
        title = doc_text(document, "title");
    }
    let subtitle = doc_text(document, ".subtitle");

    let mut y = 64.0 * s;
    if !title.is_empty() {
        let size = fit_font(&title, 96.0 * s, content_w, 12.0 * s);
        let line_h = size * 1.2;
        let rect = Rect { x: pad_x, y, width: content_w, height: line_h };
        push_text(&mut nodes, rect, title.to_uppercase(), ElementType::Title, size, true);
        y += line_h;
    }
    if !subtitle.is_empty() {
        y += 8.0 * s;
        let size = fit_font(&subtitle, 40.0 * s, content_w, 10.0 * s);
        let line_h = size * 1.2;
        let rect = Rect { x: pad_x, y, width: content_w, height: line_h };
        push_text(&mut nodes, rect, subtitle, ElementType::Subtitle, size, false);
        y += line_h;
    }
    y += 32.0 * s;

    // Footer reserves space at the bottom
    let channel = doc_text(document, "footer .channel");
    let mut bottom = h;
    if !channel.is_empty() {
        let size = fit_font(&channel, 40.0 * s, content_w, 10.0 * s);
        let line_h = size * 1.2;
        let footer_y = h - 48.0 * s - line_h;
        let rect = Rect { x: pad_x, y: footer_y, width: content_w, height: line_h };
        push_text(&mut nodes, rect, channel, ElementType::Channel, size, true);
        bottom = footer_y - 24.0 * s;
    } else {
        bottom -= 32.0 * s;
    }

    // Day cards
    let days: Vec<Day> = document
        .select(&selector("section.day"))
        .map(|el| Day {
            name: first_text(el, "h2"),
            time: first_text(el, ".time"),
            label: first_text(el, ".label"),
            off: el.value().classes().any(|c| c == "day-off"),
        })
        .collect();

    if days.is_empty() {
        return nodes;
    }

    let top = y + 32.0 * s;
    let card_h = (bottom - 32.0 * s - top).max(1.0);
    let gap = 24.0 * s;
    let n = days.len() as f32;
    let card_w = ((content_w - gap * (n - 1.0)) / n).max(1.0);
    let inner_w = (card_w - 24.0 * s).max(1.0);

    for (i, day) in days.into_iter().enumerate() {
        let x = pad_x + i as f32 * (card_w + gap);
        nodes.push(LayoutNode {
            rect: Rect { x, y: top, width: card_w, height: card_h },
            text: String::new(),
            elem_type: ElementType::DayCard { off: day.off },
            font_size: 0.0,
            bold: false,
            scale: s,
        });

        let name_size = fit_font(&day.name, 44.0 * s, inner_w, 10.0 * s);
        let time_size = fit_font(&day.time, 56.0 * s, inner_w, 10.0 * s);
        let label_size = fit_font(&day.label, 30.0 * s, inner_w, 8.0 * s);

        let mut stack: Vec<(String, ElementType, f32, f32, bool)> = Vec::new();
        stack.push((day.name.to_uppercase(), ElementType::DayName, name_size, 0.0, true));
        if !day.time.is_empty() {
            stack.push((day.time, ElementType::Time, time_size, 24.0 * s, true));
        }
        if !day.label.is_empty() {
            stack.push((day.label, ElementType::Label { off: day.off }, label_size, 16.0 * s, false));
        }

        // Center the stack vertically, below the accent border
        let total: f32 = stack.iter().map(|(_, _, size, margin, _)| size * 1.2 + margin).sum();
        let border = 12.0 * s;
        let mut cy = top + border + ((card_h - border - total) / 2.0).max(0.0);
        for (text, ty, size, margin, bold) in stack {
            cy += margin;
            let line_h = size * 1.2;
            let rect = Rect { x, y: cy, width: card_w, height: line_h };
            push_text(&mut nodes, rect, text, ty, size, bold);
            cy += line_h;
        }
    }

    nodes
}
