//! Document style extraction for the builtin engine.
//!
//! Planning documents publish their palette as custom properties on `:root`;
//! the builtin engine does not run a cascade, it only reads those.

use scraper::{Html, Selector};
use std::collections::HashMap;
use std::path::PathBuf;

pub type Rgb = (u8, u8, u8);

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStyle {
    pub titles: Rgb,
    pub day_on: Rgb,
    pub day_off: Rgb,
    pub accent: Rgb,
    /// CSS font-family list
    pub font_family: String,
    pub background_image: Option<PathBuf>,
}

impl Default for DocumentStyle {
    fn default() -> Self {
        Self {
            titles: (255, 255, 255),
            day_on: (255, 255, 255),
            day_off: (255, 0, 0),
            accent: (145, 70, 255),
            font_family: "sans-serif".to_string(),
            background_image: None,
        }
    }
}

impl DocumentStyle {
    pub fn from_document(document: &Html) -> Self {
        let mut style = DocumentStyle::default();
        let Ok(sel) = Selector::parse("style") else {
            return style;
        };
        let css: String = document
            .select(&sel)
            .map(|n| n.text().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");
        let vars = root_custom_properties(&css);

        let color = |name: &str, fallback: Rgb| vars.get(name).and_then(|v| parse_hex(v)).unwrap_or(fallback);
        style.titles = color("--planning-titles", style.titles);
        style.day_on = color("--planning-day-on", style.day_on);
        style.day_off = color("--planning-day-off", style.day_off);
        style.accent = color("--planning-accent", style.accent);
        if let Some(font) = vars.get("--planning-font").filter(|f| !f.is_empty()) {
            style.font_family = font.clone();
        }
        style.background_image = vars
            .get("--planning-background")
            .and_then(|v| parse_file_url(v));
        style
    }
}

/// Custom properties declared in the first `:root { ... }` rule.
fn root_custom_properties(css: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let Some(start) = css.find(":root") else {
        return vars;
    };
    let rest = &css[start..];
    let Some(open) = rest.find('{') else {
        return vars;
    };
    for decl in declarations(&rest[open + 1..]) {
        if let Some((name, value)) = decl.split_once(':') {
            let name = name.trim();
            if name.starts_with("--") {
                vars.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
    vars
}

// Declarations of a block body up to its closing brace. `;` and `}` inside
// quotes or parentheses (`url('...')`) do not end a declaration.
fn declarations(body: &str) -> Vec<&str> {
    let mut decls = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut from = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                decls.push(&body[from..i]);
                from = i + 1;
            }
            (None, '}') if depth == 0 => {
                decls.push(&body[from..i]);
                return decls;
            }
            _ => {}
        }
    }
    decls.push(&body[from..]);
    decls
}

fn parse_hex(value: &str) -> Option<Rgb> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

// `url('file:///...')` -> local path
fn parse_file_url(value: &str) -> Option<PathBuf> {
    let inner = value.trim().strip_prefix("url(")?.strip_suffix(')')?;
    let inner = inner.trim().trim_matches(|c| c == '\'' || c == '"');
    url::Url::parse(inner).ok()?.to_file_path().ok()
}
