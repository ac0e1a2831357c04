//! Planning markup generation.
//!
//! Turns a [`PlanningConfig`] and a resolved [`StyleSnapshot`] into a
//! self-contained HTML document. Generation is pure: the same inputs always
//! produce the same bytes, and nothing here touches the filesystem.

use crate::planning::PlanningConfig;
use crate::settings::{ConfigStore, StyleSnapshot};
use crate::{Error, Result};
use askama::Template;
use sha2::{Digest, Sha256};

const DEFAULT_TITLE: &str = "Stream schedule";
const DEFAULT_OFF_LABEL: &str = "Off";
const FALLBACK_FONTS: &str = "'Segoe UI', 'Helvetica Neue', Arial, sans-serif";

/// CSS custom property values, already validated for direct inclusion in a
/// `<style>` block.
struct CssVars {
    titles: String,
    day_on: String,
    day_off: String,
    accent: String,
    font: String,
    background: String,
}

struct DayView<'a> {
    day: &'a str,
    time: &'a str,
    label: &'a str,
    off: bool,
}

#[derive(Template)]
#[template(path = "planning.html")]
struct PlanningTemplate<'a> {
    title: &'a str,
    subtitle: Option<&'a str>,
    platform: &'a str,
    vars: CssVars,
    days: Vec<DayView<'a>>,
    channel: Option<String>,
}

/// Generate markup, resolving style preferences from `store`.
pub fn generate(config: &PlanningConfig, store: &dyn ConfigStore) -> Result<String> {
    let style = StyleSnapshot::resolve(store)?;
    generate_with_style(config, &style)
}

/// Generate markup from an already resolved style snapshot.
pub fn generate_with_style(config: &PlanningConfig, style: &StyleSnapshot) -> Result<String> {
    config.validate()?;
    render(config, style)
}

// Caller has already validated `config`.
pub(crate) fn render(config: &PlanningConfig, style: &StyleSnapshot) -> Result<String> {
    let days = config
        .entries
        .iter()
        .map(|e| DayView {
            day: e.day.trim(),
            time: if e.off {
                ""
            } else {
                e.time.as_deref().map(str::trim).unwrap_or_default()
            },
            label: match e.label.as_deref().map(str::trim) {
                Some(l) if !l.is_empty() => l,
                _ if e.off => DEFAULT_OFF_LABEL,
                _ => "",
            },
            off: e.off,
        })
        .collect();

    let template = PlanningTemplate {
        title: config
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE),
        subtitle: config
            .subtitle
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty()),
        platform: style.platform.as_str(),
        vars: css_vars(style)?,
        days,
        channel: style.channel_line(),
    };

    template
        .render()
        .map_err(|e| Error::Other(format!("Markup template failed: {}", e)))
}

/// Hex SHA-256 of a markup document, used to correlate job logs.
pub fn fingerprint(markup: &str) -> String {
    hex::encode(Sha256::digest(markup.as_bytes()))
}

fn css_vars(style: &StyleSnapshot) -> Result<CssVars> {
    let font = if style.font_name.is_empty() {
        FALLBACK_FONTS.to_string()
    } else {
        format!("'{}', {}", css_font_name(&style.font_name), FALLBACK_FONTS)
    };

    let background = match &style.background_image {
        None => "none".to_string(),
        Some(path) => {
            let url = url::Url::from_file_path(path).map_err(|_| {
                Error::ConfigurationError(format!(
                    "backgroundImagePath must be absolute: {}",
                    path.display()
                ))
            })?;
            format!("url('{}')", css_url(url.as_str()))
        }
    };

    Ok(CssVars {
        titles: style.titles_color.clone(),
        day_on: style.day_on_color.clone(),
        day_off: style.day_off_color.clone(),
        accent: style.accent_color.clone(),
        font,
        background,
    })
}

// Font names are user input embedded in a quoted CSS string.
fn css_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect()
}

fn css_url(url: &str) -> String {
    url.replace('\'', "%27")
        .replace(';', "%3B")
        .replace('(', "%28")
        .replace(')', "%29")
        .replace('\\', "%5C")
}
