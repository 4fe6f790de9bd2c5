//! PDF render options negotiated from page content.
//!
//! Pages steer their own paper geometry through CSS custom properties such as
//! `--relaxed-page-width: 5in;`. The directives are read from the serialized
//! document, so they work whether they sit in a `<style>` block or inline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::error::OptionError;

/// Header/footer markup used when the page does not provide one.
pub const DEFAULT_HEADER_FOOTER: &str = "<span></span>";

const CSS_PX_PER_INCH: f64 = 96.0;

static WIDTH_DIRECTIVE: Lazy<Regex> = Lazy::new(|| directive_pattern("width"));
static HEIGHT_DIRECTIVE: Lazy<Regex> = Lazy::new(|| directive_pattern("height"));
static SIZE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| directive_pattern("size"));

fn directive_pattern(dimension: &str) -> Regex {
    Regex::new(&format!(r"-relaxed-page-{dimension}:\s*([^\s;]+);"))
        .expect("directive pattern is a valid regex")
}

/// Options handed to the browser's PDF call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOptions {
    pub header_template: String,
    pub footer_template: String,
    pub print_background: bool,
    pub display_header_footer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::with_header_footer(None, None)
    }
}

impl RenderOptions {
    /// Build options from the markup found in the header and footer elements.
    /// Missing or empty markup falls back to [`DEFAULT_HEADER_FOOTER`] and does
    /// not switch on header/footer display.
    pub fn with_header_footer(header: Option<String>, footer: Option<String>) -> Self {
        let header = header.filter(|markup| !markup.trim().is_empty());
        let footer = footer.filter(|markup| !markup.trim().is_empty());
        let display_header_footer = header.is_some() || footer.is_some();

        Self {
            header_template: header.unwrap_or_else(|| DEFAULT_HEADER_FOOTER.to_string()),
            footer_template: footer.unwrap_or_else(|| DEFAULT_HEADER_FOOTER.to_string()),
            print_background: true,
            display_header_footer,
            width: None,
            height: None,
            page_size: None,
        }
    }

    /// Copy matched page directives; unmatched ones stay unset.
    pub fn apply_directives(&mut self, directives: PageDirectives) {
        if directives.width.is_some() {
            self.width = directives.width;
        }
        if directives.height.is_some() {
            self.height = directives.height;
        }
        if directives.size.is_some() {
            self.page_size = directives.size;
        }
    }

    /// Resolve the paper geometry in inches. A named `page_size` provides the
    /// base dimensions; explicit `width`/`height` override them individually.
    pub fn paper_inches(&self) -> Result<PaperInches, OptionError> {
        let mut paper = match self.page_size.as_deref() {
            Some(name) => {
                let (width, height) = paper_format(name)
                    .ok_or_else(|| OptionError::UnknownFormat(name.to_string()))?;
                PaperInches {
                    width: Some(width),
                    height: Some(height),
                }
            }
            None => PaperInches::default(),
        };

        if let Some(width) = self.width.as_deref() {
            paper.width = Some(length_to_inches("width", width)?);
        }
        if let Some(height) = self.height.as_deref() {
            paper.height = Some(length_to_inches("height", height)?);
        }

        Ok(paper)
    }
}

/// Paper dimensions in inches; `None` leaves the browser default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PaperInches {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Page geometry directives found in serialized page HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDirectives {
    pub width: Option<String>,
    pub height: Option<String>,
    pub size: Option<String>,
}

impl PageDirectives {
    /// Scan with three independent matches; the first occurrence of each wins.
    pub fn scan(html: &str) -> Self {
        Self {
            width: first_capture(&WIDTH_DIRECTIVE, html),
            height: first_capture(&HEIGHT_DIRECTIVE, html),
            size: first_capture(&SIZE_DIRECTIVE, html),
        }
    }
}

fn first_capture(pattern: &Regex, html: &str) -> Option<String> {
    pattern
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

fn paper_format(name: &str) -> Option<(f64, f64)> {
    let dimensions = match name.to_ascii_lowercase().as_str() {
        "letter" => (8.5, 11.0),
        "legal" => (8.5, 14.0),
        "tabloid" => (11.0, 17.0),
        "ledger" => (17.0, 11.0),
        "a0" => (33.1, 46.8),
        "a1" => (23.4, 33.1),
        "a2" => (16.54, 23.4),
        "a3" => (11.7, 16.54),
        "a4" => (8.27, 11.7),
        "a5" => (5.83, 8.27),
        "a6" => (4.13, 5.83),
        _ => return None,
    };
    Some(dimensions)
}

/// Convert a CSS length (`px`, `in`, `cm`, `mm`; unitless means pixels) to inches.
fn length_to_inches(name: &'static str, value: &str) -> Result<f64, OptionError> {
    let trimmed = value.trim();
    // The unit is the trailing alphabetic suffix, so exponents like `1e2px` stay in the number.
    let number = trimmed.trim_end_matches(|ch: char| ch.is_ascii_alphabetic());
    let unit = &trimmed[number.len()..];

    let px_per_unit = match unit.to_ascii_lowercase().as_str() {
        "" | "px" => 1.0,
        "in" => CSS_PX_PER_INCH,
        "cm" => 37.8,
        "mm" => 3.78,
        _ => {
            return Err(OptionError::UnknownUnit {
                name,
                value: value.to_string(),
            });
        }
    };

    let magnitude: f64 = number.parse().map_err(|_| OptionError::NotANumber {
        name,
        value: value.to_string(),
    })?;

    Ok(magnitude * px_per_unit / CSS_PX_PER_INCH)
}
