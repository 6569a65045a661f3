use std::borrow::Cow;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HorizontalAlignment {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerticalAlignment {
    Top,
    Center,
    #[default]
    Bottom,
    Justify,
    Distributed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Alignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    pub indent: u8,
}

/// Opaque 0xRRGGBB color. Indexed and theme colors (tint included) are
/// resolved at import time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgb(pub u32);

impl Rgb {
    /// Parse an `AARRGGBB` or `RRGGBB` hex string (alpha is dropped).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let rgb = match hex.len() {
            8 => &hex[2..],
            6 => hex,
            _ => return None,
        };
        u32::from_str_radix(rgb, 16).ok().map(Rgb)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Font {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: Option<Rgb>,
}

/// Cell fill. Only solid fills carry a color; other patterns are kept as solid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fill {
    pub color: Rgb,
}

impl Fill {
    pub fn solid(color: Rgb) -> Self {
        Self { color }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum BorderLine {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderLine {
    pub fn from_xlsx(s: &str) -> Self {
        match s {
            "thin" => BorderLine::Thin,
            "medium" => BorderLine::Medium,
            "thick" => BorderLine::Thick,
            "dashed" => BorderLine::Dashed,
            "dotted" => BorderLine::Dotted,
            "double" => BorderLine::Double,
            "hair" => BorderLine::Hair,
            "mediumDashed" => BorderLine::MediumDashed,
            "dashDot" => BorderLine::DashDot,
            "mediumDashDot" => BorderLine::MediumDashDot,
            "dashDotDot" => BorderLine::DashDotDot,
            "mediumDashDotDot" => BorderLine::MediumDashDotDot,
            "slantDashDot" => BorderLine::SlantDashDot,
            _ => BorderLine::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BorderEdge {
    pub line: BorderLine,
    pub color: Option<Rgb>,
}

impl BorderEdge {
    pub fn is_set(&self) -> bool {
        self.line != BorderLine::None
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Border {
    pub left: BorderEdge,
    pub right: BorderEdge,
    pub top: BorderEdge,
    pub bottom: BorderEdge,
}

/// Number format: Excel built-in index (0..=163) or a custom format code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumberFormat {
    Builtin(u8),
    Custom(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        // Excel's default: locked, not hidden
        Self { locked: true, hidden: false }
    }
}

/// The formatting attributes that travel with a cell when it is copied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellStyle {
    pub font: Option<Font>,
    pub border: Option<Border>,
    pub fill: Option<Fill>,
    pub number_format: Option<NumberFormat>,
    pub protection: Option<Protection>,
    pub alignment: Option<Alignment>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel date serial (1900 date system); fractional part is the time of day.
    Date(f64),
    /// Formula with the result cached by the last application that saved the file.
    /// Formulas are never evaluated here.
    Formula { source: String, cached: Box<CellValue> },
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// The value a reader sees: formulas resolve to their cached result.
    pub fn resolved(&self) -> &CellValue {
        match self {
            CellValue::Formula { cached, .. } => cached.resolved(),
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.resolved() {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Display text of the resolved value, untrimmed. Integral numbers render
    /// without a fractional part so numeric codes read back as typed.
    pub fn display(&self) -> Cow<'_, str> {
        match self.resolved() {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
            CellValue::Number(n) => Cow::Owned(format_number(*n)),
            CellValue::Bool(b) => Cow::Borrowed(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(serial) => Cow::Owned(format_date(*serial)),
            CellValue::Formula { .. } => Cow::Borrowed(""),
        }
    }

    /// Trimmed display text; the form every key and token comparison uses.
    pub fn trimmed(&self) -> String {
        self.display().trim().to_string()
    }

    /// Whether the trimmed text is non-empty.
    pub fn has_text(&self) -> bool {
        !self.display().trim().is_empty()
    }

    /// Lenient numeric view: numbers, booleans, and numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self.resolved() {
            CellValue::Number(n) | CellValue::Date(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// ISO text of a date serial: `2024-12-05`, or `2024-12-05 13:30:00` with a time.
fn format_date(serial: f64) -> String {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).map(|d| d.and_time(NaiveTime::MIN));
    let seconds = (serial * 86_400.0).round() as i64;
    let moment = epoch.zip(Duration::try_seconds(seconds)).and_then(|(e, d)| e.checked_add_signed(d));
    match moment {
        Some(dt) if seconds % 86_400 == 0 => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format_number(serial),
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: Option<CellStyle>,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self { value: value.into(), style: None }
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = if style.is_default() { None } else { Some(style) };
        self
    }

    pub fn has_style(&self) -> bool {
        self.style.is_some()
    }
}
