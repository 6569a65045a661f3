//! XLSX style parser: extracts cell styles from styles.xml (colors resolved
//! against the theme part), and per-cell style IDs, column widths, row
//! heights and merged ranges from worksheet XML within XLSX (ZIP) archives.
//!
//! calamine reads values only; this fills in the formatting half so styles
//! survive a load/save cycle.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use ledgergrid_engine::cell::{
    Alignment, Border, BorderEdge, BorderLine, CellStyle, Fill, Font, HorizontalAlignment,
    NumberFormat, Protection, Rgb, VerticalAlignment,
};

use crate::error::IoError;

// =============================================================================
// Public types
// =============================================================================

/// Parsed style table from styles.xml: cellXfs index → CellStyle.
#[derive(Debug, Default)]
pub struct StyleTable {
    pub styles: Vec<CellStyle>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Per-cell style references and sheet layout of one worksheet.
/// All addresses are 1-based.
#[derive(Debug, Default)]
pub struct SheetFormatting {
    /// (row, col, style_id) triples
    pub cell_styles: Vec<(usize, usize, usize)>,
    /// Column widths in raw Excel character-width units
    pub col_widths: Vec<(usize, f64)>,
    /// Rows marked customHeight, in points
    pub row_heights: Vec<(usize, f64)>,
    /// (first_row, first_col, last_row, last_col)
    pub merged_ranges: Vec<(usize, usize, usize, usize)>,
}

/// Theme color slots in `theme="N"` order: lt1, dk1, lt2, dk2, accent1-6,
/// hlink, folHlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePalette(pub [u32; 12]);

impl Default for ThemePalette {
    /// The Office 2007 theme, used when a package has no theme part.
    fn default() -> Self {
        Self([
            0xFFFFFF, 0x000000, 0xEEECE1, 0x1F497D, 0x4F81BD, 0xC0504D, 0x9BBB59, 0x8064A2,
            0x4BACC6, 0xF79646, 0x0000FF, 0x800080,
        ])
    }
}

impl ThemePalette {
    pub fn get(&self, idx: usize) -> Option<Rgb> {
        self.0.get(idx).map(|rgb| Rgb(*rgb))
    }
}

// =============================================================================
// Attribute helpers
// =============================================================================

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape_xml(&String::from_utf8_lossy(&a.value)))
}

fn attr_parse<T: std::str::FromStr>(e: &BytesStart, key: &[u8]) -> Option<T> {
    attr(e, key).and_then(|s| s.parse().ok())
}

/// `<b/>` means on; `<b val="0"/>` means off.
fn attr_flag(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr(e, key).map(|v| v == "1" || v == "true")
}

/// Unescape the 5 predefined XML entities: &amp; &lt; &gt; &quot; &apos;
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// =============================================================================
// Colors
// =============================================================================

/// The first 64 entries of Excel's legacy indexed palette.
const INDEXED_PALETTE: [u32; 64] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993333, 0x333399, 0x333333,
];

/// Resolve a `<color>`-like element: rgb, then indexed, then theme, with
/// any `tint` applied on top.
fn parse_color(e: &BytesStart, theme: &ThemePalette) -> Option<Rgb> {
    let base = if let Some(hex) = attr(e, b"rgb") {
        Rgb::from_hex(&hex)
    } else if let Some(idx) = attr_parse::<usize>(e, b"indexed") {
        match idx {
            // system foreground / background
            64 => Some(Rgb(0x000000)),
            65 => Some(Rgb(0xFFFFFF)),
            idx => INDEXED_PALETTE.get(idx).map(|rgb| Rgb(*rgb)),
        }
    } else {
        attr_parse::<usize>(e, b"theme").and_then(|idx| theme.get(idx))
    }?;
    Some(match attr_parse::<f64>(e, b"tint") {
        Some(tint) => apply_tint(base, tint),
        None => base,
    })
}

/// Darken toward black (tint < 0) or lighten toward white (tint > 0).
/// Per-channel; close to Excel's HLS math for the stock theme shades.
fn apply_tint(rgb: Rgb, tint: f64) -> Rgb {
    if tint == 0.0 || !tint.is_finite() {
        return rgb;
    }
    let tint = tint.clamp(-1.0, 1.0);
    let channel = |shift: u32| {
        let c = f64::from((rgb.0 >> shift) & 0xFF);
        let v = if tint < 0.0 { c * (1.0 + tint) } else { c + (255.0 - c) * tint };
        (v.round() as u32).min(255) << shift
    };
    Rgb(channel(16) | channel(8) | channel(0))
}

fn theme_slot(name: &[u8]) -> Option<usize> {
    Some(match name {
        b"lt1" => 0,
        b"dk1" => 1,
        b"lt2" => 2,
        b"dk2" => 3,
        b"accent1" => 4,
        b"accent2" => 5,
        b"accent3" => 6,
        b"accent4" => 7,
        b"accent5" => 8,
        b"accent6" => 9,
        b"hlink" => 10,
        b"folHlink" => 11,
        _ => return None,
    })
}

/// Parse the `<a:clrScheme>` of a theme part. Slots the part leaves out
/// keep their Office defaults.
pub fn parse_theme_xml(xml: &str) -> ThemePalette {
    let mut palette = ThemePalette::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_scheme = false;
    let mut slot: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"clrScheme" => in_scheme = true,
                name @ (b"srgbClr" | b"sysClr") if in_scheme => {
                    // system colors carry their resolved value in lastClr
                    let key: &[u8] = if name == b"srgbClr" { b"val" } else { b"lastClr" };
                    if let (Some(idx), Some(rgb)) = (slot, attr(e, key).as_deref().and_then(Rgb::from_hex)) {
                        palette.0[idx] = rgb.0;
                    }
                }
                name if in_scheme => {
                    if let Some(idx) = theme_slot(name) {
                        slot = Some(idx);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"clrScheme" => break,
                name if theme_slot(name).is_some() => slot = None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    palette
}

// =============================================================================
// styles.xml parser
// =============================================================================

/// Parse styles.xml content into a StyleTable, resolving theme colors
/// against `theme`.
pub fn parse_styles_xml(xml: &str, theme: &ThemePalette) -> StyleTable {
    let num_fmts = parse_num_fmts(xml);
    let fonts = parse_fonts(xml, theme);
    let fills = parse_fills(xml, theme);
    let borders = parse_borders(xml, theme);
    let styles = parse_cell_xfs(xml, &num_fmts, &fonts, &fills, &borders);
    StyleTable { styles }
}

/// Parse <numFmts> section → formatId → formatCode
fn parse_num_fmts(xml: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => in_num_fmts = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => break,
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if in_num_fmts && e.name().as_ref() == b"numFmt" =>
            {
                if let (Some(id), Some(code)) =
                    (attr_parse::<u16>(e, b"numFmtId"), attr(e, b"formatCode"))
                {
                    map.insert(id, code);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    map
}

/// Parse <fonts> section.
fn parse_fonts(xml: &str, theme: &ThemePalette) -> Vec<Font> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fonts>, 2 = inside <font>
    let mut current = Font::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = Font::default();
                }
                b"color" if depth == 2 => current.color = parse_color(e, theme),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => {
                let on = attr_flag(e, b"val").unwrap_or(true);
                match e.name().as_ref() {
                    b"b" => current.bold = on,
                    b"i" => current.italic = on,
                    b"strike" => current.strikethrough = on,
                    b"u" => current.underline = attr(e, b"val").map_or(true, |v| v != "none"),
                    b"sz" => current.size = attr_parse(e, b"val"),
                    b"color" => current.color = parse_color(e, theme),
                    b"name" | b"rFont" => current.name = attr(e, b"val"),
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"font" => {
                fonts.push(Font::default());
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(std::mem::take(&mut current));
                    depth = 1;
                }
                b"fonts" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

/// Parse <fills> section. Entries without a foreground color resolve to None.
fn parse_fills(xml: &str, theme: &ThemePalette) -> Vec<Option<Fill>> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fills>, 2 = inside <fill>
    let mut pattern_none = false;
    let mut color: Option<Rgb> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    pattern_none = false;
                    color = None;
                }
                b"patternFill" if depth == 2 => {
                    pattern_none = attr(e, b"patternType").map_or(true, |p| p == "none");
                }
                b"fgColor" if depth == 2 => color = parse_color(e, theme),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"fill" if depth == 2 => {
                    fills.push(if pattern_none { None } else { color.map(Fill::solid) });
                    depth = 1;
                }
                b"fills" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

/// Parse <borders> section.
fn parse_borders(xml: &str, theme: &ThemePalette) -> Vec<Border> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <borders>, 2 = inside <border>
    let mut current = Border::default();
    let mut side: Option<Vec<u8>> = None;
    let mut edge = BorderEdge::default();

    fn assign(border: &mut Border, side: &[u8], edge: BorderEdge) {
        match side {
            b"left" => border.left = edge,
            b"right" => border.right = edge,
            b"top" => border.top = edge,
            b"bottom" => border.bottom = edge,
            _ => {}
        }
    }

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"borders" if depth == 0 => depth = 1,
                b"border" if depth == 1 => {
                    depth = 2;
                    current = Border::default();
                }
                name @ (b"left" | b"right" | b"top" | b"bottom") if depth == 2 => {
                    side = Some(name.to_vec());
                    edge = BorderEdge {
                        line: attr(e, b"style").map(|s| BorderLine::from_xlsx(&s)).unwrap_or_default(),
                        color: None,
                    };
                }
                b"color" if side.is_some() => edge.color = parse_color(e, theme),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                name @ (b"left" | b"right" | b"top" | b"bottom") if depth == 2 => {
                    let line = attr(e, b"style").map(|s| BorderLine::from_xlsx(&s)).unwrap_or_default();
                    assign(&mut current, name, BorderEdge { line, color: None });
                }
                b"color" if side.is_some() => edge.color = parse_color(e, theme),
                b"border" if depth == 1 => borders.push(Border::default()),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"left" | b"right" | b"top" | b"bottom" if depth == 2 => {
                    if let Some(name) = side.take() {
                        assign(&mut current, &name, edge);
                    }
                    edge = BorderEdge::default();
                }
                b"border" if depth == 2 => {
                    borders.push(current);
                    depth = 1;
                }
                b"borders" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    borders
}

#[derive(Debug, Default)]
struct XfEntry {
    num_fmt_id: Option<u16>,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    alignment: Option<Alignment>,
    protection: Option<Protection>,
}

impl XfEntry {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            num_fmt_id: attr_parse(e, b"numFmtId"),
            font_id: attr_parse(e, b"fontId"),
            fill_id: attr_parse(e, b"fillId"),
            border_id: attr_parse(e, b"borderId"),
            alignment: None,
            protection: None,
        }
    }
}

fn parse_alignment(e: &BytesStart) -> Alignment {
    let horizontal = match attr(e, b"horizontal").as_deref() {
        Some("left") => HorizontalAlignment::Left,
        Some("center") => HorizontalAlignment::Center,
        Some("right") => HorizontalAlignment::Right,
        Some("fill") => HorizontalAlignment::Fill,
        Some("justify") => HorizontalAlignment::Justify,
        Some("centerContinuous") => HorizontalAlignment::CenterContinuous,
        Some("distributed") => HorizontalAlignment::Distributed,
        _ => HorizontalAlignment::General,
    };
    let vertical = match attr(e, b"vertical").as_deref() {
        Some("top") => VerticalAlignment::Top,
        Some("center") => VerticalAlignment::Center,
        Some("justify") => VerticalAlignment::Justify,
        Some("distributed") => VerticalAlignment::Distributed,
        _ => VerticalAlignment::Bottom,
    };
    Alignment {
        horizontal,
        vertical,
        wrap_text: attr_flag(e, b"wrapText").unwrap_or(false),
        shrink_to_fit: attr_flag(e, b"shrinkToFit").unwrap_or(false),
        indent: attr_parse(e, b"indent").unwrap_or(0),
    }
}

fn parse_protection(e: &BytesStart) -> Protection {
    let defaults = Protection::default();
    Protection {
        locked: attr_flag(e, b"locked").unwrap_or(defaults.locked),
        hidden: attr_flag(e, b"hidden").unwrap_or(defaults.hidden),
    }
}

/// Parse <cellXfs> section and resolve each <xf> into a CellStyle.
fn parse_cell_xfs(
    xml: &str,
    num_fmts: &HashMap<u16, String>,
    fonts: &[Font],
    fills: &[Option<Fill>],
    borders: &[Border],
) -> Vec<CellStyle> {
    let mut styles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<XfEntry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => current = Some(XfEntry::from_element(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => {
                    let xf = XfEntry::from_element(e);
                    styles.push(resolve_xf(&xf, num_fmts, fonts, fills, borders));
                }
                b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        xf.alignment = Some(parse_alignment(e));
                    }
                }
                b"protection" => {
                    if let Some(xf) = current.as_mut() {
                        xf.protection = Some(parse_protection(e));
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" => {
                    if let Some(xf) = current.take() {
                        styles.push(resolve_xf(&xf, num_fmts, fonts, fills, borders));
                    }
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

fn resolve_xf(
    xf: &XfEntry,
    num_fmts: &HashMap<u16, String>,
    fonts: &[Font],
    fills: &[Option<Fill>],
    borders: &[Border],
) -> CellStyle {
    let number_format = xf.num_fmt_id.filter(|id| *id != 0).map(|id| match num_fmts.get(&id) {
        Some(code) => NumberFormat::Custom(code.clone()),
        None => NumberFormat::Builtin(u8::try_from(id).unwrap_or(0)),
    });
    let border = xf
        .border_id
        .and_then(|id| borders.get(id))
        .filter(|b| b.left.is_set() || b.right.is_set() || b.top.is_set() || b.bottom.is_set())
        .copied();

    CellStyle {
        font: xf.font_id.and_then(|id| fonts.get(id)).cloned(),
        border,
        fill: xf.fill_id.and_then(|id| fills.get(id).copied().flatten()),
        number_format,
        protection: xf.protection,
        alignment: xf.alignment.clone(),
    }
}

// =============================================================================
// Worksheet XML parser: per-cell style IDs, column widths, row heights, merges
// =============================================================================

pub fn parse_sheet_formatting(xml: &str) -> SheetFormatting {
    let mut formatting = SheetFormatting::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"c" => {
                    let style_id = attr_parse::<usize>(e, b"s").unwrap_or(0);
                    // style 0 is the workbook default
                    if style_id > 0 {
                        if let Some((row, col)) = attr(e, b"r").as_deref().and_then(parse_cell_ref) {
                            formatting.cell_styles.push((row, col, style_id));
                        }
                    }
                }
                b"col" => {
                    let min = attr_parse::<usize>(e, b"min");
                    let max = attr_parse::<usize>(e, b"max");
                    let width = attr_parse::<f64>(e, b"width");
                    if let (Some(min), Some(max), Some(width)) = (min, max, width) {
                        // Excel emits max=16384 for "rest of sheet" column records
                        for col in min..=max.min(min + 1024) {
                            formatting.col_widths.push((col, width));
                        }
                    }
                }
                b"row" if attr_flag(e, b"customHeight") == Some(true) => {
                    if let (Some(row), Some(height)) = (attr_parse::<usize>(e, b"r"), attr_parse::<f64>(e, b"ht")) {
                        formatting.row_heights.push((row, height));
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attr(e, b"ref").as_deref().and_then(parse_merge_ref) {
                        formatting.merged_ranges.push(range);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    formatting
}

/// Parse a cell reference like "B5" into 1-based (row, col) = (5, 2).
pub(crate) fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, ch| acc * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1));
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, col))
}

/// Parse a merge reference like "A1:C3" into 1-based
/// (first_row, first_col, last_row, last_col). A lone cell is not a merge.
pub(crate) fn parse_merge_ref(r: &str) -> Option<(usize, usize, usize, usize)> {
    let (from, to) = r.split_once(':')?;
    let (r1, c1) = parse_cell_ref(from.trim())?;
    let (r2, c2) = parse_cell_ref(to.trim())?;
    let range = (r1.min(r2), c1.min(c2), r1.max(r2), c1.max(c2));
    if (range.0, range.1) == (range.2, range.3) {
        return None;
    }
    Some(range)
}

// =============================================================================
// Top-level import entry point
// =============================================================================

/// Read styles and per-sheet formatting from an XLSX file.
/// The returned formatting vector is aligned with `sheet_names`.
pub fn read_xlsx_formatting(
    path: &Path,
    sheet_names: &[String],
) -> Result<(StyleTable, Vec<SheetFormatting>), IoError> {
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let theme = match read_zip_file(&mut archive, "xl/theme/theme1.xml") {
        Some(xml) => parse_theme_xml(&xml),
        None => ThemePalette::default(),
    };

    let styles = match read_zip_file(&mut archive, "xl/styles.xml") {
        Some(xml) => parse_styles_xml(&xml, &theme),
        None => {
            log::debug!("no styles part in {}", path.display());
            StyleTable::default()
        }
    };

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let paths = resolve_worksheet_paths(&workbook_xml, &rels_xml, sheet_names);

    let formatting = paths
        .iter()
        .map(|part| match part.as_deref().and_then(|p| read_zip_file(&mut archive, p)) {
            Some(xml) => parse_sheet_formatting(&xml),
            None => SheetFormatting::default(),
        })
        .collect();

    Ok((styles, formatting))
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let mut file = archive.by_name(path).ok()?;
    let mut content = String::new();
    match file.read_to_string(&mut content) {
        Ok(_) => Some(content),
        Err(e) => {
            log::warn!("failed to read '{}': {}", path, e);
            None
        }
    }
}

/// Map each sheet name to its worksheet part path via workbook.xml and its rels.
fn resolve_worksheet_paths(
    workbook_xml: &str,
    rels_xml: &str,
    sheet_names: &[String],
) -> Vec<Option<String>> {
    let mut name_to_rid: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rid)) = (attr(e, b"name"), attr(e, b"r:id")) {
                    name_to_rid.insert(name, rid);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheet_names
        .iter()
        .map(|name| {
            let target = rid_to_target.get(name_to_rid.get(name)?)?;
            Some(match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
