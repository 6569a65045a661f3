// Excel file import/export
//
// Import: calamine for values and cached formula results, plus the style
// parser in xlsx_styles for the formatting calamine does not expose.
// Export: rust_xlsxwriter. The saved file is a snapshot of the in-memory
// model: values, styles, column widths, custom row heights and merged
// ranges. Conditional formats and charts are not carried.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, SheetType, SheetVisible, Sheets};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Formula, Workbook as XlsxWorkbook,
    Worksheet,
};

use ledgergrid_engine::cell::{
    BorderLine, CellStyle, CellValue, HorizontalAlignment, NumberFormat, VerticalAlignment,
};
use ledgergrid_engine::sheet::{MergedRange, Sheet, Visibility};
use ledgergrid_engine::workbook::Workbook;

use crate::error::IoError;
use crate::xlsx_styles;

/// A sheet's values as a dense, A1-anchored grid: `grid[row][col]`, 0-based.
pub type Grid = Vec<Vec<CellValue>>;

/// Extensions whose files are ZIP packages carrying styles.xml
fn has_style_parts(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
        .unwrap_or(false)
}

fn data_to_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(e.to_string()),
        Data::DateTime(dt) => CellValue::Date(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, IoError> {
    open_workbook_auto(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a workbook (xlsx, xlsm, xls, xlsb, ods) into the in-memory model.
///
/// Styles, column widths, row heights and merged ranges are read for
/// xlsx/xlsm only.
pub fn load(path: &Path) -> Result<Workbook, IoError> {
    let mut source = open(path)?;

    let metadata: Vec<(String, Visibility)> = source
        .sheets_metadata()
        .iter()
        .filter(|s| s.typ == SheetType::WorkSheet)
        .map(|s| {
            let visibility = match s.visible {
                SheetVisible::Visible => Visibility::Visible,
                SheetVisible::Hidden => Visibility::Hidden,
                SheetVisible::VeryHidden => Visibility::VeryHidden,
            };
            (s.name.clone(), visibility)
        })
        .collect();

    if metadata.is_empty() {
        return Err(IoError::NoSheets(path.to_path_buf()));
    }

    let mut sheets = Vec::with_capacity(metadata.len());
    for (name, visibility) in &metadata {
        let mut sheet = Sheet::new(name);
        sheet.visibility = *visibility;

        let range = source.worksheet_range(name).map_err(|source| IoError::Sheet {
            sheet: name.clone(),
            source,
        })?;

        // Range start offset (data may not begin at A1)
        if let Some((start_row, start_col)) = range.start() {
            for (row_idx, row) in range.rows().enumerate() {
                for (col_idx, data) in row.iter().enumerate() {
                    let value = data_to_value(data);
                    if value != CellValue::Empty {
                        sheet.set_value(
                            start_row as usize + row_idx + 1,
                            start_col as usize + col_idx + 1,
                            value,
                        );
                    }
                }
            }
        }

        // Formula range may start at a different offset than the value range
        if let Ok(formulas) = source.worksheet_formula(name) {
            if let Some((start_row, start_col)) = formulas.start() {
                for (row_idx, row) in formulas.rows().enumerate() {
                    for (col_idx, formula) in row.iter().enumerate() {
                        if formula.is_empty() {
                            continue;
                        }
                        let (r, c) = (start_row as usize + row_idx + 1, start_col as usize + col_idx + 1);
                        let cached = sheet.value(r, c).clone();
                        sheet.set_value(
                            r,
                            c,
                            CellValue::Formula {
                                source: formula.trim_start_matches('=').to_string(),
                                cached: Box::new(cached),
                            },
                        );
                    }
                }
            }
        }

        sheets.push(sheet);
    }

    if has_style_parts(path) {
        let names: Vec<String> = metadata.iter().map(|(n, _)| n.clone()).collect();
        let (styles, formatting) = xlsx_styles::read_xlsx_formatting(path, &names)?;
        log::debug!("{}: {} cell styles", path.display(), styles.len());
        for (sheet, sf) in sheets.iter_mut().zip(formatting) {
            for (row, col, style_id) in sf.cell_styles {
                if let Some(style) = styles.get(style_id) {
                    sheet.set_style(row, col, Some(style.clone()));
                }
            }
            for (col, width) in sf.col_widths {
                sheet.set_col_width(col, width);
            }
            for (row, height) in sf.row_heights {
                sheet.set_row_height(row, height);
            }
            for (first_row, first_col, last_row, last_col) in sf.merged_ranges {
                let range = MergedRange::new(first_row, first_col, last_row, last_col);
                if !sheet.add_merge(range) {
                    log::warn!("{}: dropped overlapping merged range {:?}", sheet.name, range);
                }
            }
        }
    }

    Ok(Workbook::from_sheets(sheets))
}

/// Read the first sheet of a file as an A1-anchored grid of values.
pub fn read_first_sheet_grid(path: &Path) -> Result<Grid, IoError> {
    let mut source = open(path)?;
    let name = source
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IoError::NoSheets(path.to_path_buf()))?;
    let range = source.worksheet_range(&name).map_err(|source| IoError::Sheet {
        sheet: name.clone(),
        source,
    })?;

    let (Some((start_row, start_col)), Some((end_row, end_col))) = (range.start(), range.end()) else {
        return Ok(Grid::new());
    };

    let mut grid = vec![vec![CellValue::Empty; end_col as usize + 1]; end_row as usize + 1];
    for (row_idx, row) in range.rows().enumerate() {
        let target = &mut grid[start_row as usize + row_idx];
        for (col_idx, data) in row.iter().enumerate() {
            target[start_col as usize + col_idx] = data_to_value(data);
        }
    }
    Ok(grid)
}

/// Save the workbook as XLSX, replacing any existing file at `path`.
pub fn save(workbook: &Workbook, path: &Path) -> Result<(), IoError> {
    let mut xlsx = XlsxWorkbook::new();
    // Excel refuses a hidden active sheet
    let active = workbook.sheets().iter().position(|s| s.is_visible()).unwrap_or(0);

    for (idx, sheet) in workbook.sheets().iter().enumerate() {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, width) in sheet.col_widths() {
            worksheet.set_column_width(col.saturating_sub(1) as u16, raw_to_char_width(width))?;
        }

        for (row, height) in sheet.row_heights() {
            worksheet.set_row_height(row.saturating_sub(1) as u32, height)?;
        }

        // Merges go first; the origin cell's value and style are written over them
        for m in sheet.merged_ranges() {
            let merged = worksheet.merge_range(
                m.first_row.saturating_sub(1) as u32,
                m.first_col.saturating_sub(1) as u16,
                m.last_row.saturating_sub(1) as u32,
                m.last_col.saturating_sub(1) as u16,
                "",
                &Format::new(),
            );
            if let Err(e) = merged {
                log::warn!("{}: merged range {:?} not written: {}", sheet.name, m, e);
            }
        }

        write_cells(sheet, worksheet)?;

        if idx == active {
            worksheet.set_active(true);
        } else if !sheet.is_visible() {
            // very-hidden sheets are written as hidden
            worksheet.set_hidden(true);
        }
    }

    xlsx.save(path)?;
    Ok(())
}

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATE_TIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// `<col width>` stores character width plus 5px of padding at 7px per digit;
/// rust_xlsxwriter adds the padding back.
fn raw_to_char_width(raw: f64) -> f64 {
    (raw - 5.0 / 7.0).max(0.0)
}

fn write_cells(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(), IoError> {
    for ((row, col), cell) in sheet.cells_iter() {
        let row32 = row.saturating_sub(1) as u32;
        let col16 = col.saturating_sub(1) as u16;
        let format = cell.style.as_ref().map(build_excel_format).unwrap_or_else(Format::new);

        match &cell.value {
            CellValue::Empty => {
                if cell.has_style() {
                    worksheet.write_blank(row32, col16, &format)?;
                }
            }
            CellValue::Text(s) => {
                worksheet.write_string_with_format(row32, col16, s, &format)?;
            }
            CellValue::Number(n) => {
                worksheet.write_number_with_format(row32, col16, *n, &format)?;
            }
            CellValue::Bool(b) => {
                worksheet.write_boolean_with_format(row32, col16, *b, &format)?;
            }
            CellValue::Date(serial) => {
                // calamine only reports a date when the number format is one
                let has_format = cell.style.as_ref().is_some_and(|s| s.number_format.is_some());
                let format = if has_format {
                    format
                } else if serial.fract() == 0.0 {
                    format.set_num_format(DATE_FORMAT)
                } else {
                    format.set_num_format(DATE_TIME_FORMAT)
                };
                worksheet.write_number_with_format(row32, col16, *serial, &format)?;
            }
            CellValue::Formula { source, cached } => {
                let formula = Formula::new(source.as_str()).set_result(cached.display().into_owned());
                worksheet.write_formula_with_format(row32, col16, formula, &format)?;
            }
        }
    }
    Ok(())
}

fn build_excel_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if let Some(font) = &style.font {
        if font.bold {
            format = format.set_bold();
        }
        if font.italic {
            format = format.set_italic();
        }
        if font.underline {
            format = format.set_underline(FormatUnderline::Single);
        }
        if font.strikethrough {
            format = format.set_font_strikethrough();
        }
        if let Some(size) = font.size {
            format = format.set_font_size(size);
        }
        if let Some(ref name) = font.name {
            format = format.set_font_name(name);
        }
        if let Some(color) = font.color {
            format = format.set_font_color(Color::RGB(color.0));
        }
    }

    if let Some(fill) = style.fill {
        format = format.set_background_color(Color::RGB(fill.color.0));
    }

    if let Some(border) = style.border {
        if border.left.is_set() {
            format = format.set_border_left(border_line_to_xlsx(border.left.line));
            if let Some(c) = border.left.color {
                format = format.set_border_left_color(Color::RGB(c.0));
            }
        }
        if border.right.is_set() {
            format = format.set_border_right(border_line_to_xlsx(border.right.line));
            if let Some(c) = border.right.color {
                format = format.set_border_right_color(Color::RGB(c.0));
            }
        }
        if border.top.is_set() {
            format = format.set_border_top(border_line_to_xlsx(border.top.line));
            if let Some(c) = border.top.color {
                format = format.set_border_top_color(Color::RGB(c.0));
            }
        }
        if border.bottom.is_set() {
            format = format.set_border_bottom(border_line_to_xlsx(border.bottom.line));
            if let Some(c) = border.bottom.color {
                format = format.set_border_bottom_color(Color::RGB(c.0));
            }
        }
    }

    match &style.number_format {
        Some(NumberFormat::Builtin(id)) => format = format.set_num_format_index(*id),
        Some(NumberFormat::Custom(code)) => format = format.set_num_format(code),
        None => {}
    }

    if let Some(protection) = style.protection {
        if !protection.locked {
            format = format.set_unlocked();
        }
        if protection.hidden {
            format = format.set_hidden();
        }
    }

    if let Some(alignment) = &style.alignment {
        format = match alignment.horizontal {
            HorizontalAlignment::General => format,
            HorizontalAlignment::Left => format.set_align(FormatAlign::Left),
            HorizontalAlignment::Center => format.set_align(FormatAlign::Center),
            HorizontalAlignment::Right => format.set_align(FormatAlign::Right),
            HorizontalAlignment::Fill => format.set_align(FormatAlign::Fill),
            HorizontalAlignment::Justify => format.set_align(FormatAlign::Justify),
            HorizontalAlignment::CenterContinuous => format.set_align(FormatAlign::CenterAcross),
            HorizontalAlignment::Distributed => format.set_align(FormatAlign::Distributed),
        };
        format = match alignment.vertical {
            VerticalAlignment::Bottom => format,
            VerticalAlignment::Top => format.set_align(FormatAlign::Top),
            VerticalAlignment::Center => format.set_align(FormatAlign::VerticalCenter),
            VerticalAlignment::Justify => format.set_align(FormatAlign::VerticalJustify),
            VerticalAlignment::Distributed => format.set_align(FormatAlign::VerticalDistributed),
        };
        if alignment.wrap_text {
            format = format.set_text_wrap();
        }
        if alignment.shrink_to_fit {
            format = format.set_shrink();
        }
        if alignment.indent > 0 {
            format = format.set_indent(alignment.indent);
        }
    }

    format
}

fn border_line_to_xlsx(line: BorderLine) -> FormatBorder {
    match line {
        BorderLine::None => FormatBorder::None,
        BorderLine::Thin => FormatBorder::Thin,
        BorderLine::Medium => FormatBorder::Medium,
        BorderLine::Thick => FormatBorder::Thick,
        BorderLine::Dashed => FormatBorder::Dashed,
        BorderLine::Dotted => FormatBorder::Dotted,
        BorderLine::Double => FormatBorder::Double,
        BorderLine::Hair => FormatBorder::Hair,
        BorderLine::MediumDashed => FormatBorder::MediumDashed,
        BorderLine::DashDot => FormatBorder::DashDot,
        BorderLine::MediumDashDot => FormatBorder::MediumDashDot,
        BorderLine::DashDotDot => FormatBorder::DashDotDot,
        BorderLine::MediumDashDotDot => FormatBorder::MediumDashDotDot,
        BorderLine::SlantDashDot => FormatBorder::SlantDashDot,
    }
}
