//! Grid table rendering for display rows.
//!
//! Cells may span several lines and carry colored spans, so widths are
//! measured on the plain span text and escape codes are added afterwards.

use std::fmt::Write as _;

use nodestat_core::{DisplayRow, Emphasis, Span};
use unicode_width::UnicodeWidthStr;

const RESET: &str = "\x1b[0m";

/// Returns the ANSI sequence for an emphasis (black text on a colored background)
const fn emphasis_code(emphasis: Emphasis) -> &'static str {
    match emphasis {
        Emphasis::Normal => "\x1b[0;30;42m",
        Emphasis::Warning => "\x1b[0;30;43m",
        Emphasis::Critical => "\x1b[0;30;41m",
        Emphasis::Hidden => "\x1b[0;30;40m",
    }
}

/// Display width of one cell line, spans separated by a single space
fn line_width(spans: &[Span]) -> usize {
    let text: usize = spans.iter().map(|s| s.text.width()).sum();
    text + spans.len().saturating_sub(1)
}

fn render_line(spans: &[Span], color: bool) -> String {
    let mut out = String::new();
    for (i, span) in spans.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match span.emphasis {
            Some(emphasis) if color => {
                let _ = write!(out, "{}{}{RESET}", emphasis_code(emphasis), span.text);
            }
            _ => out.push_str(&span.text),
        }
    }
    out
}

fn border(widths: &[usize], left: char, fill: char, join: char, right: char) -> String {
    let mut out = String::new();
    out.push(left);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(join);
        }
        out.extend(std::iter::repeat_n(fill, width + 2));
    }
    out.push(right);
    out.push('\n');
    out
}

/// Writes one table row; every cell is a list of lines of spans
fn write_row(out: &mut String, cells: &[&[Vec<Span>]], widths: &[usize], color: bool) {
    let height = cells.iter().map(|c| c.len()).max().unwrap_or(0).max(1);
    for line in 0..height {
        out.push('│');
        for (cell, width) in cells.iter().zip(widths) {
            let spans = cell.get(line).map_or(&[][..], Vec::as_slice);
            let pad = width.saturating_sub(line_width(spans));
            let _ = write!(out, " {}{} │", " ".repeat(pad), render_line(spans, color));
        }
        out.push('\n');
    }
}

/// Renders rows as a box-drawing grid with right-aligned cells.
///
/// Rows with fewer cells than headers get empty cells.
#[must_use]
pub fn render(headers: &[&str], rows: &[DisplayRow], color: bool) -> String {
    let header_cells: Vec<Vec<Vec<Span>>> = headers
        .iter()
        .map(|h| h.lines().map(|l| vec![Span::plain(l)]).collect())
        .collect();

    let mut widths: Vec<usize> = header_cells
        .iter()
        .map(|lines| lines.iter().map(|l| line_width(l)).max().unwrap_or(0))
        .collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            let cell_width = cell.lines().iter().map(|l| line_width(l)).max().unwrap_or(0);
            *width = (*width).max(cell_width);
        }
    }

    let mut out = border(&widths, '╒', '═', '╤', '╕');
    let header_refs: Vec<&[Vec<Span>]> = header_cells.iter().map(Vec::as_slice).collect();
    write_row(&mut out, &header_refs, &widths, color);
    out.push_str(&border(&widths, '╞', '═', '╪', '╡'));

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(&border(&widths, '├', '─', '┼', '┤'));
        }
        let cells: Vec<&[Vec<Span>]> = (0..widths.len())
            .map(|col| row.cells.get(col).map_or(&[][..], |c| c.lines()))
            .collect();
        write_row(&mut out, &cells, &widths, color);
    }

    out.push_str(&border(&widths, '╘', '═', '╧', '╛'));
    out
}
