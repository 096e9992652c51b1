//! Table detection from positioned page characters.
//!
//! pdfium exposes characters with bounding boxes but has no notion of a
//! table. We rebuild one bottom-up: characters → words (small gaps),
//! words → cells (gaps wider than [`CELL_GAP`]), cells → lines (shared
//! baseline). A run of at least [`MIN_TABLE_ROWS`] consecutive lines that
//! each split into [`MIN_TABLE_COLUMNS`] or more cells is reported as a table.
//!
//! Coordinates are PDF points with a bottom-left origin.

use csv::WriterBuilder;
use tracing::warn;

/// A table: ordered rows of ordered cell strings.
pub type Table = Vec<Vec<String>>;

/// Characters further apart than this start a new word.
const WORD_GAP: f32 = 3.0;

/// Words further apart than this on one line belong to different cells.
const CELL_GAP: f32 = 12.0;

const MIN_TABLE_ROWS: usize = 2;
const MIN_TABLE_COLUMNS: usize = 2;

/// One character with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedChar {
    pub ch: char,
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
struct Word {
    text: String,
    left: f32,
    right: f32,
    bottom: f32,
    height: f32,
}

/// Detect tables on a page from its characters, in top-to-bottom order.
pub fn detect_tables(chars: &[PositionedChar]) -> Vec<Table> {
    let lines = group_lines(group_words(chars));

    let mut tables = Vec::new();
    let mut current: Table = Vec::new();
    for line in &lines {
        let cells = line_cells(line);
        if cells.len() >= MIN_TABLE_COLUMNS {
            current.push(cells);
        } else {
            flush_table(&mut current, &mut tables);
        }
    }
    flush_table(&mut current, &mut tables);
    tables
}

fn flush_table(current: &mut Table, tables: &mut Vec<Table>) {
    if current.len() >= MIN_TABLE_ROWS {
        tables.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

fn group_words(chars: &[PositionedChar]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut pending: Vec<&PositionedChar> = Vec::new();

    for c in chars {
        if c.ch.is_whitespace() {
            finish_word(&mut pending, &mut words);
            continue;
        }
        if let Some(last) = pending.last() {
            let vertical = (c.bottom - last.bottom).abs();
            let gap = c.left - (last.left + last.width);
            if vertical > last.height * 0.5 || gap > WORD_GAP {
                finish_word(&mut pending, &mut words);
            }
        }
        pending.push(c);
    }
    finish_word(&mut pending, &mut words);
    words
}

fn finish_word(pending: &mut Vec<&PositionedChar>, words: &mut Vec<Word>) {
    if pending.is_empty() {
        return;
    }
    let text: String = pending.iter().map(|c| c.ch).collect();
    let left = pending.iter().map(|c| c.left).fold(f32::INFINITY, f32::min);
    let right = pending
        .iter()
        .map(|c| c.left + c.width)
        .fold(f32::NEG_INFINITY, f32::max);
    let bottom = pending.iter().map(|c| c.bottom).fold(f32::INFINITY, f32::min);
    let height = pending.iter().map(|c| c.height).fold(0.0, f32::max);
    words.push(Word {
        text,
        left,
        right,
        bottom,
        height,
    });
    pending.clear();
}

/// Cluster words sharing a baseline, top of page first, left to right.
fn group_lines(mut words: Vec<Word>) -> Vec<Vec<Word>> {
    words.sort_by(|a, b| {
        b.bottom
            .total_cmp(&a.bottom)
            .then_with(|| a.left.total_cmp(&b.left))
    });

    let mut lines: Vec<Vec<Word>> = Vec::new();
    for word in words {
        let joins_last = lines.last().and_then(|l| l.first()).is_some_and(|anchor| {
            let tolerance = anchor.height.max(word.height) * 0.5;
            (anchor.bottom - word.bottom).abs() <= tolerance
        });
        match lines.last_mut() {
            Some(line) if joins_last => line.push(word),
            _ => lines.push(vec![word]),
        }
    }
    for line in &mut lines {
        line.sort_by(|a, b| a.left.total_cmp(&b.left));
    }
    lines
}

fn line_cells(line: &[Word]) -> Vec<String> {
    let mut cells: Vec<String> = Vec::new();
    let mut last_right: Option<f32> = None;
    for word in line {
        match (last_right, cells.last_mut()) {
            (Some(right), Some(cell)) if word.left - right <= CELL_GAP => {
                cell.push(' ');
                cell.push_str(&word.text);
            }
            _ => cells.push(word.text.clone()),
        }
        last_right = Some(word.right);
    }
    cells
}

/// Serialize tables as CSV blocks separated by a blank line.
///
/// Embedded line breaks inside a cell become spaces so every table row stays
/// on one line; the row-bounded chunker relies on that.
pub fn tables_to_text(tables: &[Table]) -> String {
    tables
        .iter()
        .filter_map(|t| match table_to_csv(t) {
            Ok(block) => Some(block),
            Err(e) => {
                warn!("Dropping table that failed CSV serialisation: {}", e);
                None
            }
        })
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn table_to_csv(table: &Table) -> Result<String, csv::Error> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in table {
        writer.write_record(row.iter().map(|cell| cell.replace(['\r', '\n'], " ")))?;
    }
    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAR_W: f32 = 5.0;
    const CHAR_H: f32 = 10.0;

    /// Lay out `text` starting at (x, y), one fixed-width box per char.
    fn place(text: &str, x: f32, y: f32) -> Vec<PositionedChar> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| PositionedChar {
                ch,
                left: x + i as f32 * CHAR_W,
                bottom: y,
                width: CHAR_W,
                height: CHAR_H,
            })
            .collect()
    }

    fn grid(rows: &[&[&str]], top: f32) -> Vec<PositionedChar> {
        rows.iter()
            .enumerate()
            .flat_map(|(r, cells)| {
                let y = top - r as f32 * 20.0;
                cells
                    .iter()
                    .enumerate()
                    .flat_map(move |(c, text)| place(text, 50.0 + c as f32 * 150.0, y))
            })
            .collect()
    }

    #[test]
    fn detects_simple_grid() {
        let chars = grid(
            &[
                &["Year", "Revenue"],
                &["2024", "1,200"],
                &["2025", "1,350"],
            ],
            700.0,
        );
        let tables = detect_tables(&chars);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            vec![
                vec!["Year", "Revenue"],
                vec!["2024", "1,200"],
                vec!["2025", "1,350"],
            ]
        );
    }

    #[test]
    fn spaced_words_stay_in_one_cell() {
        let chars = grid(
            &[
                &["All Vehicles", "10 500"],
                &["Passenger Vehicles", "9 000"],
            ],
            500.0,
        );
        let tables = detect_tables(&chars);
        assert_eq!(tables[0][1], vec!["Passenger Vehicles", "9 000"]);
    }

    #[test]
    fn prose_is_not_a_table() {
        let mut chars = place("The authority reported strong growth.", 50.0, 700.0);
        chars.extend(place("Traffic rose in every quarter.", 50.0, 680.0));
        assert!(detect_tables(&chars).is_empty());
    }

    #[test]
    fn single_multi_cell_line_is_not_a_table() {
        let mut chars = grid(&[&["Page", "3"]], 700.0);
        chars.extend(place("Narrative paragraph follows here.", 50.0, 650.0));
        assert!(detect_tables(&chars).is_empty());
    }

    #[test]
    fn prose_splits_two_tables() {
        let mut chars = grid(&[&["a", "b"], &["c", "d"]], 700.0);
        chars.extend(place("Notes between tables", 50.0, 600.0));
        chars.extend(grid(&[&["e", "f"], &["g", "h"]], 550.0));
        let tables = detect_tables(&chars);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1][0], vec!["e", "f"]);
    }

    #[test]
    fn csv_blocks_replace_cell_newlines() {
        let tables = vec![
            vec![vec!["Segment".to_string(), "Value".to_string()]],
            vec![vec!["Commercial\nVehicles".to_string(), "1,234".to_string()]],
        ];
        let text = tables_to_text(&tables);
        assert_eq!(text, "Segment,Value\n\nCommercial Vehicles,\"1,234\"");
    }

    #[test]
    fn no_tables_is_empty_text() {
        assert_eq!(tables_to_text(&[]), "");
    }
}
