use printpdf::{BuiltinFont, Color, Greyscale, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};
use thiserror::Error;

use crate::models::Keypair;

pub const EXPORT_FILENAME: &str = "forkpi_keypairs.pdf";
pub const HEADER: [&str; 2] = ["Name", "RFID UID"];
/// Name column is wide, UID column narrow (points).
pub const COLUMN_WIDTHS: [f32; 2] = [300.0, 100.0];

// US letter with one-inch margins, all in points
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;

const FONT_SIZE: f32 = 10.0;
const LEADING: f32 = 12.0;
const PAD_X: f32 = 6.0;
const PAD_Y: f32 = 3.0;
const GRID_WIDTH: f32 = 0.25;
/// Rough Helvetica advance per character, as a fraction of the font size
const AVG_CHAR_WIDTH: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("pdf rendering failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTone {
    Normal,
    /// Inactive keypairs
    Muted,
}

impl TextTone {
    fn color(self) -> Color {
        match self {
            TextTone::Normal => Color::Greyscale(Greyscale::new(0.0, None)),
            TextTone::Muted => Color::Greyscale(Greyscale::new(0.5, None)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub tone: TextTone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub cells: [Cell; 2],
}

impl Row {
    fn new(name: &str, uid: &str, tone: TextTone) -> Self {
        Self {
            cells: [
                Cell { text: name.to_string(), tone },
                Cell { text: uid.to_string(), tone },
            ],
        }
    }
}

/// Header row followed by one row per keypair, in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypairTable {
    pub rows: Vec<Row>,
}

pub fn build_table(keypairs: &[Keypair]) -> KeypairTable {
    let mut rows = Vec::with_capacity(keypairs.len() + 1);
    rows.push(Row::new(HEADER[0], HEADER[1], TextTone::Normal));
    for kp in keypairs {
        let tone = if kp.is_active { TextTone::Normal } else { TextTone::Muted };
        rows.push(Row::new(&kp.name, &kp.rfid_uid, tone));
    }
    KeypairTable { rows }
}

/// Greedy word wrap against an estimated text width. Words longer than a
/// line are split.
fn wrap(text: &str, width: f32) -> Vec<String> {
    let max_chars = ((width - 2.0 * PAD_X) / (FONT_SIZE * AVG_CHAR_WIDTH)).max(1.0) as usize;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..max_chars).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

fn stroke_rect(layer: &PdfLayerReference, x: f32, top: f32, width: f32, height: f32) {
    let corners = [
        (x, top),
        (x + width, top),
        (x + width, top - height),
        (x, top - height),
    ];
    layer.add_line(Line {
        points: corners
            .iter()
            .map(|&(px, py)| (Point::new(mm(px), mm(py)), false))
            .collect(),
        is_closed: true,
    });
}

fn draw_row(layer: &PdfLayerReference, font: &IndirectFontRef, row: &Row, lines: &[Vec<String>; 2], top: f32, height: f32) {
    let table_width: f32 = COLUMN_WIDTHS.iter().sum();
    let mut x = (PAGE_WIDTH - table_width) / 2.0;

    for (col, cell) in row.cells.iter().enumerate() {
        let width = COLUMN_WIDTHS[col];
        layer.set_fill_color(cell.tone.color());
        for (i, line) in lines[col].iter().enumerate() {
            let baseline = top - PAD_Y - FONT_SIZE - i as f32 * LEADING;
            layer.use_text(line.clone(), FONT_SIZE, mm(x + PAD_X), mm(baseline), font);
        }
        stroke_rect(layer, x, top, width, height);
        x += width;
    }
}

/// Render the table to PDF bytes, starting a new page when a row does not fit.
pub fn render_pdf(table: &KeypairTable) -> Result<Vec<u8>, ExportError> {
    let (doc, page, layer) = PdfDocument::new("ForkPi Keypairs", mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Table");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(format!("{e:?}")))?;

    let mut layer = doc.get_page(page).get_layer(layer);
    layer.set_outline_color(Color::Greyscale(Greyscale::new(0.0, None)));
    layer.set_outline_thickness(GRID_WIDTH);
    let mut top = PAGE_HEIGHT - MARGIN;

    for row in &table.rows {
        let lines = [
            wrap(&row.cells[0].text, COLUMN_WIDTHS[0]),
            wrap(&row.cells[1].text, COLUMN_WIDTHS[1]),
        ];
        let line_count = lines[0].len().max(lines[1].len());
        let height = line_count as f32 * LEADING + 2.0 * PAD_Y;

        if top - height < MARGIN && top < PAGE_HEIGHT - MARGIN {
            let (next_page, next_layer) = doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Table");
            layer = doc.get_page(next_page).get_layer(next_layer);
            layer.set_outline_color(Color::Greyscale(Greyscale::new(0.0, None)));
            layer.set_outline_thickness(GRID_WIDTH);
            top = PAGE_HEIGHT - MARGIN;
        }

        draw_row(&layer, &font, row, &lines, top, height);
        top -= height;
    }

    doc.save_to_bytes().map_err(|e| ExportError::Pdf(format!("{e:?}")))
}
