//! Minimal PDF writer
//!
//! Hand-built PDF 1.4 output for the report documents: an object table with
//! xref and trailer, A4 pages, the base Type1 fonts (Helvetica variants and
//! Courier), filled rectangles for accents and table shading, and greedy
//! word-wrap with approximate font metrics. Text is normalised to latin-1;
//! unsupported characters are dropped.

use crate::report::markdown::{Block, MarkdownDocument};
use chrono::Local;

const PAGE_WIDTH: f64 = 595.28;
const PAGE_HEIGHT: f64 = 841.89;
const MARGIN: f64 = 72.0;
const CONTENT_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;
const BOTTOM_LIMIT: f64 = PAGE_HEIGHT - MARGIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Oblique,
    Mono,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "/F1",
            Font::Bold => "/F2",
            Font::Oblique => "/F3",
            Font::Mono => "/F4",
        }
    }

    /// Approximate advance width per character, as a fraction of font size
    fn width_factor(self) -> f64 {
        match self {
            Font::Regular | Font::Oblique => 0.50,
            Font::Bold => 0.54,
            Font::Mono => 0.60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn fill_op(self) -> String {
        format!(
            "{:.3} {:.3} {:.3} rg",
            self.0 as f64 / 255.0,
            self.1 as f64 / 255.0,
            self.2 as f64 / 255.0
        )
    }

    fn stroke_op(self) -> String {
        format!(
            "{:.3} {:.3} {:.3} RG",
            self.0 as f64 / 255.0,
            self.1 as f64 / 255.0,
            self.2 as f64 / 255.0
        )
    }
}

const INK: Rgb = Rgb(50, 50, 50);
const HEADLINE: Rgb = Rgb(22, 33, 62);
const ACCENT: Rgb = Rgb(0, 242, 96);
const MUTED: Rgb = Rgb(128, 128, 128);
const CODE_BG: Rgb = Rgb(245, 245, 245);
const ZEBRA: Rgb = Rgb(248, 249, 252);
const WHITE: Rgb = Rgb(255, 255, 255);

/// Renders parsed Markdown blocks into PDF bytes
pub struct PdfRenderer {
    stamp: String,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self {
            stamp: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }

    /// Render a document with a title page and running header/footer
    pub fn render(&self, doc: &MarkdownDocument, title: &str) -> Vec<u8> {
        let mut writer = PageWriter::new(title.to_string(), self.stamp.clone());
        writer.title_page(title);

        for block in &doc.blocks {
            match block {
                Block::Heading1(text) => writer.chapter(text),
                Block::Heading2(text) => writer.section(text),
                Block::Heading3(text) => writer.subsection(text),
                Block::Paragraph(text) => writer.body(text),
                Block::Bullet(text) => writer.bullet(text),
                Block::Code(lines) => writer.code(lines),
                Block::Table { headers, rows } => writer.table(headers, rows),
                Block::Formula(text) => writer.formula(text),
                Block::Figure(desc) => writer.figure(desc),
            }
        }

        writer.finish()
    }
}

/// Accumulates per-page content streams and assembles the final file
struct PageWriter {
    pages: Vec<String>,
    current: String,
    cursor: f64,
    title: String,
    stamp: String,
}

impl PageWriter {
    fn new(title: String, stamp: String) -> Self {
        let mut writer = Self {
            pages: Vec::new(),
            current: String::new(),
            cursor: MARGIN,
            title,
            stamp,
        };
        writer.start_page();
        writer
    }

    fn page_no(&self) -> usize {
        self.pages.len() + 1
    }

    fn start_page(&mut self) {
        self.current = String::new();
        self.cursor = MARGIN;

        // Running header on every page after the first
        if self.page_no() > 1 {
            let text = format!("{} | Page {}", self.title, self.page_no());
            let width = text_width(&text, Font::Oblique, 8.0);
            self.draw_text(
                PAGE_WIDTH - MARGIN - width,
                MARGIN - 28.0,
                Font::Oblique,
                8.0,
                MUTED,
                &text,
            );
        }
        let footer = format!("Generated: {}", self.stamp);
        let width = text_width(&footer, Font::Oblique, 8.0);
        self.draw_text(
            (PAGE_WIDTH - width) / 2.0,
            PAGE_HEIGHT - 40.0,
            Font::Oblique,
            8.0,
            MUTED,
            &footer,
        );
    }

    fn new_page(&mut self) {
        let stream = std::mem::take(&mut self.current);
        self.pages.push(stream);
        self.start_page();
    }

    /// Page-break when fewer than `needed` points remain
    fn ensure(&mut self, needed: f64) {
        if self.cursor + needed > BOTTOM_LIMIT {
            self.new_page();
        }
    }

    /// Draw one text line at an absolute position measured from the top
    fn draw_text(&mut self, x: f64, top: f64, font: Font, size: f64, color: Rgb, text: &str) {
        let y = PAGE_HEIGHT - top - size;
        self.current.push_str(&format!(
            "BT {} {} {:.1} Tf 1 0 0 1 {:.2} {:.2} Tm ({}) Tj ET\n",
            color.fill_op(),
            font.resource(),
            size,
            x,
            y,
            escape_pdf(&normalize_latin1(text)),
        ));
    }

    /// Filled rectangle, `top` measured from the page top
    fn fill_rect(&mut self, x: f64, top: f64, w: f64, h: f64, color: Rgb) {
        let y = PAGE_HEIGHT - top - h;
        self.current.push_str(&format!(
            "{} {:.2} {:.2} {:.2} {:.2} re f\n",
            color.fill_op(),
            x,
            y,
            w,
            h
        ));
    }

    /// Stroked rectangle outline
    fn stroke_rect(&mut self, x: f64, top: f64, w: f64, h: f64, color: Rgb) {
        let y = PAGE_HEIGHT - top - h;
        self.current.push_str(&format!(
            "{} 0.5 w {:.2} {:.2} {:.2} {:.2} re S\n",
            color.stroke_op(),
            x,
            y,
            w,
            h
        ));
    }

    /// Wrapped body lines starting at `x`, advancing the cursor
    fn wrapped(&mut self, x: f64, width: f64, font: Font, size: f64, color: Rgb, text: &str) {
        let leading = size * 1.45;
        for line in wrap(text, font, size, width) {
            self.ensure(leading);
            let top = self.cursor;
            self.draw_text(x, top, font, size, color, &line);
            self.cursor += leading;
        }
    }

    fn title_page(&mut self, title: &str) {
        self.cursor = 220.0;
        let upper = title.to_uppercase();
        for line in wrap(&upper, Font::Bold, 26.0, CONTENT_WIDTH) {
            let width = text_width(&line, Font::Bold, 26.0);
            let top = self.cursor;
            self.draw_text((PAGE_WIDTH - width) / 2.0, top, Font::Bold, 26.0, HEADLINE, &line);
            self.cursor += 34.0;
        }

        self.cursor += 24.0;
        let cursor = self.cursor;
        self.fill_rect(PAGE_WIDTH / 2.0 - 90.0, cursor, 180.0, 3.0, ACCENT);
        self.cursor += 40.0;

        let subtitle = "Memory Forensics Analysis";
        let width = text_width(subtitle, Font::Regular, 14.0);
        let top = self.cursor;
        self.draw_text(
            (PAGE_WIDTH - width) / 2.0,
            top,
            Font::Regular,
            14.0,
            Rgb(80, 80, 80),
            subtitle,
        );
        self.new_page();
    }

    fn chapter(&mut self, text: &str) {
        if !self.current_page_is_blank() {
            self.new_page();
        }
        self.cursor += 20.0;
        let cursor = self.cursor;
        self.fill_rect(MARGIN - 14.0, cursor, 5.0, 26.0, ACCENT);
        self.wrapped(
            MARGIN,
            CONTENT_WIDTH,
            Font::Bold,
            20.0,
            HEADLINE,
            &text.to_uppercase(),
        );
        self.cursor += 14.0;
    }

    fn section(&mut self, text: &str) {
        self.ensure(40.0);
        self.cursor += 10.0;
        self.wrapped(MARGIN, CONTENT_WIDTH, Font::Bold, 14.0, Rgb(40, 40, 60), text);
        self.cursor += 4.0;
    }

    fn subsection(&mut self, text: &str) {
        self.ensure(30.0);
        self.cursor += 6.0;
        self.wrapped(MARGIN, CONTENT_WIDTH, Font::Bold, 12.0, Rgb(60, 60, 80), text);
        self.cursor += 2.0;
    }

    fn body(&mut self, text: &str) {
        let plain = text.replace("**", "");
        self.wrapped(MARGIN, CONTENT_WIDTH, Font::Regular, 11.0, INK, &plain);
        self.cursor += 4.0;
    }

    fn bullet(&mut self, text: &str) {
        let plain = text.replace("**", "");
        self.ensure(16.0);
        let top = self.cursor;
        self.draw_text(MARGIN + 8.0, top, Font::Regular, 11.0, INK, "-");
        self.wrapped(
            MARGIN + 20.0,
            CONTENT_WIDTH - 20.0,
            Font::Regular,
            11.0,
            INK,
            &plain,
        );
    }

    fn code(&mut self, lines: &[String]) {
        self.cursor += 6.0;
        for line in lines {
            self.ensure(13.0);
            let cursor = self.cursor;
            self.fill_rect(MARGIN, cursor - 2.0, CONTENT_WIDTH, 13.0, CODE_BG);
            self.draw_text(MARGIN + 6.0, cursor, Font::Mono, 9.0, Rgb(0, 0, 0), line);
            self.cursor += 13.0;
        }
        self.cursor += 6.0;
    }

    fn formula(&mut self, text: &str) {
        self.ensure(24.0);
        self.cursor += 7.0;
        let line = format!("Formula: {text}");
        let width = text_width(&line, Font::Oblique, 11.0);
        let top = self.cursor;
        self.draw_text(
            (PAGE_WIDTH - width) / 2.0,
            top,
            Font::Oblique,
            11.0,
            Rgb(0, 0, 0),
            &line,
        );
        self.cursor += 22.0;
    }

    fn figure(&mut self, desc: &str) {
        self.ensure(110.0);
        self.cursor += 7.0;
        let cursor = self.cursor;
        self.fill_rect(MARGIN, cursor, CONTENT_WIDTH, 90.0, Rgb(240, 240, 250));
        self.stroke_rect(MARGIN, cursor, CONTENT_WIDTH, 90.0, Rgb(200, 200, 200));
        let label = format!("[FIGURE: {desc}]");
        let width = text_width(&label, Font::Oblique, 10.0);
        self.draw_text(
            (PAGE_WIDTH - width) / 2.0,
            cursor + 40.0,
            Font::Oblique,
            10.0,
            Rgb(100, 100, 150),
            &label,
        );
        self.cursor += 100.0;
    }

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) {
        if headers.is_empty() {
            return;
        }
        let col_width = CONTENT_WIDTH / headers.len() as f64;
        let row_height = 18.0;
        self.cursor += 7.0;

        self.ensure(row_height * 2.0);
        let top = self.cursor;
        self.fill_rect(MARGIN, top, CONTENT_WIDTH, row_height, HEADLINE);
        for (i, header) in headers.iter().enumerate() {
            let x = MARGIN + i as f64 * col_width;
            self.draw_text(x + 4.0, top + 4.0, Font::Bold, 10.0, WHITE, header);
            self.stroke_rect(x, top, col_width, row_height, MUTED);
        }
        self.cursor += row_height;

        for (r, row) in rows.iter().enumerate() {
            self.ensure(row_height);
            let top = self.cursor;
            if r % 2 == 1 {
                self.fill_rect(MARGIN, top, CONTENT_WIDTH, row_height, ZEBRA);
            }
            for i in 0..headers.len() {
                let x = MARGIN + i as f64 * col_width;
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let clipped = clip(cell, Font::Regular, 10.0, col_width - 8.0);
                self.draw_text(x + 4.0, top + 5.0, Font::Regular, 10.0, INK, &clipped);
                self.stroke_rect(x, top, col_width, row_height, MUTED);
            }
            self.cursor += row_height;
        }
        self.cursor += 7.0;
    }

    /// Only the footer (and possibly header) has been drawn so far
    fn current_page_is_blank(&self) -> bool {
        self.cursor <= MARGIN
    }

    /// Assemble the object table, xref and trailer
    fn finish(mut self) -> Vec<u8> {
        let stream = std::mem::take(&mut self.current);
        self.pages.push(stream);

        // Object layout: 1 catalog, 2 pages, 3-6 fonts, then per page a
        // page object followed by its content stream.
        let font_objects = [
            ("/F1", "Helvetica"),
            ("/F2", "Helvetica-Bold"),
            ("/F3", "Helvetica-Oblique"),
            ("/F4", "Courier"),
        ];
        let first_page_obj = 3 + font_objects.len();
        let n_objects = first_page_obj + self.pages.len() * 2 - 1;

        let kids: Vec<String> = (0..self.pages.len())
            .map(|i| format!("{} 0 R", first_page_obj + i * 2))
            .collect();

        let mut bodies: Vec<(usize, String)> = Vec::new();
        bodies.push((1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()));
        bodies.push((
            2,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                self.pages.len()
            ),
        ));
        for (i, (_, base)) in font_objects.iter().enumerate() {
            bodies.push((
                3 + i,
                format!("<< /Type /Font /Subtype /Type1 /BaseFont /{base} >>"),
            ));
        }

        let font_dict: String = font_objects
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} {} 0 R", 3 + i))
            .collect::<Vec<_>>()
            .join(" ");

        for (i, stream) in self.pages.iter().enumerate() {
            let page_id = first_page_obj + i * 2;
            let content_id = page_id + 1;
            bodies.push((
                page_id,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << {font_dict} >> >> /Contents {content_id} 0 R >>"
                ),
            ));
            bodies.push((
                content_id,
                format!("<< /Length {} >>\nstream\n{}endstream", stream.len(), stream),
            ));
        }
        bodies.sort_by_key(|(id, _)| *id);

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = vec![0usize; n_objects + 1];
        for (id, body) in &bodies {
            offsets[*id] = out.len();
            out.extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
        }

        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", n_objects + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                n_objects + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }
}

fn text_width(text: &str, font: Font, size: f64) -> f64 {
    normalize_latin1(text).chars().count() as f64 * font.width_factor() * size
}

/// Greedy word-wrap against the approximate metrics
fn wrap(text: &str, font: Font, size: f64, width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in normalize_latin1(text).split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, font, size) <= width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Truncate a table cell to the column width
fn clip(text: &str, font: Font, size: f64, width: f64) -> String {
    let normalized = normalize_latin1(text);
    let max_chars = (width / (font.width_factor() * size)).floor() as usize;
    if normalized.chars().count() <= max_chars {
        normalized
    } else {
        normalized.chars().take(max_chars.saturating_sub(2)).collect::<String>() + ".."
    }
}

/// Map typographic punctuation to ASCII and drop non-latin-1 characters
fn normalize_latin1(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{2013}' | '\u{2014}' => Some('-'),
            '\u{2018}' | '\u{2019}' => Some('\''),
            '\u{201c}' | '\u{201d}' => Some('"'),
            '\u{2022}' => Some('-'),
            c if (c as u32) <= 0xFF => Some(c),
            _ => None,
        })
        .collect()
}

/// Escape a latin-1 string for a PDF literal string
fn escape_pdf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c => out.push(c),
        }
    }
    out
}
