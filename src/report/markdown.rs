//! Markdown block parser
//!
//! Line-based parser for the subset of Markdown the report documents use:
//! fenced code blocks, pipe tables, three heading levels, bullets, `$$`
//! formula lines and `[FIGURE: ..]` placeholders. Everything else is plain
//! paragraph text. Unterminated code fences and tables flush at end of
//! input.

/// One parsed block
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading1(String),
    Heading2(String),
    Heading3(String),
    Paragraph(String),
    Bullet(String),
    Code(Vec<String>),
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Formula(String),
    Figure(String),
}

/// A parsed Markdown document
#[derive(Debug, Clone, Default)]
pub struct MarkdownDocument {
    pub blocks: Vec<Block>,
}

impl MarkdownDocument {
    /// Parse Markdown text into blocks
    pub fn parse(text: &str) -> Self {
        let mut blocks = Vec::new();
        let mut code: Option<Vec<String>> = None;
        let mut table: Vec<String> = Vec::new();

        for raw in text.lines() {
            let line = raw.trim();

            if line.starts_with("```") {
                match code.take() {
                    Some(lines) => blocks.push(Block::Code(lines)),
                    None => code = Some(Vec::new()),
                }
                continue;
            }
            if let Some(lines) = code.as_mut() {
                lines.push(line.to_string());
                continue;
            }

            if line.starts_with('|') {
                table.push(line.to_string());
                continue;
            }
            if !table.is_empty() {
                if let Some(block) = parse_table(&table) {
                    blocks.push(block);
                }
                table.clear();
            }

            if line.is_empty() {
                continue;
            }

            if let Some(text) = line.strip_prefix("# ") {
                blocks.push(Block::Heading1(text.to_string()));
            } else if let Some(text) = line.strip_prefix("## ") {
                blocks.push(Block::Heading2(text.to_string()));
            } else if let Some(text) = line.strip_prefix("### ") {
                blocks.push(Block::Heading3(text.to_string()));
            } else if let Some(rest) = line.strip_prefix("[FIGURE:") {
                let desc = rest.trim_end_matches(']').trim();
                blocks.push(Block::Figure(desc.to_string()));
            } else if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
                blocks.push(Block::Bullet(text.to_string()));
            } else if line.starts_with("$$") {
                blocks.push(Block::Formula(line.replace("$$", "").trim().to_string()));
            } else {
                blocks.push(Block::Paragraph(line.to_string()));
            }
        }

        // Flush whatever is still open at end of input
        if let Some(lines) = code {
            blocks.push(Block::Code(lines));
        }
        if !table.is_empty() {
            if let Some(block) = parse_table(&table) {
                blocks.push(block);
            }
        }

        Self { blocks }
    }
}

/// Split buffered pipe lines into a table; the second row is dropped when it
/// is a `---`/`:--` separator
fn parse_table(lines: &[String]) -> Option<Block> {
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|line| {
            line.split('|')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.len() < 2 {
        return None;
    }

    let headers = rows[0].clone();
    let is_separator = rows[1]
        .iter()
        .all(|cell| cell.chars().all(|c| c == '-' || c == ':'));
    let data = if is_separator { &rows[2..] } else { &rows[1..] };

    Some(Block::Table {
        headers,
        rows: data.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_bullets_and_paragraphs() {
        let doc = MarkdownDocument::parse(
            "# Scan Report\n\n## Summary\n\nAll clear.\n- no malware\n* no anomalies\n",
        );
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading1("Scan Report".to_string()),
                Block::Heading2("Summary".to_string()),
                Block::Paragraph("All clear.".to_string()),
                Block::Bullet("no malware".to_string()),
                Block::Bullet("no anomalies".to_string()),
            ]
        );
    }

    #[test]
    fn test_table_with_separator_row() {
        let doc = MarkdownDocument::parse(
            "| Family | Count |\n| --- | --- |\n| Trojan | 3 |\n| Spyware | 1 |\n\nDone.\n",
        );
        assert_eq!(doc.blocks.len(), 2);
        match &doc.blocks[0] {
            Block::Table { headers, rows } => {
                assert_eq!(headers, &["Family", "Count"]);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0], vec!["Trojan", "3"]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_code_fence_flushes() {
        let doc = MarkdownDocument::parse("```\nlet x = 1;\nlet y = 2;");
        assert_eq!(
            doc.blocks,
            vec![Block::Code(vec![
                "let x = 1;".to_string(),
                "let y = 2;".to_string()
            ])]
        );
    }

    #[test]
    fn test_table_at_eof_flushes() {
        let doc = MarkdownDocument::parse("| A | B |\n| 1 | 2 |");
        assert!(matches!(&doc.blocks[0], Block::Table { rows, .. } if rows.len() == 1));
    }

    #[test]
    fn test_formula_and_figure() {
        let doc = MarkdownDocument::parse("$$ s = 2^{-E[h]/c(n)} $$\n[FIGURE: PCA projection]\n");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Formula("s = 2^{-E[h]/c(n)}".to_string()),
                Block::Figure("PCA projection".to_string()),
            ]
        );
    }
}
