// xlsx.rs
// Minimal Office Open XML spreadsheet codec: read the first worksheet, write a one-sheet workbook.

use std::io::{Cursor, Read, Write};

use roxmltree::{Document, Node};
use thiserror::Error;
use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::SimpleFileOptions};

use crate::calc::to_number;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("not a valid xlsx archive: {0}")]
    Zip(#[from] ZipError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed xml: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("workbook part missing: {0}")]
    MissingPart(String),
    #[error("cell reference {0} is past the last column (XFD)")]
    ColumnOutOfRange(String),
}

/// Column count of a worksheet (`A`..`XFD`).
pub const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    /// Numbers pass through; text goes through `to_number`.
    pub fn as_number(&self) -> f64 {
        match self {
            Cell::Empty => 0.0,
            Cell::Text(s) => to_number(s),
            Cell::Number(n) => *n,
            Cell::Bool(b) => f64::from(u8::from(*b)),
        }
    }
}

pub type Row = Vec<Cell>;

/// One data row keyed by its header cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Cell)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Cell)>) -> Self {
        Self { fields }
    }

    /// Header lookup, trimmed and case-insensitive. Empty cells count as missing.
    pub fn get(&self, header: &str) -> Option<&Cell> {
        let wanted = header.trim();
        self.fields
            .iter()
            .find(|(h, c)| h.trim().eq_ignore_ascii_case(wanted) && !c.is_empty())
            .map(|(_, c)| c)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, c)| c.is_empty())
    }
}

/// Parses workbook bytes and returns the first sheet as records.
pub fn read_records(bytes: &[u8]) -> Result<Vec<Record>, XlsxError> {
    Ok(sheet_to_records(read_first_sheet(bytes)?))
}

/// First row is the header; fully empty rows are dropped.
pub fn sheet_to_records(rows: Vec<Row>) -> Vec<Record> {
    let mut iter = rows.into_iter();
    let header: Vec<String> = match iter.next() {
        Some(row) => row.iter().map(Cell::as_text).collect(),
        None => return Vec::new(),
    };

    iter.map(|row| {
        let mut cells = row.into_iter();
        Record::new(
            header
                .iter()
                .map(|h| (h.clone(), cells.next().unwrap_or_default()))
                .collect(),
        )
    })
    .filter(|r| !r.is_empty())
    .collect()
}

pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Row>, XlsxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let shared = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_path = first_sheet_path(&mut archive)?;
    let sheet_xml = read_part(&mut archive, &sheet_path)?
        .ok_or_else(|| XlsxError::MissingPart(sheet_path.clone()))?;
    parse_sheet(&sheet_xml, &shared)
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, XlsxError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut out = String::new();
            file.read_to_string(&mut out)?;
            Ok(Some(out))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn first_sheet_path<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<String, XlsxError> {
    const FALLBACK: &str = "xl/worksheets/sheet1.xml";

    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(FALLBACK.to_string());
    };
    let doc = Document::parse(&workbook)?;
    let rel_id = doc
        .descendants()
        .find(|n| n.tag_name().name() == "sheet")
        .and_then(|sheet| {
            sheet
                .attributes()
                .find(|a| a.name() == "id")
                .map(|a| a.value().to_string())
        });
    let Some(rel_id) = rel_id else {
        return Ok(FALLBACK.to_string());
    };

    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(FALLBACK.to_string());
    };
    let rels_doc = Document::parse(&rels)?;
    let target = rels_doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
        .find(|n| n.attribute("Id") == Some(rel_id.as_str()))
        .and_then(|n| n.attribute("Target"));

    Ok(match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{t}"),
        None => FALLBACK.to_string(),
    })
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, XlsxError> {
    let doc = Document::parse(xml)?;
    Ok(doc
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "si")
        .map(|si| string_item_text(&si))
        .collect())
}

/// Concatenates `t` runs, skipping phonetic hints.
fn string_item_text(node: &Node) -> String {
    node.descendants()
        .filter(|n| n.tag_name().name() == "t")
        .filter(|n| !n.ancestors().any(|a| a.tag_name().name() == "rPh"))
        .filter_map(|n| n.text())
        .collect()
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Row>, XlsxError> {
    let doc = Document::parse(xml)?;
    let mut rows = Vec::new();

    for row_node in doc.descendants().filter(|n| n.tag_name().name() == "row") {
        let mut row: Row = Vec::new();
        for (position, c) in row_node
            .children()
            .filter(|n| n.tag_name().name() == "c")
            .enumerate()
        {
            let col = match c.attribute("r") {
                Some(reference) => column_index(reference)?,
                None => None,
            }
            .unwrap_or(position.max(row.len()));
            if col >= MAX_COLUMNS {
                return Err(XlsxError::ColumnOutOfRange(format!("#{}", col + 1)));
            }
            if row.len() <= col {
                row.resize(col + 1, Cell::Empty);
            }
            row[col] = parse_cell(&c, shared);
        }
        rows.push(row);
    }

    Ok(rows)
}

fn parse_cell(c: &Node, shared: &[String]) -> Cell {
    let value = c
        .children()
        .find(|n| n.tag_name().name() == "v")
        .and_then(|v| v.text())
        .map(str::to_string);

    match c.attribute("t") {
        Some("s") => value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|i| shared.get(i))
            .map(|s| Cell::Text(s.clone()))
            .unwrap_or_default(),
        Some("inlineStr") => c
            .children()
            .find(|n| n.tag_name().name() == "is")
            .map(|is| Cell::Text(string_item_text(&is)))
            .unwrap_or_default(),
        Some("b") => value.map(|v| Cell::Bool(v.trim() == "1")).unwrap_or_default(),
        Some("str") => value.map(Cell::Text).unwrap_or_default(),
        Some("e") => Cell::Empty,
        _ => match value {
            Some(v) => v
                .trim()
                .parse::<f64>()
                .map(Cell::Number)
                .unwrap_or(Cell::Text(v)),
            None => Cell::Empty,
        },
    }
}

/// `B7` -> 1. References past `XFD` are rejected.
fn column_index(reference: &str) -> Result<Option<usize>, XlsxError> {
    let mut idx = 0usize;
    let mut seen = false;
    for ch in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        seen = true;
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        idx = idx
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .filter(|i| *i <= MAX_COLUMNS)
            .ok_or_else(|| XlsxError::ColumnOutOfRange(reference.to_string()))?;
    }
    Ok(seen.then(|| idx - 1))
}

/// 0 -> `A`, 27 -> `AB`.
fn column_name(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// Sheet names are capped at 31 chars and may not contain `[]:*?/\`.
fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(&sanitize_sheet_name(sheet_name))
    )
}

fn cell_xml(reference: &str, cell: &Cell, style: u8) -> String {
    let s = if style > 0 {
        format!(r#" s="{style}""#)
    } else {
        String::new()
    };
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(text) => format!(
            r#"<c r="{reference}"{s} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            escape_xml(text)
        ),
        Cell::Number(n) if n.is_finite() => {
            format!(r#"<c r="{reference}"{s}><v>{n}</v></c>"#)
        }
        Cell::Number(_) => String::new(),
        Cell::Bool(b) => format!(
            r#"<c r="{reference}"{s} t="b"><v>{}</v></c>"#,
            u8::from(*b)
        ),
    }
}

fn sheet_xml(header: &[String], rows: &[Row]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header_row: Row = header.iter().map(|h| Cell::text(h.as_str())).collect();
    for (r, (row, style)) in std::iter::once((&header_row, 1u8))
        .chain(rows.iter().map(|row| (row, 0u8)))
        .enumerate()
    {
        let row_no = r + 1;
        out.push_str(&format!(r#"<row r="{row_no}">"#));
        for (c, cell) in row.iter().enumerate() {
            out.push_str(&cell_xml(&format!("{}{row_no}", column_name(c)), cell, style));
        }
        out.push_str("</row>");
    }

    out.push_str("</sheetData></worksheet>");
    out
}

/// Builds a single-sheet workbook; the header row is bold.
pub fn write_workbook(
    sheet_name: &str,
    header: &[String],
    rows: &[Row],
) -> Result<Vec<u8>, XlsxError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(header, rows)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_and_indexes() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("AB12").unwrap(), Some(27));
        assert_eq!(column_index("XFD1").unwrap(), Some(MAX_COLUMNS - 1));
        assert_eq!(column_index("12").unwrap(), None);
    }

    #[test]
    fn references_past_the_last_column_are_rejected() {
        assert!(matches!(
            column_index("XFE1"),
            Err(XlsxError::ColumnOutOfRange(_))
        ));
        assert!(matches!(
            column_index("ZZZZZZZZZZZZZZ1"),
            Err(XlsxError::ColumnOutOfRange(_))
        ));

        let err = parse_sheet(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="ZZZZZZZZZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, XlsxError::ColumnOutOfRange(_)));
        assert_eq!(
            crate::error::AppError::from(err).status(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn written_workbook_reads_back_as_records() {
        let header = vec!["NAME".to_string(), "AMOUNT".to_string(), "NOTE".to_string()];
        let rows = vec![
            vec![Cell::text("Jane & Co"), Cell::Number(1500.5), Cell::Empty],
            vec![Cell::Empty, Cell::Empty, Cell::Empty],
            vec![Cell::text("John"), Cell::Number(20.0), Cell::Bool(true)],
        ];
        let bytes = write_workbook("Loans", &header, &rows).unwrap();
        let records = read_records(&bytes).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some(&Cell::text("Jane & Co")));
        assert_eq!(records[0].get(" Amount ").map(Cell::as_number), Some(1500.5));
        assert_eq!(records[0].get("NOTE"), None);
        assert_eq!(records[1].get("NOTE"), Some(&Cell::Bool(true)));
    }

    #[test]
    fn shared_strings_and_sparse_cells() {
        let shared = parse_shared_strings(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>NAME</t></si><si><r><t>Mary </t></r><r><t>Wanjiru</t></r></si></sst>"#,
        )
        .unwrap();
        assert_eq!(shared, vec!["NAME", "Mary Wanjiru"]);

        let rows = parse_sheet(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="str"><v>X</v></c></row><row r="2"><c r="A2" t="s"><v>1</v></c><c r="C2"><v>42</v></c></row></sheetData></worksheet>"#,
            &shared,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], Cell::Empty);
        assert_eq!(rows[1][0], Cell::text("Mary Wanjiru"));
        assert_eq!(rows[1][2], Cell::Number(42.0));
    }

    #[test]
    fn cell_conversions() {
        assert_eq!(Cell::text(" 1,200 ").as_number(), 1200.0);
        assert_eq!(Cell::Number(12.0).as_text(), "12");
        assert_eq!(Cell::Number(12.5).as_text(), "12.5");
        assert!(Cell::text("  ").is_empty());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(read_first_sheet(b"not a zip").is_err());
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sanitize_sheet_name("2024/2025"), "20242025");
        assert_eq!(sanitize_sheet_name(""), "Sheet1");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), 31);
    }
}
