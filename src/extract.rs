//! Multi-format text extraction (PDF, DOCX, PPTX, XLSX, TXT, HTML).
//!
//! Every extractor turns raw bytes into an ordered list of normalized
//! [`TextUnit`]s: one per PDF page, one per PPTX text run (tagged with its
//! slide), one per XLSX sheet, and a single unit for DOCX, TXT and HTML.
//! The document identifier is the SHA-256 of the raw bytes, so identical
//! content always maps to the same identifier.
//!
//! PDF image text (OCR) is layered on top by [`extract_with_ocr`].

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::DocQaError;
use crate::models::{Document, FileKind, TextUnit};
use crate::ocr::{self, OcrJob, OcrPolicy, OcrService};
use crate::progress::{Phase, ProgressEvent, ProgressReporter};

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\n\s*").expect("static regex"));

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

/// Collapse every whitespace run that contains a newline into a single `\n`
/// and trim the ends.
///
/// ```rust
/// use docqa::extract::normalize_text;
///
/// assert_eq!(normalize_text("  a \n\n \t b\nc  "), "a\nb\nc");
/// ```
pub fn normalize_text(text: &str) -> String {
    NEWLINE_RUN.replace_all(text, "\n").trim().to_string()
}

/// Hex SHA-256 of the raw bytes; the stable document identifier.
pub fn content_hash(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    hex::encode(hasher.finalize())
}

/// Extract a [`Document`] from raw bytes without OCR.
///
/// `raw` is only borrowed, so hashing and parsing both see the full content
/// no matter how often the caller re-reads it.
pub fn extract(raw: &[u8], name: &str, kind: FileKind) -> Result<Document> {
    let units = match kind {
        FileKind::Txt => single_unit(&String::from_utf8_lossy(raw)),
        FileKind::Docx => single_unit(&extract_docx(raw)?),
        FileKind::Pptx => extract_pptx(raw)?,
        FileKind::Xlsx => extract_xlsx(raw)?,
        FileKind::Pdf => extract_pdf(raw)?,
        FileKind::WebPage => single_unit(&html_to_text(&String::from_utf8_lossy(raw))),
    };
    tracing::debug!("extracted {} unit(s) from {} ({})", units.len(), name, kind);
    Ok(Document::new(
        content_hash(raw),
        name.to_string(),
        kind,
        units,
    ))
}

/// Read a file from disk and extract it according to its extension.
pub fn read_path(path: &Path) -> Result<Document> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let kind = FileKind::from_name(&name)?;
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    extract(&raw, &name, kind)
}

/// Walk a directory and return every file with a supported extension,
/// sorted for deterministic ordering.
pub fn collect_paths(root: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if FileKind::from_name(&name).is_ok() {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Extract a document and, for PDFs, append OCR text of embedded images.
///
/// Images are submitted one by one (waiting `submit_delay` after each), then
/// polled through the bounded state machine in [`ocr::resolve_jobs`]. Images
/// that fail to submit or never complete are dropped; the text layer is
/// always returned.
pub async fn extract_with_ocr(
    raw: &[u8],
    name: &str,
    kind: FileKind,
    service: Option<&dyn OcrService>,
    policy: &OcrPolicy,
    progress: &dyn ProgressReporter,
) -> Result<Document> {
    let mut doc = extract(raw, name, kind)?;
    let total_units = doc.units.len() as u64;
    progress.report(ProgressEvent {
        phase: Phase::Parsing,
        subject: name.to_string(),
        n: total_units,
        total: total_units,
    });

    let service = match (kind, service) {
        (FileKind::Pdf, Some(service)) => service,
        _ => return Ok(doc),
    };

    let images = match pdf_page_images(raw) {
        Ok(images) => images,
        Err(e) => {
            tracing::warn!("could not enumerate images in {}: {}", name, e);
            return Ok(doc);
        }
    };

    let mut jobs = Vec::new();
    for image in images {
        let Some(position) = doc
            .units
            .iter()
            .position(|u| u.unit_index == Some(image.page))
        else {
            continue;
        };
        match service.submit(&image.name, &image.data).await {
            Ok(uid) => jobs.push(OcrJob::new(uid, position)),
            Err(e) => tracing::warn!("OCR submit failed for {} in {}: {}", image.name, name, e),
        }
        if !policy.submit_delay.is_zero() {
            tokio::time::sleep(policy.submit_delay).await;
        }
    }

    if jobs.is_empty() {
        return Ok(doc);
    }

    let jobs = ocr::resolve_jobs(service, jobs, policy, name, progress).await;
    ocr::append_resolved(&mut doc, &jobs);
    Ok(doc)
}

fn single_unit(text: &str) -> Vec<TextUnit> {
    vec![TextUnit::new(normalize_text(text), None)]
}

// ============ PDF ============

fn extract_pdf(bytes: &[u8]) -> Result<Vec<TextUnit>, DocQaError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| DocQaError::extraction(FileKind::Pdf, e))?;
    Ok(pages
        .iter()
        .enumerate()
        .map(|(i, page)| TextUnit::new(normalize_text(page), Some(i as u32 + 1)))
        .collect())
}

/// An image embedded in a PDF page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page: u32,
    pub name: String,
    pub data: Vec<u8>,
}

/// Enumerate the raw image streams of every page.
pub fn pdf_page_images(bytes: &[u8]) -> Result<Vec<PageImage>, DocQaError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| DocQaError::extraction(FileKind::Pdf, e))?;
    let mut out = Vec::new();
    for (page, page_id) in doc.get_pages() {
        let images = match doc.get_page_images(page_id) {
            Ok(images) => images,
            Err(e) => {
                tracing::debug!("no images on page {}: {}", page, e);
                continue;
            }
        };
        for image in images {
            out.push(PageImage {
                page,
                name: format!("{}-{}", image.id.0, image.id.1),
                data: image.content.to_vec(),
            });
        }
    }
    Ok(out)
}

// ============ OOXML ============

fn open_archive(bytes: &[u8], kind: FileKind) -> Result<Archive<'_>, DocQaError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| DocQaError::extraction(kind, e))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    kind: FileKind,
) -> Result<Vec<u8>, DocQaError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| DocQaError::extraction(kind, format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| DocQaError::extraction(kind, e))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(DocQaError::extraction(
            kind,
            format!(
                "ZIP entry {} exceeds size limit ({} bytes)",
                name, MAX_XML_ENTRY_BYTES
            ),
        ));
    }
    Ok(out)
}

/// Entries named `<prefix><n>.xml`, sorted by `n`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .filter(|n| !n[prefix.len()..].contains('/'))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_docx(bytes: &[u8]) -> Result<String, DocQaError> {
    let mut archive = open_archive(bytes, FileKind::Docx)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", FileKind::Docx)?;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"p" => out.push('\n'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(DocQaError::extraction(FileKind::Docx, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<TextUnit>, DocQaError> {
    let mut archive = open_archive(bytes, FileKind::Pptx)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide");
    let mut units = Vec::new();
    for (i, name) in slide_names.iter().enumerate() {
        let xml = read_zip_entry_bounded(&mut archive, name, FileKind::Pptx)?;
        for run in extract_a_t_runs(&xml)? {
            let content = normalize_text(&run);
            if !content.is_empty() {
                units.push(TextUnit::new(content, Some(i as u32 + 1)));
            }
        }
    }
    Ok(units)
}

/// Text of each `<a:t>` run, in document order.
fn extract_a_t_runs(xml: &[u8]) -> Result<Vec<String>, DocQaError> {
    let mut runs = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    current = Some(String::new());
                }
            }
            Ok(quick_xml::events::Event::Text(te)) => {
                if let Some(run) = current.as_mut() {
                    run.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Some(run) = current.take() {
                        runs.push(run);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(DocQaError::extraction(FileKind::Pptx, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(runs)
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<TextUnit>, DocQaError> {
    let mut archive = open_archive(bytes, FileKind::Xlsx)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = match workbook_sheet_order(&mut archive)? {
        Some(names) if !names.is_empty() => names,
        _ => numbered_entries(&archive, "xl/worksheets/sheet"),
    };
    let mut units = Vec::new();
    for (i, name) in sheet_names.iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = read_zip_entry_bounded(&mut archive, name, FileKind::Xlsx)?;
        let text = extract_xlsx_sheet_rows(&sheet_xml, &shared_strings)?;
        units.push(TextUnit::new(normalize_text(&text), Some(i as u32 + 1)));
    }
    Ok(units)
}

/// Worksheet entry names in tab order, from `xl/workbook.xml` and its
/// relationships. `None` when the workbook part is missing.
fn workbook_sheet_order(archive: &mut Archive<'_>) -> Result<Option<Vec<String>>, DocQaError> {
    const WORKBOOK: &str = "xl/workbook.xml";
    const RELS: &str = "xl/_rels/workbook.xml.rels";
    if archive.by_name(WORKBOOK).is_err() || archive.by_name(RELS).is_err() {
        return Ok(None);
    }

    let workbook = read_zip_entry_bounded(archive, WORKBOOK, FileKind::Xlsx)?;
    let rel_ids = element_attributes(&workbook, b"sheet", b"id")?;

    let rels = read_zip_entry_bounded(archive, RELS, FileKind::Xlsx)?;
    let ids = element_attributes(&rels, b"Relationship", b"Id")?;
    let targets = element_attributes(&rels, b"Relationship", b"Target")?;
    let targets: std::collections::HashMap<String, String> =
        ids.into_iter().zip(targets).collect();

    let names = rel_ids
        .iter()
        .filter_map(|id| targets.get(id))
        .map(|target| match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{}", target),
        })
        .filter(|name| archive.index_for_name(name).is_some())
        .collect();
    Ok(Some(names))
}

/// Values of attribute `attr` (matched by local name) on every `element`,
/// in document order. Elements without the attribute yield an empty string
/// so parallel calls stay aligned.
fn element_attributes(xml: &[u8], element: &[u8], attr: &[u8]) -> Result<Vec<String>, DocQaError> {
    let mut values = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e))
                if e.local_name().as_ref() == element =>
            {
                let value = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == attr)
                    .map(|a| String::from_utf8_lossy(&a.value).to_string())
                    .unwrap_or_default();
                values.push(value);
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(DocQaError::extraction(FileKind::Xlsx, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(values)
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, DocQaError> {
    // Workbooks without any text cells have no shared string table.
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", FileKind::Xlsx)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(DocQaError::extraction(FileKind::Xlsx, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Render a worksheet as text: one line per row, cells separated by a space.
fn extract_xlsx_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String, DocQaError> {
    let mut lines: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cell_type: Vec<u8> = Vec::new();
    let mut in_value = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_type = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"t")
                        .map(|a| a.value.to_vec())
                        .unwrap_or_default();
                }
                // <v> holds the value; <t> holds inline string text.
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_value => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                let rendered = match cell_type.as_slice() {
                    _ if s.is_empty() => None,
                    b"s" => s
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i).cloned()),
                    b"b" => Some(if s == "1" { "TRUE" } else { "FALSE" }.to_string()),
                    _ => Some(s.to_string()),
                };
                if let Some(text) = rendered {
                    row.push(text);
                    cell_count += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => cell_type.clear(),
                b"row" => {
                    if !row.is_empty() {
                        lines.push(row.join(" "));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(DocQaError::extraction(FileKind::Xlsx, e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        lines.push(row.join(" "));
    }
    Ok(lines.join("\n"))
}

// ============ HTML ============

static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex"));

/// Visible text of an HTML page.
///
/// Inline markup joins into the surrounding sentence; block elements and
/// `<br>` end a line.
pub fn html_to_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let mut out = String::new();
    push_visible_text(document.root_element(), &mut out);
    normalize_text(&INLINE_SPACE.replace_all(&out, " "))
}

fn push_visible_text(element: scraper::ElementRef<'_>, out: &mut String) {
    use scraper::node::Node;

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = scraper::ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if matches!(name, "script" | "style" | "noscript" | "template") {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = is_block(name);
                if block {
                    out.push('\n');
                }
                push_visible_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "li"
            | "ul"
            | "ol"
            | "tr"
            | "table"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "title"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "nav"
            | "blockquote"
            | "pre"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn normalize_collapses_blank_lines() {
        assert_eq!(normalize_text("a\n\n\n\nb"), "a\nb");
        assert_eq!(normalize_text("a \r\n  b"), "a\nb");
        assert_eq!(normalize_text("   "), "");
        assert_eq!(normalize_text("keep  inner  spaces"), "keep  inner  spaces");
    }

    #[test]
    fn txt_is_single_unit_with_stable_hash() {
        let raw = b"Hello\n\n\nworld  ";
        let a = extract(raw, "a.txt", FileKind::Txt).unwrap();
        let b = extract(raw, "a.txt", FileKind::Txt).unwrap();
        assert_eq!(a.units, vec![TextUnit::new("Hello\nworld".into(), None)]);
        assert_eq!(a.identifier, b.identifier);
        assert_eq!(a.identifier.len(), 64);
    }

    #[test]
    fn invalid_pdf_is_extraction_error() {
        let err = extract(b"not a pdf", "x.pdf", FileKind::Pdf).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocQaError>(),
            Some(DocQaError::Extraction {
                kind: FileKind::Pdf,
                ..
            })
        ));
    }

    #[test]
    fn invalid_zip_is_extraction_error_for_docx() {
        let err = extract(b"not a zip", "x.docx", FileKind::Docx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocQaError>(),
            Some(DocQaError::Extraction {
                kind: FileKind::Docx,
                ..
            })
        ));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let raw = zip_with(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p></w:body></w:document>"#,
        )]);
        let doc = extract(&raw, "a.docx", FileKind::Docx).unwrap();
        assert_eq!(doc.units.len(), 1);
        assert_eq!(doc.units[0].content, "Hello world\nSecond & last");
        assert_eq!(doc.units[0].unit_index, None);
    }

    #[test]
    fn pptx_runs_are_tagged_with_slide_number() {
        let raw = zip_with(&[
            (
                "ppt/slides/slide2.xml",
                r#"<p:sld xmlns:a="a" xmlns:p="p"><a:r><a:t>Second slide</a:t></a:r></p:sld>"#,
            ),
            (
                "ppt/slides/slide1.xml",
                r#"<p:sld xmlns:a="a" xmlns:p="p"><a:r><a:t>Title</a:t></a:r><a:r><a:t> </a:t></a:r><a:r><a:t>Body run</a:t></a:r></p:sld>"#,
            ),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);
        let doc = extract(&raw, "deck.pptx", FileKind::Pptx).unwrap();
        let units: Vec<(&str, Option<u32>)> = doc
            .units
            .iter()
            .map(|u| (u.content.as_str(), u.unit_index))
            .collect();
        assert_eq!(
            units,
            vec![
                ("Title", Some(1)),
                ("Body run", Some(1)),
                ("Second slide", Some(2))
            ]
        );
    }

    #[test]
    fn xlsx_sheet_per_unit_with_rows() {
        let raw = zip_with(&[
            (
                "xl/sharedStrings.xml",
                r#"<sst><si><t>Revenue</t></si><si><r><t>Net </t></r><r><t>profit</t></r></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>1000</v></c></row><row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>250.5</v></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Inline</t></is></c><c r="B1" t="b"><v>1</v></c></row></sheetData></worksheet>"#,
            ),
        ]);
        let doc = extract(&raw, "book.xlsx", FileKind::Xlsx).unwrap();
        assert_eq!(doc.units.len(), 2);
        assert_eq!(doc.units[0].content, "Revenue 1000\nNet profit 250.5");
        assert_eq!(doc.units[0].unit_index, Some(1));
        assert_eq!(doc.units[1].content, "Inline TRUE");
    }

    #[test]
    fn xlsx_sheets_follow_workbook_tab_order() {
        let raw = zip_with(&[
            (
                "xl/workbook.xml",
                r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Summary" sheetId="2" r:id="rId2"/><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="worksheet" Target="/xl/worksheets/sheet2.xml"/></Relationships>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Data</t></is></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Summary</t></is></c></row></sheetData></worksheet>"#,
            ),
        ]);
        let doc = extract(&raw, "book.xlsx", FileKind::Xlsx).unwrap();
        let contents: Vec<&str> = doc.units.iter().map(|u| u.content.as_str()).collect();
        assert_eq!(contents, vec!["Summary", "Data"]);
        assert_eq!(doc.units[0].unit_index, Some(1));
    }

    #[test]
    fn xlsx_without_shared_strings() {
        let raw = zip_with(&[(
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData><row><c><v>42</v></c></row></sheetData></worksheet>"#,
        )]);
        let doc = extract(&raw, "n.xlsx", FileKind::Xlsx).unwrap();
        assert_eq!(doc.units[0].content, "42");
    }

    #[test]
    fn html_skips_scripts_and_styles() {
        let html = r#"<html><head><title>T</title><style>p{}</style></head>
            <body><h1>Heading</h1><script>var x = 1;</script><p>Para <b>bold</b></p></body></html>"#;
        assert_eq!(html_to_text(html), "T\nHeading\nPara bold");
    }

    #[test]
    fn html_inline_markup_stays_in_the_sentence() {
        assert_eq!(
            html_to_text("<p>Revenue was <b>1000</b> in 2023.</p>"),
            "Revenue was 1000 in 2023."
        );
        assert_eq!(
            html_to_text("<div>one<br>two</div><ul><li>a <i>b</i></li><li>c</li></ul>"),
            "one\ntwo\na b\nc"
        );
    }
}
