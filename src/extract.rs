//! Content extraction: raw uploaded bytes → ordered text units.
//!
//! Dispatch is by declared type only, never by sniffing content. PDF yields
//! one unit per page; CSV/XLS/XLSX yield one unit per data row. Parser
//! failures propagate whole: no partial unit sequence is ever returned.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::IngestError;
use crate::models::{FileType, TextUnit};

/// Extract the ordered text units for a blob of the declared type.
///
/// Ordinals are contiguous from 0 in extraction order. Fails with
/// [`IngestError::UnsupportedType`] when the declared type is outside the
/// supported closed set, and [`IngestError::Extraction`] on parser errors.
pub fn extract_units(bytes: &[u8], declared_type: &str) -> Result<Vec<TextUnit>, IngestError> {
    let file_type = FileType::parse(declared_type)
        .ok_or_else(|| IngestError::UnsupportedType(declared_type.to_string()))?;

    match file_type {
        FileType::Pdf => extract_pdf(bytes),
        FileType::Csv => extract_csv(bytes),
        FileType::Xls | FileType::Xlsx => extract_workbook(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<TextUnit>, IngestError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| IngestError::Extraction(e.to_string()))?;

    let units = pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextUnit {
            ordinal: i as i64,
            text,
            metadata_json: format!("{{\"page\":{}}}", i + 1),
        })
        .collect();

    Ok(units)
}

/// One unit per data row, rendered as `header: value` lines so column
/// names survive into the embedded text.
fn extract_csv(bytes: &[u8]) -> Result<Vec<TextUnit>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Extraction(e.to_string()))?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut units = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| IngestError::Extraction(e.to_string()))?;
        let fields: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        units.push(TextUnit {
            ordinal: i as i64,
            text: render_row(&headers, &fields),
            metadata_json: format!("{{\"row\":{}}}", i + 1),
        });
    }

    Ok(units)
}

/// XLS and XLSX share one path: calamine auto-detects the workbook format.
/// Rows are numbered across sheets so ordinals stay contiguous per file.
fn extract_workbook(bytes: &[u8]) -> Result<Vec<TextUnit>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Extraction(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut units = Vec::new();
    let mut ordinal: i64 = 0;

    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| IngestError::Extraction(e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(cell_to_string).collect())
            .unwrap_or_default();

        for (i, row) in rows.enumerate() {
            let fields: Vec<String> = row.iter().map(cell_to_string).collect();
            if fields.iter().all(|f| f.is_empty()) {
                continue;
            }
            units.push(TextUnit {
                ordinal,
                text: render_row(&headers, &fields),
                metadata_json: format!(
                    "{{\"sheet\":{},\"row\":{}}}",
                    serde_json::to_string(&sheet_name).unwrap_or_else(|_| "\"\"".into()),
                    i + 1
                ),
            });
            ordinal += 1;
        }
    }

    Ok(units)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn render_row(headers: &[String], fields: &[String]) -> String {
    let mut lines = Vec::with_capacity(fields.len());
    for (i, value) in fields.iter().enumerate() {
        match headers.get(i) {
            Some(h) if !h.is_empty() => lines.push(format!("{}: {}", h, value)),
            _ => lines.push(value.clone()),
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn col_letter(i: usize) -> char {
        (b'A' + i as u8) as char
    }

    fn sheet_xml(rows: &[Vec<&str>]) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
             <sheetData>",
        );
        for (r, row) in rows.iter().enumerate() {
            xml.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, value) in row.iter().enumerate() {
                let cell_ref = format!("{}{}", col_letter(c), r + 1);
                if value.is_empty() {
                    xml.push_str(&format!("<c r=\"{}\"/>", cell_ref));
                } else if value.parse::<f64>().is_ok() {
                    xml.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", cell_ref, value));
                } else {
                    xml.push_str(&format!(
                        "<c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                        cell_ref, value
                    ));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }

    /// Minimal OOXML workbook: one worksheet part per named sheet, inline
    /// strings so no sharedStrings part is needed.
    fn xlsx_with_sheets(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();

            let mut content_types = String::from(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
                 <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
                 <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
                 <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>",
            );
            let mut workbook = String::from(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
                 xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets>",
            );
            let mut workbook_rels = String::from(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
            );
            for (i, (name, _)) in sheets.iter().enumerate() {
                let n = i + 1;
                content_types.push_str(&format!(
                    "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
                    n
                ));
                workbook.push_str(&format!(
                    "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
                    name, n, n
                ));
                workbook_rels.push_str(&format!(
                    "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
                    n, n
                ));
            }
            content_types.push_str("</Types>");
            workbook.push_str("</sheets></workbook>");
            workbook_rels.push_str("</Relationships>");

            zip.start_file("[Content_Types].xml", opts).unwrap();
            zip.write_all(content_types.as_bytes()).unwrap();
            zip.start_file("_rels/.rels", opts).unwrap();
            zip.write_all(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
                 <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
                 </Relationships>"
                    .as_bytes(),
            )
            .unwrap();
            zip.start_file("xl/workbook.xml", opts).unwrap();
            zip.write_all(workbook.as_bytes()).unwrap();
            zip.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
            zip.write_all(workbook_rels.as_bytes()).unwrap();
            for (i, (_, rows)) in sheets.iter().enumerate() {
                zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), opts)
                    .unwrap();
                zip.write_all(sheet_xml(rows).as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unsupported_type_returns_error() {
        let err = extract_units(b"anything", "docx").unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedType(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_units(b"not a pdf", "pdf").unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
    }

    #[test]
    fn invalid_workbook_returns_error() {
        let err = extract_units(b"not a zip or biff", "xlsx").unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
    }

    #[test]
    fn csv_one_unit_per_row_with_contiguous_ordinals() {
        let csv = b"name,total\nwidget,10\ngadget,25\nsprocket,7\n";
        let units = extract_units(csv, "csv").unwrap();
        assert_eq!(units.len(), 3);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.ordinal, i as i64);
        }
        assert_eq!(units[0].text, "name: widget\ntotal: 10");
        assert_eq!(units[2].text, "name: sprocket\ntotal: 7");
        assert_eq!(units[1].metadata_json, "{\"row\":2}");
    }

    #[test]
    fn csv_headers_only_yields_no_units() {
        let units = extract_units(b"name,total\n", "csv").unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn csv_ragged_rows_are_tolerated() {
        let csv = b"a,b\n1,2\n3\n";
        let units = extract_units(csv, "csv").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].text, "a: 3");
    }

    #[test]
    fn render_row_falls_back_without_headers() {
        let fields = vec!["x".to_string(), "y".to_string()];
        assert_eq!(render_row(&[], &fields), "x\ny");
    }

    #[test]
    fn xlsx_one_unit_per_data_row_with_ordinals_across_sheets() {
        let bytes = xlsx_with_sheets(&[
            (
                "Inventory",
                vec![
                    vec!["name", "total"],
                    vec!["widget", "10"],
                    vec!["", ""],
                    vec!["gadget", "25"],
                ],
            ),
            ("Cities", vec![vec!["city"], vec!["paris"]]),
        ]);

        let units = extract_units(&bytes, "xlsx").unwrap();
        assert_eq!(units.len(), 3);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.ordinal, i as i64);
        }
        assert_eq!(units[0].text, "name: widget\ntotal: 10");
        assert_eq!(units[1].text, "name: gadget\ntotal: 25");
        assert_eq!(units[2].text, "city: paris");
        // The all-empty row is skipped but still counted in the source row
        // number carried by the metadata.
        assert_eq!(units[1].metadata_json, "{\"sheet\":\"Inventory\",\"row\":3}");
        assert_eq!(units[2].metadata_json, "{\"sheet\":\"Cities\",\"row\":1}");
    }

    #[test]
    fn xlsx_headers_only_yields_no_units() {
        let bytes = xlsx_with_sheets(&[("Empty", vec![vec!["a", "b"]])]);
        let units = extract_units(&bytes, "xlsx").unwrap();
        assert!(units.is_empty());
    }
}
