//! Header normalization and composite lookup keys.
//!
//! NMS exports are inconsistent about header whitespace: doubled spaces,
//! trailing blanks, non-breaking spaces and a UTF-8 BOM on the first column
//! all occur. Every evaluator normalizes headers before looking columns up.

use crate::types::{RowView, Table};

/// Equipment identifier column shared by every measurement export.
pub const ME: &str = "ME";
/// Measured-object column shared by every measurement export.
pub const MEASURE_OBJECT: &str = "Measure Object";
/// Pre-derived composite key column in reference tables.
pub const MAPPING: &str = "Mapping";

/// Normalize one header: NBSP/BOM handling, whitespace runs collapsed, trimmed.
pub fn normalize_header(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '\u{feff}' && *c != '\u{200b}')
        .map(|c| if c == '\u{00a0}' { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reference-table header: like [`normalize_header`], but every other
/// non-ASCII character is dropped. Operator-maintained reference sheets pick
/// up stray symbols and full-width punctuation from spreadsheet editing.
pub fn normalize_reference_header(raw: &str) -> String {
    let ascii: String = raw
        .chars()
        .filter_map(|c| match c {
            '\u{00a0}' => Some(' '),
            c if c.is_ascii() => Some(c),
            _ => None,
        })
        .collect();
    normalize_header(&ascii)
}

/// Normalize every header of `table` in place.
pub fn normalize_headers(table: &mut Table) {
    for column in &mut table.columns {
        *column = normalize_header(column);
    }
}

/// Copy of `table` with normalized headers.
pub fn normalized(table: &Table) -> Table {
    let mut t = table.clone();
    normalize_headers(&mut t);
    t
}

/// Copy of a reference `table` with [`normalize_reference_header`] applied.
pub fn normalized_reference(table: &Table) -> Table {
    let mut t = table.clone();
    for column in &mut t.columns {
        *column = normalize_reference_header(column);
    }
    t
}

/// Composite key: trimmed equipment id followed by trimmed object id.
pub fn composite_key(equipment_id: &str, object_id: &str) -> String {
    format!("{}{}", equipment_id.trim(), object_id.trim())
}

/// Composite key of a measurement row (`ME` + `Measure Object`).
pub fn measurement_key(row: &RowView<'_>) -> String {
    composite_key(&row.text(ME), &row.text(MEASURE_OBJECT))
}

/// Reference key of a reference row (trimmed `Mapping`).
pub fn reference_key(row: &RowView<'_>) -> String {
    row.text(MAPPING).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    #[test]
    fn test_normalize_header_whitespace_variants() {
        assert_eq!(normalize_header("  Maximum   threshold "), "Maximum threshold");
        assert_eq!(normalize_header("Measure\u{00a0}Object"), "Measure Object");
        assert_eq!(normalize_header("\u{feff}ME"), "ME");
        assert_eq!(normalize_header("Value of Fan\tRotate Speed(Rps)"), "Value of Fan Rotate Speed(Rps)");
    }

    #[test]
    fn test_reference_headers_drop_non_ascii() {
        assert_eq!(normalize_reference_header("Site Name\u{2122}"), "Site Name");
        assert_eq!(normalize_reference_header("Maximum\u{00a0}threshold\u{ff08}\u{ff09}"), "Maximum threshold");
        assert_eq!(normalize_reference_header("\u{feff}Mapping"), "Mapping");
        assert_eq!(normalize_reference_header("Min \u{3000} Output Power(dBm)"), "Min Output Power(dBm)");
    }

    #[test]
    fn test_measurement_key_keeps_identifier_text() {
        let t = Table::from_rows(&[ME, MEASURE_OBJECT], [vec![Cell::from_raw("00123"), Cell::from_raw("1.10")]]);
        assert_eq!(measurement_key(&t.row(0)), "001231.10");
    }

    #[test]
    fn test_composite_key_trims_both_parts() {
        assert_eq!(composite_key(" ME1 ", "OBJ1  "), "ME1OBJ1");
    }

    #[test]
    fn test_measurement_key_uses_integral_rendering() {
        let t = Table::from_rows(&[ME, MEASURE_OBJECT], [vec![Cell::Number(101.0), Cell::text(" CPU-1")]]);
        assert_eq!(measurement_key(&t.row(0)), "101CPU-1");
    }

    #[test]
    fn test_normalized_leaves_original_untouched() {
        let t = Table::from_rows(&[" ME "], Vec::<Vec<Cell>>::new());
        let n = normalized(&t);
        assert_eq!(n.columns, vec!["ME"]);
        assert_eq!(t.columns, vec![" ME "]);
    }
}
