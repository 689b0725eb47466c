//! Active G-code and M-code labelling
//!
//! The controller reports active modal codes as integers: G-codes scaled by
//! ten (`200` is G20, `591` is G59.1) and M-codes as-is, with `-1` filling
//! unused slots. This module maps them to canonical names and lays them out
//! as the rows of the active-code display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker shown for a code the table does not know
pub const UNKNOWN_CODE_MARKER: &str = "-";

/// Number of rows the active-code display shows
pub const DEFAULT_DISPLAY_ROWS: usize = 30;

/// Internal identifier to canonical G-code name
static GCODE_TABLE: &[(&str, &str)] = &[
    ("-1", "?"),
    ("0", "G0"),
    ("10", "G1"),
    ("20", "G2"),
    ("30", "G3"),
    ("40", "G4"),
    ("50", "G5"),
    ("51", "G5.1"),
    ("52", "G5.2"),
    ("53", "G5.3"),
    ("70", "G7"),
    ("80", "G8"),
    ("100", "G10"),
    ("170", "G17"),
    ("171", "G17.1"),
    ("180", "G18"),
    ("181", "G18.1"),
    ("190", "G19"),
    ("191", "G19.1"),
    ("200", "G20"),
    ("210", "G21"),
    ("280", "G28"),
    ("281", "G28.1"),
    ("300", "G30"),
    ("301", "G30.1"),
    ("330", "G33"),
    ("331", "G33.1"),
    ("382", "G38.2"),
    ("383", "G38.3"),
    ("384", "G38.4"),
    ("385", "G38.5"),
    ("400", "G40"),
    ("410", "G41"),
    ("411", "G41.1"),
    ("420", "G42"),
    ("421", "G42.1"),
    ("430", "G43"),
    ("431", "G43.1"),
    ("432", "G43.2"),
    ("490", "G49"),
    ("500", "G50"),
    ("510", "G51"),
    ("530", "G53"),
    ("540", "G54"),
    ("550", "G55"),
    ("560", "G56"),
    ("570", "G57"),
    ("580", "G58"),
    ("590", "G59"),
    ("591", "G59.1"),
    ("592", "G59.2"),
    ("593", "G59.3"),
    ("610", "G61"),
    ("611", "G61.1"),
    ("640", "G64"),
    ("730", "G73"),
    ("760", "G76"),
    ("800", "G80"),
    ("810", "G81"),
    ("820", "G82"),
    ("830", "G83"),
    ("840", "G84"),
    ("850", "G85"),
    ("860", "G86"),
    ("870", "G87"),
    ("880", "G88"),
    ("890", "G89"),
    ("900", "G90"),
    ("901", "G90.1"),
    ("910", "G91"),
    ("911", "G91.1"),
    ("920", "G92"),
    ("921", "G92.1"),
    ("922", "G92.2"),
    ("923", "G92.3"),
    ("930", "G93"),
    ("940", "G94"),
    ("950", "G95"),
    ("960", "G96"),
    ("970", "G97"),
    ("980", "G98"),
    ("990", "G99"),
];

/// Look up the canonical name for an identifier key such as `"200"`
pub fn lookup_gcode(key: &str) -> Option<&'static str> {
    GCODE_TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
}

/// Label for a reported G-code, falling back to the unknown marker
pub fn gcode_label(code: i64) -> &'static str {
    lookup_gcode(&code.to_string()).unwrap_or(UNKNOWN_CODE_MARKER)
}

/// Label for a reported M-code; negative slots are unused
pub fn mcode_label(code: i64) -> String {
    if code >= 0 {
        format!("M{}", code)
    } else {
        UNKNOWN_CODE_MARKER.to_string()
    }
}

/// One line of the active-code display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRow {
    /// Raw code as reported, empty for a blank row
    pub raw: String,
    /// Human readable label
    pub label: String,
}

impl CodeRow {
    fn blank() -> Self {
        Self {
            raw: String::new(),
            label: String::new(),
        }
    }
}

impl fmt::Display for CodeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}  {}", self.raw, self.label)
    }
}

/// Lay out the active-code display
///
/// G-codes fill the top rows, one blank row separates them from the M-codes,
/// and anything beyond `rows` is dropped. The result always has exactly
/// `rows` entries.
pub fn render_code_table(gcodes: &[i64], mcodes: &[i64], rows: usize) -> Vec<CodeRow> {
    let mut table = vec![CodeRow::blank(); rows];

    for (idx, code) in gcodes.iter().enumerate().take(rows) {
        table[idx] = CodeRow {
            raw: code.to_string(),
            label: gcode_label(*code).to_string(),
        };
    }

    let offset = gcodes.len() + 1;
    for (idx, code) in mcodes.iter().enumerate() {
        let row = idx + offset;
        if row >= rows {
            break;
        }
        table[row] = CodeRow {
            raw: code.to_string(),
            label: mcode_label(*code),
        };
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_codes() {
        assert_eq!(lookup_gcode("200"), Some("G20"));
        assert_eq!(lookup_gcode("591"), Some("G59.1"));
        assert_eq!(lookup_gcode("-1"), Some("?"));
        assert_eq!(lookup_gcode("12345"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(gcode_label(200), "G20");
        assert_eq!(gcode_label(-1), "?");
        assert_eq!(gcode_label(7777), UNKNOWN_CODE_MARKER);
        assert_eq!(mcode_label(5), "M5");
        assert_eq!(mcode_label(-1), UNKNOWN_CODE_MARKER);
    }

    #[test]
    fn test_table_layout() {
        let rows = render_code_table(&[0, 170], &[5, -1], 8);
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0].label, "G0");
        assert_eq!(rows[1].label, "G17");
        assert_eq!(rows[2], CodeRow::blank());
        assert_eq!(rows[3].label, "M5");
        assert_eq!(rows[4].label, "-");
        assert_eq!(rows[4].raw, "-1");
    }

    #[test]
    fn test_table_clips_to_rows() {
        let gcodes: Vec<i64> = (0..5).map(|i| i * 10).collect();
        let rows = render_code_table(&gcodes, &[1, 2, 3], 6);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[4].label, "G4");
        assert_eq!(rows[5], CodeRow::blank());

        let rows = render_code_table(&gcodes, &[], 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].label, "G2");
    }

    #[test]
    fn test_table_for_empty_status() {
        let rows = render_code_table(&[], &[], DEFAULT_DISPLAY_ROWS);
        assert!(rows.iter().all(|row| row.label.is_empty()));
    }
}
