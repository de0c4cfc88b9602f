//! Label and value formatting helpers shared by the scrape units.

use chrono::NaiveDateTime;

use crate::row::Cell;

/// Characters stripped from counter names before they become metric names.
const STRIPPED: &[char] = &[':', '(', ')', '*', '/', '%', '<', '>', '=', '&', '-'];

/// Turns a counter name into a metric name fragment: strip punctuation,
/// collapse whitespace runs to `_`, lowercase.
///
/// `"Data File(s) Size (KB)"` becomes `data_files_size_kb`.
pub fn label_name(s: &str) -> String {
    let stripped: String = s.chars().filter(|c| !STRIPPED.contains(c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Suffix after the last occurrence of `sep`, or the whole string.
pub fn tail_of(s: &str, sep: char) -> &str {
    s.rsplit(sep).next().unwrap_or(s)
}

pub fn format_time(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Text column as a label value; null reads as the empty string.
pub fn text_label(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        _ => String::new(),
    }
}

/// Integer column as a decimal label value; null reads as the empty string.
pub fn int_label(cell: &Cell) -> String {
    match cell {
        Cell::Int(v) => v.to_string(),
        _ => String::new(),
    }
}

/// Timestamp column as a label value; null reads as the empty string.
pub fn time_label(cell: &Cell) -> String {
    match cell {
        Cell::DateTime(t) => format_time(t),
        _ => String::new(),
    }
}

/// Binary column as a lowercase hex label value; null reads as the empty string.
pub fn hex_label(cell: &Cell) -> String {
    match cell {
        Cell::Bytes(b) => hex(b),
        _ => String::new(),
    }
}

/// Boolean column as "yes"/"no"; null reads as "no".
pub fn bool_label(cell: &Cell) -> String {
    match cell {
        Cell::Bool(true) => "yes".to_string(),
        _ => "no".to_string(),
    }
}

pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_name_strips_and_collapses() {
        assert_eq!(label_name("Buffer cache hit ratio"), "buffer_cache_hit_ratio");
        assert_eq!(label_name("Data File(s) Size (KB)"), "data_files_size_kb");
        assert_eq!(label_name("Average Wait Time (ms)"), "average_wait_time_ms");
        assert_eq!(label_name("CPU usage %"), "cpu_usage");
        assert_eq!(label_name("SQL Re-Compilations/sec"), "sql_recompilationssec");
    }

    #[test]
    fn tail_of_takes_last_segment() {
        assert_eq!(tail_of("MSSQL$PROD:Buffer Manager", ':'), "Buffer Manager");
        assert_eq!(tail_of("no separator", ':'), "no separator");
    }

    #[test]
    fn nullable_labels_read_as_empty() {
        assert_eq!(text_label(&Cell::Null), "");
        assert_eq!(int_label(&Cell::Null), "");
        assert_eq!(time_label(&Cell::Null), "");
        assert_eq!(hex_label(&Cell::Null), "");
        assert_eq!(bool_label(&Cell::Null), "no");
    }

    #[test]
    fn hex_is_lowercase_two_digit() {
        assert_eq!(hex(&[0x0a, 0xff, 0x00]), "0aff00");
    }
}
