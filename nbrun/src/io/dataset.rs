//! CSV datasets read by scripts through `read_csv(path)`.

use std::path::Path;

use anyhow::{Context, Result};

/// Raw CSV contents: header row plus string cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read a CSV file with a header row. Ragged rows are accepted.
pub fn read_csv(path: &Path) -> Result<CsvData> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open csv {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("read csv header {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("read csv row {} of {}", idx + 1, path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(CsvData { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_ragged_rows() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("data.csv");
        std::fs::write(&path, "AGE, GENDER\n63,M\n71\n").expect("write");

        let data = read_csv(&path).expect("read");
        assert_eq!(data.headers, vec!["AGE".to_string(), "GENDER".to_string()]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[1], vec!["71".to_string()]);
    }

    #[test]
    fn missing_file_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_csv(&temp.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("open csv"));
    }
}
