//! CSV table handling for batch uploads

use crate::models::{BatchRow, RiskCategory, REQUIRED_COLUMNS};
use serde_json::{Number, Value};

/// Name of the probability column appended to every output row
pub const PROBABILITY_COLUMN: &str = "risk_probability";

/// Name of the category column appended to every output row
pub const CATEGORY_COLUMN: &str = "risk_category";

/// Case-insensitive `.csv` suffix check
pub fn is_csv_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".csv")
}

/// Decode an upload as UTF-8, dropping invalid byte sequences
pub fn decode_upload(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(after.len());
                rest = &after[skip..];
            }
        }
    }
}

/// A parsed delimited table with a header row
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl CsvTable {
    /// Parse with a header row. Records may be shorter or longer than the header.
    pub fn parse(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, records })
    }

    /// Required columns absent from the header, in canonical order
    pub fn missing_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| !self.headers.iter().any(|h| h == *c))
            .map(|c| c.to_string())
            .collect()
    }

    /// First record carrying more cells than there are headers
    pub fn first_overlong_record(&self) -> Option<usize> {
        self.records.iter().position(|r| r.len() > self.headers.len())
    }

    /// Rows with every cell kept as text. Short records yield null for the
    /// missing cells; cells past the last header are dropped.
    pub fn text_rows(&self) -> Vec<BatchRow> {
        self.records
            .iter()
            .map(|record| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        let value = record
                            .get(i)
                            .map(|cell| Value::String(cell.clone()))
                            .unwrap_or(Value::Null);
                        (header.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Rows with per-column type inference.
    ///
    /// A column whose non-empty cells all parse as integers becomes integers
    /// (or floats if it has gaps); all-numeric columns become floats; anything
    /// else stays text. Empty cells become null.
    pub fn typed_rows(&self) -> Vec<BatchRow> {
        let kinds: Vec<ColumnKind> = (0..self.headers.len())
            .map(|i| self.column_kind(i))
            .collect();

        self.records
            .iter()
            .map(|record| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        let cell = record.get(i).map(String::as_str).unwrap_or("");
                        (header.clone(), kinds[i].convert(cell))
                    })
                    .collect()
            })
            .collect()
    }

    fn column_kind(&self, index: usize) -> ColumnKind {
        let mut has_gaps = false;
        let mut all_int = true;
        let mut all_float = true;

        for record in &self.records {
            let cell = record.get(index).map(|c| c.trim()).unwrap_or("");
            if cell.is_empty() {
                has_gaps = true;
                continue;
            }
            if cell.parse::<i64>().is_err() {
                all_int = false;
            }
            if cell.parse::<f64>().is_err() {
                all_float = false;
            }
            if !all_int && !all_float {
                return ColumnKind::Text;
            }
        }

        if all_int && !has_gaps {
            ColumnKind::Integer
        } else if all_int || all_float {
            ColumnKind::Float
        } else {
            ColumnKind::Text
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    fn convert(&self, cell: &str) -> Value {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match self {
            ColumnKind::Integer => trimmed
                .parse::<i64>()
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            ColumnKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnKind::Text => Value::String(cell.to_string()),
        }
    }
}

/// Append the two score columns to a row
pub fn append_scores(row: &mut BatchRow, probability: f64, category: RiskCategory) {
    let probability = Number::from_f64(probability)
        .map(Value::Number)
        .unwrap_or(Value::Null);
    row.insert(PROBABILITY_COLUMN.to_string(), probability);
    row.insert(
        CATEGORY_COLUMN.to_string(),
        Value::String(category.as_str().to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "patient_id,age,gender,diagnosis_code,lab_result,medication,length_of_stay\n\
                          1,64,Female,I10,131.5,\"Aspirin,Statins\",4\n\
                          2,81,Male,E11,160,Metformin,\n";

    #[test]
    fn test_csv_filename_check() {
        assert!(is_csv_filename("patients.csv"));
        assert!(is_csv_filename("PATIENTS.CSV"));
        assert!(!is_csv_filename("patients.csv.txt"));
        assert!(!is_csv_filename("patients.xlsx"));
        assert!(!is_csv_filename(""));
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        let bytes = b"age\xff,gender\n";
        assert_eq!(decode_upload(bytes), "age,gender\n");
        assert_eq!(decode_upload("é,ü".as_bytes()), "é,ü");
    }

    #[test]
    fn test_parse_keeps_order_and_quoted_cells() {
        let table = CsvTable::parse(SAMPLE).unwrap();
        assert_eq!(table.headers[0], "patient_id");
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0][5], "Aspirin,Statins");
        assert!(table.missing_columns().is_empty());
    }

    #[test]
    fn test_missing_columns_in_canonical_order() {
        let table = CsvTable::parse("lab_result,age\n120,60\n").unwrap();
        assert_eq!(
            table.missing_columns(),
            vec!["gender", "diagnosis_code", "medication"]
        );

        let empty = CsvTable::parse("").unwrap();
        assert_eq!(empty.missing_columns().len(), 5);
    }

    #[test]
    fn test_text_rows_pass_cells_through() {
        let table = CsvTable::parse("age,gender,extra\n60,Female\n70,Male,x,y\n").unwrap();
        let rows = table.text_rows();
        assert_eq!(rows[0]["age"], json!("60"));
        assert_eq!(rows[0]["extra"], Value::Null);
        assert_eq!(rows[1].len(), 3);
        assert_eq!(table.first_overlong_record(), Some(1));
    }

    #[test]
    fn test_typed_rows_infer_column_types() {
        let table = CsvTable::parse(SAMPLE).unwrap();
        let rows = table.typed_rows();
        assert_eq!(rows[0]["patient_id"], json!(1));
        assert_eq!(rows[0]["age"], json!(64));
        assert_eq!(rows[1]["lab_result"], json!(160.0));
        assert_eq!(rows[0]["gender"], json!("Female"));
        // integer column with a gap becomes float
        assert_eq!(rows[0]["length_of_stay"], json!(4.0));
        assert_eq!(rows[1]["length_of_stay"], Value::Null);
    }

    #[test]
    fn test_append_scores_goes_last() {
        let table = CsvTable::parse(SAMPLE).unwrap();
        let mut row = table.text_rows().remove(0);
        append_scores(&mut row, 0.42, RiskCategory::Medium);
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys[keys.len() - 2], PROBABILITY_COLUMN);
        assert_eq!(keys[keys.len() - 1], CATEGORY_COLUMN);
        assert_eq!(row[CATEGORY_COLUMN], json!("Medium"));
    }
}
