//! Batch mode: classify every row of a CSV table.
//!
//! The table must have a `text` column. The output keeps every input column
//! and adds (or overwrites) `label` and `score`.

use super::handle::ModelHandle;
use crate::core::{AnalyzerError, FailurePolicy};
use crate::pipelines::sentiment_analysis_pipeline::SentimentAnalysisPipeline;
use std::io;
use std::path::Path;

pub const TEXT_COLUMN: &str = "text";
pub const LABEL_COLUMN: &str = "label";
pub const SCORE_COLUMN: &str = "score";
/// Label written for rows whose classification failed.
pub const ERROR_LABEL: &str = "ERROR";
/// File name offered for the exported results.
pub const DEFAULT_EXPORT_NAME: &str = "sentiment_results.csv";
/// Rows shown by the previews.
pub const PREVIEW_ROWS: usize = 5;

const PREVIEW_CELL_WIDTH: usize = 40;

/// A parsed input table.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    text_column: usize,
}

impl BatchTable {
    /// Parse CSV with a header row. Fails with [`AnalyzerError::Schema`]
    /// before reading any data row when there is no `text` column. Short rows
    /// are padded with empty cells; rows wider than the header are rejected
    /// with [`AnalyzerError::RowWidth`].
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, AnalyzerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if let Some(first) = headers.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }

        let text_column = headers
            .iter()
            .position(|h| h == TEXT_COLUMN)
            .ok_or_else(|| AnalyzerError::Schema {
                column: TEXT_COLUMN.to_string(),
            })?;

        let width = headers.len();
        let rows = reader
            .records()
            .enumerate()
            .map(|(index, record)| -> Result<Vec<String>, AnalyzerError> {
                let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
                if row.len() > width {
                    return Err(AnalyzerError::RowWidth {
                        row: index + 1,
                        found: row.len(),
                        expected: width,
                    });
                }
                row.resize(width, String::new());
                Ok(row)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            headers,
            rows,
            text_column,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(io::BufReader::new(file))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `text` cell of every row, in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[self.text_column].as_str())
    }

    pub fn preview(&self, limit: usize) -> String {
        render_table(&self.headers, &self.rows, limit)
    }
}

/// One classified row.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub text: String,
    pub label: String,
    pub score: Option<f32>,
}

impl BatchRecord {
    pub fn is_error(&self) -> bool {
        self.label == ERROR_LABEL && self.score.is_none()
    }
}

/// The classified table.
#[derive(Debug, Clone)]
pub struct BatchReport {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    records: Vec<BatchRecord>,
    failures: usize,
}

impl BatchReport {
    fn new(table: BatchTable, records: Vec<BatchRecord>) -> Self {
        let BatchTable {
            mut headers,
            mut rows,
            ..
        } = table;

        let label_column = column_or_append(&mut headers, LABEL_COLUMN);
        let score_column = column_or_append(&mut headers, SCORE_COLUMN);
        let width = headers.len();

        for (row, record) in rows.iter_mut().zip(&records) {
            row.resize(width, String::new());
            row[label_column] = record.label.clone();
            row[score_column] = record.score.map(|s| s.to_string()).unwrap_or_default();
        }

        let failures = records.iter().filter(|r| r.is_error()).count();
        Self {
            headers,
            rows,
            records,
            failures,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn records(&self) -> &[BatchRecord] {
        &self.records
    }

    /// Number of rows recorded as `ERROR`.
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The results as UTF-8 CSV with a header row.
    pub fn to_csv(&self) -> Result<Vec<u8>, AnalyzerError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| AnalyzerError::Io(e.into_error()))
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        std::fs::write(path, self.to_csv()?)?;
        Ok(())
    }

    pub fn preview(&self, limit: usize) -> String {
        render_table(&self.headers, &self.rows, limit)
    }
}

fn column_or_append(headers: &mut Vec<String>, name: &str) -> usize {
    match headers.iter().position(|h| h == name) {
        Some(index) => index,
        None => {
            headers.push(name.to_string());
            headers.len() - 1
        }
    }
}

/// Classify every row of `table` in order.
///
/// With [`FailurePolicy::Record`] a failed row becomes an `ERROR` row with an
/// empty score and the batch continues. With [`FailurePolicy::Abort`] the
/// first failure is returned, tagged with its 1-based row number.
pub async fn run_batch(
    handle: &ModelHandle,
    classifier: &SentimentAnalysisPipeline,
    table: BatchTable,
    policy: FailurePolicy,
) -> Result<BatchReport, AnalyzerError> {
    let total = table.len();
    tracing::info!(rows = total, model_id = classifier.model_id(), "classifying batch");

    let mut records = Vec::with_capacity(total);
    for (index, text) in table.texts().enumerate() {
        let row = index + 1;
        let record = match handle.classify(classifier, text).await {
            Ok(result) => BatchRecord {
                text: text.to_string(),
                label: result.label,
                score: result.score,
            },
            Err(err) => match policy {
                FailurePolicy::Abort => return Err(err.at_row(row)),
                FailurePolicy::Record => {
                    tracing::warn!(row, error = %err, "row failed, recording ERROR");
                    BatchRecord {
                        text: text.to_string(),
                        label: ERROR_LABEL.to_string(),
                        score: None,
                    }
                }
            },
        };
        tracing::debug!(row, total, label = %record.label, "row classified");
        records.push(record);
    }

    let report = BatchReport::new(table, records);
    tracing::info!(rows = report.len(), failures = report.failures(), "batch complete");
    Ok(report)
}

fn render_table(headers: &[String], rows: &[Vec<String>], limit: usize) -> String {
    let clip = |cell: &str| -> String {
        let single_line = cell.replace(['\n', '\r'], " ");
        if single_line.chars().count() > PREVIEW_CELL_WIDTH {
            let mut clipped: String = single_line.chars().take(PREVIEW_CELL_WIDTH - 3).collect();
            clipped.push_str("...");
            clipped
        } else {
            single_line
        }
    };

    let shown: Vec<Vec<String>> = rows
        .iter()
        .take(limit)
        .map(|row| row.iter().map(|cell| clip(cell.as_str())).collect())
        .collect();
    let header_cells: Vec<String> = headers.iter().map(|h| clip(h.as_str())).collect();

    let mut widths: Vec<usize> = header_cells.iter().map(|h| h.chars().count()).collect();
    for row in &shown {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = format_row(&header_cells);
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &shown {
        out.push('\n');
        out.push_str(&format_row(row));
    }
    if rows.len() > limit {
        out.push_str(&format!("\n... {} more rows", rows.len() - limit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_finds_text_column() {
        let table = BatchTable::from_reader("id,text\n1,great!\n2,\"terrible, really\"\n".as_bytes())
            .unwrap();
        assert_eq!(table.headers(), &["id", "text"]);
        assert_eq!(table.texts().collect::<Vec<_>>(), vec!["great!", "terrible, really"]);
    }

    #[test]
    fn missing_text_column_is_a_schema_error() {
        let err = BatchTable::from_reader("id,Text\n1,great!\n".as_bytes()).unwrap_err();
        match err {
            AnalyzerError::Schema { column } => assert_eq!(column, "text"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_wider_than_the_header_are_rejected() {
        let err = BatchTable::from_reader("text\ngreat!\nfine,extra\n".as_bytes()).unwrap_err();
        match err {
            AnalyzerError::RowWidth {
                row,
                found,
                expected,
            } => assert_eq!((row, found, expected), (2, 2, 1)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_input_is_a_schema_error() {
        assert!(matches!(
            BatchTable::from_reader("".as_bytes()),
            Err(AnalyzerError::Schema { .. })
        ));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let table = BatchTable::from_reader("\u{feff}text\nhello\n".as_bytes()).unwrap();
        assert_eq!(table.headers(), &["text"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn short_rows_read_missing_text_as_empty() {
        let table = BatchTable::from_reader("id,text\n1\n2,fine\n".as_bytes()).unwrap();
        assert_eq!(table.texts().collect::<Vec<_>>(), vec!["", "fine"]);
    }

    #[test]
    fn report_appends_label_and_score() {
        let table = BatchTable::from_reader("id,text\n1,great!\n2,bad\n".as_bytes()).unwrap();
        let report = BatchReport::new(
            table,
            vec![
                BatchRecord {
                    text: "great!".into(),
                    label: "POSITIVE".into(),
                    score: Some(0.5),
                },
                BatchRecord {
                    text: "bad".into(),
                    label: ERROR_LABEL.into(),
                    score: None,
                },
            ],
        );

        assert_eq!(report.failures(), 1);
        let csv = String::from_utf8(report.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "id,text,label,score\n1,great!,POSITIVE,0.5\n2,bad,ERROR,\n");
    }

    #[test]
    fn existing_label_column_is_overwritten() {
        let table = BatchTable::from_reader("label,text\nold,fine\n".as_bytes()).unwrap();
        let report = BatchReport::new(
            table,
            vec![BatchRecord {
                text: "fine".into(),
                label: "POSITIVE".into(),
                score: Some(0.25),
            }],
        );
        assert_eq!(report.headers(), &["label", "text", "score"]);
        assert_eq!(report.rows()[0], vec!["POSITIVE", "fine", "0.25"]);
    }

    #[test]
    fn export_quotes_fields_that_need_it() {
        let table = BatchTable::from_reader("text\n\"a, \"\"quoted\"\" text\"\n".as_bytes()).unwrap();
        let report = BatchReport::new(
            table,
            vec![BatchRecord {
                text: "a, \"quoted\" text".into(),
                label: "NEGATIVE".into(),
                score: Some(1.0),
            }],
        );
        let csv = String::from_utf8(report.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "text,label,score\n\"a, \"\"quoted\"\" text\",NEGATIVE,1\n");
    }

    #[test]
    fn preview_limits_rows() {
        let mut input = String::from("text\n");
        for i in 0..8 {
            input.push_str(&format!("row {i}\n"));
        }
        let table = BatchTable::from_reader(input.as_bytes()).unwrap();
        let preview = table.preview(PREVIEW_ROWS);
        assert!(preview.starts_with("text"));
        assert!(preview.contains("row 4"));
        assert!(!preview.contains("row 5"));
        assert!(preview.ends_with("... 3 more rows"));
    }
}
