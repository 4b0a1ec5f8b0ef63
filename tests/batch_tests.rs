mod common;

use common::CountingLoader;
use sentiment_analyzer::session::batch::{BatchTable, ERROR_LABEL};
use sentiment_analyzer::{
    AnalyzerConfig, AnalyzerError, FailurePolicy, ModelHandle, SessionHandler,
};

fn session(loader: &CountingLoader, policy: FailurePolicy) -> SessionHandler {
    let config = AnalyzerConfig {
        failure_policy: policy,
        ..AnalyzerConfig::default()
    };
    SessionHandler::new(ModelHandle::new(loader.clone()), &config)
}

#[tokio::test]
async fn every_row_is_classified_in_order() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let session = session(&loader, FailurePolicy::Record);
    let table = BatchTable::from_reader("text\ngreat!\nterrible.\n\"\"\n".as_bytes())?;

    let report = session.analyze_batch(table).await?;

    assert_eq!(report.len(), 3);
    assert_eq!(report.failures(), 0);
    let labels: Vec<&str> = report.records().iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, ["POSITIVE", "NEGATIVE", "NEUTRAL"]);
    assert_eq!(report.records()[2].text, "");
    assert_eq!(report.headers(), ["text", "label", "score"]);
    assert_eq!(loader.predictions(), 3);
    Ok(())
}

#[test]
fn table_without_text_column_is_rejected() {
    let err = BatchTable::from_reader("review\ngreat!\n".as_bytes()).unwrap_err();
    match err {
        AnalyzerError::Schema { column } => assert_eq!(column, "text"),
        other => panic!("expected a schema error, got {other:?}"),
    }
}

#[tokio::test]
async fn recorded_failures_keep_the_batch_going() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let session = session(&loader, FailurePolicy::Record);
    let table = BatchTable::from_reader("id,text\n1,great!\n2,boom\n3,awful\n".as_bytes())?;

    let report = session.analyze_batch(table).await?;

    assert_eq!(report.len(), 3);
    assert_eq!(report.failures(), 1);
    assert_eq!(report.records()[1].label, ERROR_LABEL);
    assert_eq!(report.rows()[1], ["2", "boom", "ERROR", ""]);
    assert_eq!(report.records()[2].label, "NEGATIVE");
    Ok(())
}

#[tokio::test]
async fn abort_policy_names_the_failing_row() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let session = session(&loader, FailurePolicy::Abort);
    let table = BatchTable::from_reader("text\ngreat!\nboom\nawful\n".as_bytes())?;

    let err = session.analyze_batch(table).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::Inference { row: Some(2), .. }));
    assert_eq!(err.to_string(), "Model inference failed on row 2: provider exploded");
    assert_eq!(loader.predictions(), 2);
    Ok(())
}

#[tokio::test]
async fn existing_result_columns_are_overwritten() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let session = session(&loader, FailurePolicy::Record);
    let table = BatchTable::from_reader("label,text,score\nold,great!,0.1\n".as_bytes())?;

    let report = session.analyze_batch(table).await?;

    assert_eq!(report.headers(), ["label", "text", "score"]);
    assert_eq!(report.rows()[0], ["POSITIVE", "great!", "0.98"]);
    Ok(())
}

#[tokio::test]
async fn results_are_exported_as_csv() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("reviews.csv");
    let output = dir.path().join("sentiment_results.csv");
    std::fs::write(&input, "\u{feff}text,stars\n\"great, really\",5\nterrible.,1\n")?;

    let loader = CountingLoader::default();
    let session = session(&loader, FailurePolicy::Record);
    let report = session.analyze_batch(BatchTable::from_path(&input)?).await?;
    report.write_to_path(&output)?;

    let written = std::fs::read_to_string(&output)?;
    assert_eq!(
        written,
        "text,stars,label,score\n\"great, really\",5,POSITIVE,0.98\nterrible.,1,NEGATIVE,0.97\n"
    );
    Ok(())
}

#[tokio::test]
async fn empty_table_produces_an_empty_report() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let session = session(&loader, FailurePolicy::Record);

    let report = session.analyze_batch(BatchTable::from_reader("text\n".as_bytes())?).await?;
    assert!(report.is_empty());
    assert_eq!(report.to_csv()?, b"text,label,score\n");
    Ok(())
}

#[test]
fn extra_fields_are_reported_not_overwritten() {
    let err = BatchTable::from_reader("text\ngreat!,extra\n".as_bytes()).unwrap_err();
    assert!(matches!(err, AnalyzerError::RowWidth { row: 1, found: 2, expected: 1 }));
    assert_eq!(err.to_string(), "CSV row 1 has 2 fields but the header has 1.");
}
