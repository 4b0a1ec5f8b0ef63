mod common;

use common::CountingLoader;
use sentiment_analyzer::console::render_state;
use sentiment_analyzer::{
    AnalyzerConfig, AnalyzerError, ModelHandle, ModelSelector, SessionHandler, SessionState,
};

fn session(loader: &CountingLoader) -> SessionHandler {
    SessionHandler::new(ModelHandle::new(loader.clone()), &AnalyzerConfig::default())
}

#[tokio::test]
async fn blank_text_never_reaches_the_provider() {
    let loader = CountingLoader::default();
    let mut session = session(&loader);

    for text in ["", "   ", "\n\t "] {
        let err = session.submit(text).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation));
        assert_eq!(err.to_string(), "Please enter some text first.");
        assert_eq!(session.state(), &SessionState::Idle);
    }
    assert_eq!(loader.loads(), 0);
    assert_eq!(loader.predictions(), 0);
}

#[tokio::test]
async fn submit_produces_a_result() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let mut session = session(&loader);

    let state = session.submit("The food was awful and cold.").await?;
    match state {
        SessionState::Result { top, ranked } => {
            assert_eq!(top.label, "NEGATIVE");
            assert_eq!(ranked.len(), 2);
        }
        other => panic!("expected a result, got {other:?}"),
    }
    assert_eq!(render_state(session.state()), "Label: NEGATIVE\nScore: 0.970");

    session.submit("I love this product!").await?;
    assert_eq!(loader.loads(), 1);
    assert_eq!(loader.predictions(), 2);
    Ok(())
}

#[tokio::test]
async fn missing_score_renders_as_not_available() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let mut session = session(&loader);

    session.submit("a mystery").await?;
    assert_eq!(render_state(session.state()), "Label: POSITIVE\nScore: N/A");
    Ok(())
}

#[tokio::test]
async fn inference_failure_is_a_state_not_an_error() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let mut session = session(&loader);

    let state = session.submit("boom").await?;
    assert_eq!(
        state,
        &SessionState::Failed("Model inference failed: provider exploded".into())
    );

    // The next submit starts fresh.
    session.submit("great!").await?;
    assert!(matches!(session.state(), SessionState::Result { .. }));
    Ok(())
}

#[tokio::test]
async fn failed_model_switch_keeps_the_previous_model() -> anyhow::Result<()> {
    let loader = CountingLoader::default();
    let mut session = session(&loader);
    let original = session.selector().clone();

    let err = session
        .select_model(ModelSelector::new("missing/model"))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::ModelLoad { .. }));
    assert_eq!(session.selector(), &original);

    session.select_model(ModelSelector::new("someone/custom")).await?;
    assert_eq!(session.selector().identifier(), "someone/custom");
    assert!(!session.needs_resolution().await);
    Ok(())
}

#[tokio::test]
async fn unresolvable_model_leaves_the_session_idle() {
    let loader = CountingLoader::default();
    let config = AnalyzerConfig {
        model: ModelSelector::new("missing/model"),
        ..AnalyzerConfig::default()
    };
    let mut session = SessionHandler::new(ModelHandle::new(loader.clone()), &config);

    let err = session.submit("great!").await.unwrap_err();
    assert!(matches!(err, AnalyzerError::ModelLoad { .. }));
    assert_eq!(session.state(), &SessionState::Idle);
    assert_eq!(loader.predictions(), 0);
}
