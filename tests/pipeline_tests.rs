// Downloads real checkpoints or calls the hosted API; run with
// `cargo test -- --ignored`.

use sentiment_analyzer::pipelines::sentiment_analysis_pipeline::*;

#[tokio::test]
#[ignore = "downloads model weights"]
async fn default_local_model() -> anyhow::Result<()> {
    let pipeline = SentimentAnalysisPipelineBuilder::preset(SentimentPreset::DistilbertSst2)
        .cpu()
        .build()
        .await?;

    let positive = pipeline.classify("I love this product!").await?;
    assert_eq!(positive.label, "POSITIVE");
    assert!(positive.score.unwrap_or_default() > 0.9);

    let negative = pipeline.classify("The food was awful and cold.").await?;
    assert_eq!(negative.label, "NEGATIVE");
    assert!(negative.score.unwrap_or_default() > 0.9);
    Ok(())
}

#[tokio::test]
#[ignore = "downloads model weights"]
async fn every_preset_loads() -> anyhow::Result<()> {
    for preset in SentimentPreset::ALL {
        let pipeline = SentimentAnalysisPipelineBuilder::preset(preset)
            .cpu()
            .build()
            .await?;
        let ranked = pipeline
            .predictions("It's okay, not the best but functional.")
            .await?;
        assert!(ranked.len() >= 2, "{preset:?} returned {ranked:?}");
        let total: f32 = ranked.iter().filter_map(|r| r.score).sum();
        assert!((total - 1.0).abs() < 1e-3);
    }
    Ok(())
}

#[tokio::test]
#[ignore = "calls the Hugging Face Inference API"]
async fn inference_api_backend() -> anyhow::Result<()> {
    let pipeline = SentimentAnalysisPipelineBuilder::preset(SentimentPreset::DistilbertSst2)
        .backend(Backend::Api)
        .api_token(std::env::var("HF_TOKEN").ok())
        .build()
        .await?;

    let result = pipeline.classify("I love this product!").await?;
    assert_eq!(result.label, "POSITIVE");
    Ok(())
}
