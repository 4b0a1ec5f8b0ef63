//! Hugging Face Hub loaders for sequence classification checkpoints.
//!
//! - [`HfLoader`] - downloads one file of a repository, with retry
//! - [`ClassifierConfigLoader`] - `config.json` into an [`EncoderConfig`]
//! - [`TokenizerLoader`] - `tokenizer.json`, or a tokenizer rebuilt from the
//!   vocabulary files older repositories ship instead
//! - [`WeightsLoader`] - `model.safetensors`, falling back to `pytorch_model.bin`
//!
//! Files are cached by `hf-hub`, so only the first load of a repository hits
//! the network.

use crate::models::EncoderConfig;
use anyhow::Context;
use hf_hub::api::tokio::ApiBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokenizers::models::bpe::BPE;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::processors::roberta::RobertaProcessing;
use tokenizers::{Tokenizer, TruncationParams};

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub async fn load(&self) -> anyhow::Result<PathBuf> {
        let hf_api = ApiBuilder::new().with_chunk_size(None).build()?;
        let hf_api = hf_api.model(self.repo.clone());

        // Retry logic for lock acquisition failures
        let max_retries = 3;
        let mut attempt = 0;

        loop {
            match hf_api.get(self.filename.as_str()).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("Lock acquisition failed") && attempt < max_retries - 1 {
                        // Wait before retrying, with exponential backoff
                        let wait_time = std::time::Duration::from_millis(100 * (1 << attempt));
                        tracing::debug!(repo = %self.repo, file = %self.filename, ?wait_time, "hub lock busy, retrying");
                        tokio::time::sleep(wait_time).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to fetch `{}` from `{}`", self.filename, self.repo)));
                }
            }
        }
    }
}

pub struct ClassifierConfigLoader {
    pub config_file_loader: HfLoader,
}

impl ClassifierConfigLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            config_file_loader: HfLoader::new(repo, filename),
        }
    }

    pub async fn load(&self) -> anyhow::Result<EncoderConfig> {
        let config_path = self.config_file_loader.load().await?;
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;
        EncoderConfig::from_json(&content)
    }
}

#[derive(Debug, Clone)]
pub struct WeightsLoader {
    pub repo: String,
}

impl WeightsLoader {
    pub fn new(repo: &str) -> Self {
        Self { repo: repo.into() }
    }

    pub async fn load(&self) -> anyhow::Result<PathBuf> {
        match HfLoader::new(&self.repo, "model.safetensors").load().await {
            Ok(safetensors) => Ok(safetensors),
            Err(_) => HfLoader::new(&self.repo, "pytorch_model.bin")
                .load()
                .await
                .context(
                    "Model weights not found in repo. Expected `model.safetensors` or `pytorch_model.bin`",
                ),
        }
    }
}

#[derive(Deserialize, Default)]
struct TokenizerConfig {
    do_lower_case: Option<bool>,
}

#[derive(Clone)]
pub struct TokenizerLoader {
    pub repo: String,
}

impl TokenizerLoader {
    pub fn new(repo: &str) -> Self {
        Self { repo: repo.into() }
    }

    /// Load the repository's tokenizer, truncating to `max_length` tokens.
    pub async fn load(&self, max_length: usize) -> anyhow::Result<Tokenizer> {
        if let Ok(path) = HfLoader::new(&self.repo, "tokenizer.json").load().await {
            let mut tokenizer = Tokenizer::from_file(path).map_err(anyhow::Error::msg)?;
            configure(&mut tokenizer, max_length)?;
            return Ok(tokenizer);
        }

        tracing::debug!(repo = %self.repo, "no tokenizer.json, rebuilding from vocabulary files");

        if let Ok(vocab) = HfLoader::new(&self.repo, "vocab.txt").load().await {
            let lowercase = self.lowercase().await;
            return wordpiece_tokenizer(&vocab, lowercase, max_length);
        }

        let vocab = HfLoader::new(&self.repo, "vocab.json").load().await;
        let merges = HfLoader::new(&self.repo, "merges.txt").load().await;
        match (vocab, merges) {
            (Ok(vocab), Ok(merges)) => bpe_tokenizer(&vocab, &merges, max_length),
            _ => anyhow::bail!(
                "No tokenizer found in `{}`: expected tokenizer.json, vocab.txt or vocab.json + merges.txt",
                self.repo
            ),
        }
    }

    async fn lowercase(&self) -> bool {
        let config = match HfLoader::new(&self.repo, "tokenizer_config.json").load().await {
            Ok(path) => std::fs::read_to_string(path)
                .ok()
                .and_then(|content| serde_json::from_str::<TokenizerConfig>(&content).ok())
                .unwrap_or_default(),
            Err(_) => TokenizerConfig::default(),
        };
        config
            .do_lower_case
            .unwrap_or_else(|| self.repo.contains("uncased"))
    }
}

/// Single-sequence encoding: truncated, never padded.
fn configure(tokenizer: &mut Tokenizer, max_length: usize) -> anyhow::Result<()> {
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(anyhow::Error::msg)?;
    Ok(())
}

fn special_token(tokenizer: &Tokenizer, token: &str) -> anyhow::Result<(String, u32)> {
    let id = tokenizer
        .token_to_id(token)
        .ok_or_else(|| anyhow::anyhow!("vocabulary has no `{token}` token"))?;
    Ok((token.to_string(), id))
}

fn path_str(path: &Path) -> anyhow::Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("non UTF-8 path {:?}", path))
}

/// BERT-style WordPiece tokenizer from a `vocab.txt`.
pub fn wordpiece_tokenizer(
    vocab: &Path,
    lowercase: bool,
    max_length: usize,
) -> anyhow::Result<Tokenizer> {
    let model = WordPiece::from_file(path_str(vocab)?)
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(anyhow::Error::msg)?;

    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    let sep = special_token(&tokenizer, "[SEP]")?;
    let cls = special_token(&tokenizer, "[CLS]")?;
    tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

    configure(&mut tokenizer, max_length)?;
    Ok(tokenizer)
}

/// RoBERTa-style byte-level BPE tokenizer from `vocab.json` and `merges.txt`.
pub fn bpe_tokenizer(vocab: &Path, merges: &Path, max_length: usize) -> anyhow::Result<Tokenizer> {
    let model = BPE::from_file(path_str(vocab)?, path_str(merges)?)
        .build()
        .map_err(anyhow::Error::msg)?;

    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_pre_tokenizer(Some(ByteLevel::default().add_prefix_space(false)));
    tokenizer.with_decoder(Some(ByteLevel::default()));
    let sep = special_token(&tokenizer, "</s>")?;
    let cls = special_token(&tokenizer, "<s>")?;
    tokenizer.with_post_processor(Some(RobertaProcessing::new(sep, cls)));

    configure(&mut tokenizer, max_length)?;
    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vocab(dir: &Path, tokens: &[&str]) -> PathBuf {
        let path = dir.join("vocab.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        for token in tokens {
            writeln!(file, "{token}").unwrap();
        }
        path
    }

    #[test]
    fn wordpiece_tokenizer_wraps_with_cls_and_sep() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(
            dir.path(),
            &["[PAD]", "[UNK]", "[CLS]", "[SEP]", "great", "product"],
        );
        let tokenizer = wordpiece_tokenizer(&vocab, true, 16).unwrap();

        let encoding = tokenizer.encode("Great product", true).unwrap();
        assert_eq!(encoding.get_ids(), &[2, 4, 5, 3]);
        assert_eq!(encoding.get_attention_mask(), &[1, 1, 1, 1]);
    }

    #[test]
    fn long_input_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(dir.path(), &["[PAD]", "[UNK]", "[CLS]", "[SEP]", "word"]);
        let tokenizer = wordpiece_tokenizer(&vocab, true, 4).unwrap();

        let encoding = tokenizer.encode("word word word word word word", true).unwrap();
        assert_eq!(encoding.get_ids().len(), 4);
    }

    #[test]
    fn missing_special_tokens_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(dir.path(), &["[UNK]", "word"]);
        let err = wordpiece_tokenizer(&vocab, true, 8).unwrap_err();
        assert!(err.to_string().contains("[SEP]"));
    }
}
