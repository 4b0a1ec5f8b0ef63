//! BERT-family sequence classifiers on Candle.
//!
//! Most sentiment checkpoints on the Hub are one of three encoder layouts that
//! differ only in weight names, position handling and the classification head:
//!
//! | `model_type`                          | Head                                   |
//! |---------------------------------------|----------------------------------------|
//! | `bert`                                | pooler (`tanh`) then `classifier`      |
//! | `distilbert`                          | `pre_classifier` (`relu`) then `classifier` |
//! | `roberta`, `xlm-roberta`, `camembert` | `classifier.dense` (`tanh`) then `classifier.out_proj` |
//!
//! All of them are post-norm encoders, so a single [`SequenceClassifier`]
//! covers them, parameterized by [`Architecture`].

use crate::loaders::{ClassifierConfigLoader, TokenizerLoader, WeightsLoader};
use crate::pipelines::sentiment_analysis_pipeline::{ClassificationResult, SentimentAnalysisModel};
use anyhow::{Context, Error as E};
use candle_core::{DType, Device, IndexOp, Result, Tensor, D};
use candle_nn::{embedding, linear, ops::softmax, Embedding, LayerNorm, Linear, Module, VarBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokenizers::Tokenizer;

const DEFAULT_LAYER_NORM_EPS: f64 = 1e-12;
const MASKED_SCORE: f64 = -10_000.0;

/// Weight layout of a supported checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Bert,
    DistilBert,
    Roberta,
}

impl Architecture {
    pub fn from_model_type(model_type: &str) -> anyhow::Result<Self> {
        match model_type {
            "bert" => Ok(Architecture::Bert),
            "distilbert" => Ok(Architecture::DistilBert),
            "roberta" | "xlm-roberta" | "camembert" => Ok(Architecture::Roberta),
            other => anyhow::bail!(
                "unsupported model architecture `{other}` (expected bert, distilbert or roberta)"
            ),
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Architecture::Bert => "bert",
            Architecture::DistilBert => "distilbert",
            Architecture::Roberta => "roberta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenAct {
    /// Exact (erf) GELU, what the Hub configs call `gelu`.
    Gelu,
    /// Tanh approximation of GELU.
    GeluApproximate,
    Relu,
}

impl HiddenAct {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "gelu" => Ok(HiddenAct::Gelu),
            "gelu_new" | "gelu_fast" | "gelu_pytorch_tanh" => Ok(HiddenAct::GeluApproximate),
            "relu" => Ok(HiddenAct::Relu),
            other => anyhow::bail!("unsupported activation `{other}`"),
        }
    }
}

impl Module for HiddenAct {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            HiddenAct::Gelu => xs.gelu_erf(),
            HiddenAct::GeluApproximate => xs.gelu(),
            HiddenAct::Relu => xs.relu(),
        }
    }
}

/// `config.json` as written by the different architectures. DistilBERT uses
/// its own field names for the same hyper-parameters.
#[derive(Deserialize)]
struct RawEncoderConfig {
    model_type: String,
    vocab_size: usize,
    hidden_size: Option<usize>,
    dim: Option<usize>,
    num_hidden_layers: Option<usize>,
    n_layers: Option<usize>,
    num_attention_heads: Option<usize>,
    n_heads: Option<usize>,
    intermediate_size: Option<usize>,
    hidden_dim: Option<usize>,
    hidden_act: Option<String>,
    activation: Option<String>,
    max_position_embeddings: usize,
    type_vocab_size: Option<usize>,
    layer_norm_eps: Option<f64>,
    pad_token_id: Option<usize>,
    #[serde(default)]
    id2label: HashMap<String, String>,
    num_labels: Option<usize>,
}

/// Normalized hyper-parameters of a sequence classification checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub architecture: Architecture,
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub hidden_act: HiddenAct,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    pub layer_norm_eps: f64,
    pub pad_token_id: usize,
    /// Label names indexed by class id.
    pub labels: Vec<String>,
}

impl EncoderConfig {
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let raw: RawEncoderConfig = serde_json::from_str(content)
            .map_err(|e| E::msg(format!("Failed to parse model config: {e}")))?;
        let architecture = Architecture::from_model_type(&raw.model_type)?;

        let required = |value: Option<usize>, name: &str| {
            value.ok_or_else(|| E::msg(format!("model config is missing `{name}`")))
        };
        let hidden_act = match raw.hidden_act.or(raw.activation) {
            Some(name) => HiddenAct::parse(&name)?,
            None => HiddenAct::Gelu,
        };

        Ok(Self {
            architecture,
            vocab_size: raw.vocab_size,
            hidden_size: required(raw.hidden_size.or(raw.dim), "hidden_size")?,
            num_hidden_layers: required(raw.num_hidden_layers.or(raw.n_layers), "num_hidden_layers")?,
            num_attention_heads: required(
                raw.num_attention_heads.or(raw.n_heads),
                "num_attention_heads",
            )?,
            intermediate_size: required(
                raw.intermediate_size.or(raw.hidden_dim),
                "intermediate_size",
            )?,
            hidden_act,
            max_position_embeddings: raw.max_position_embeddings,
            type_vocab_size: raw.type_vocab_size.unwrap_or(0),
            layer_norm_eps: raw.layer_norm_eps.unwrap_or(DEFAULT_LAYER_NORM_EPS),
            pad_token_id: raw.pad_token_id.unwrap_or(0),
            labels: ordered_labels(raw.id2label, raw.num_labels)?,
        })
    }

    /// First position id used by the embeddings. RoBERTa counts positions
    /// from `pad_token_id + 1`.
    pub fn position_offset(&self) -> usize {
        match self.architecture {
            Architecture::Roberta => self.pad_token_id + 1,
            _ => 0,
        }
    }

    /// Longest token sequence the position embeddings can address.
    pub fn max_sequence_length(&self) -> usize {
        self.max_position_embeddings
            .saturating_sub(self.position_offset())
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}

fn ordered_labels(
    id2label: HashMap<String, String>,
    num_labels: Option<usize>,
) -> anyhow::Result<Vec<String>> {
    if id2label.is_empty() {
        let count = num_labels.unwrap_or(2);
        return Ok((0..count).map(|i| format!("LABEL_{i}")).collect());
    }

    let mut indexed = id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .map_err(|_| E::msg(format!("invalid class id `{id}` in id2label")))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    indexed.sort_by_key(|(id, _)| *id);

    for (expected, (id, _)) in indexed.iter().enumerate() {
        if *id != expected {
            anyhow::bail!("id2label is not contiguous: missing class id {expected}");
        }
    }
    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

/// Layer norm that also accepts the `gamma` / `beta` names of older
/// TensorFlow-converted checkpoints.
fn layer_norm(size: usize, eps: f64, vb: VarBuilder) -> Result<LayerNorm> {
    let (weight, bias) = match (vb.get(size, "weight"), vb.get(size, "bias")) {
        (Ok(weight), Ok(bias)) => (weight, bias),
        (Err(err), _) | (_, Err(err)) => match (vb.get(size, "gamma"), vb.get(size, "beta")) {
            (Ok(weight), Ok(bias)) => (weight, bias),
            _ => return Err(err),
        },
    };
    Ok(LayerNorm::new(weight, bias, eps))
}

#[derive(Debug, Clone)]
struct Embeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Option<Embedding>,
    layer_norm: LayerNorm,
    position_offset: usize,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &EncoderConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        let token_type_embeddings = if config.type_vocab_size > 0 {
            Some(embedding(
                config.type_vocab_size,
                hidden,
                vb.pp("token_type_embeddings"),
            )?)
        } else {
            None
        };

        Ok(Self {
            word_embeddings: embedding(config.vocab_size, hidden, vb.pp("word_embeddings"))?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                hidden,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings,
            layer_norm: layer_norm(hidden, config.layer_norm_eps, vb.pp("LayerNorm"))?,
            position_offset: config.position_offset(),
        })
    }

    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_batch, seq_len) = input_ids.dims2()?;
        let start = self.position_offset as u32;
        let position_ids =
            Tensor::arange(start, start + seq_len as u32, input_ids.device())?.unsqueeze(0)?;

        let mut embeddings = input_ids
            .apply(&self.word_embeddings)?
            .broadcast_add(&position_ids.apply(&self.position_embeddings)?)?;
        if let Some(token_type_embeddings) = &self.token_type_embeddings {
            // Single-segment input: every token has type 0.
            let token_type_ids = input_ids.zeros_like()?;
            embeddings = (embeddings + token_type_ids.apply(token_type_embeddings)?)?;
        }
        embeddings.apply(&self.layer_norm)
    }
}

#[derive(Debug, Clone)]
struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    num_attention_heads: usize,
    attention_head_size: usize,
}

impl SelfAttention {
    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden_size) = hidden_states.dims3()?;
        let split_heads = |xs: Tensor| {
            xs.reshape((
                batch,
                seq_len,
                self.num_attention_heads,
                self.attention_head_size,
            ))?
            .transpose(1, 2)?
            .contiguous()
        };

        let q = split_heads(hidden_states.apply(&self.query)?)?;
        let k = split_heads(hidden_states.apply(&self.key)?)?;
        let v = split_heads(hidden_states.apply(&self.value)?)?;

        let scale = (self.attention_head_size as f64).powf(-0.5);
        let q = (q * scale)?;

        let attention_scores = q.matmul(&k.transpose(D::Minus2, D::Minus1)?.contiguous()?)?;
        let attention_scores = attention_scores.broadcast_add(attention_mask)?;
        let attention_probs = softmax(&attention_scores, D::Minus1)?;

        attention_probs
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, seq_len, hidden_size))?
            .apply(&self.output)
    }
}

#[derive(Debug, Clone)]
struct EncoderLayer {
    attention: SelfAttention,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
    activation: HiddenAct,
}

impl EncoderLayer {
    fn load(vb: VarBuilder, config: &EncoderConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        let inner = config.intermediate_size;
        let eps = config.layer_norm_eps;
        let num_attention_heads = config.num_attention_heads;
        let attention_head_size = hidden / num_attention_heads;

        match config.architecture {
            Architecture::DistilBert => {
                let attn = vb.pp("attention");
                let ffn = vb.pp("ffn");
                Ok(Self {
                    attention: SelfAttention {
                        query: linear(hidden, hidden, attn.pp("q_lin"))?,
                        key: linear(hidden, hidden, attn.pp("k_lin"))?,
                        value: linear(hidden, hidden, attn.pp("v_lin"))?,
                        output: linear(hidden, hidden, attn.pp("out_lin"))?,
                        num_attention_heads,
                        attention_head_size,
                    },
                    attention_norm: layer_norm(hidden, eps, vb.pp("sa_layer_norm"))?,
                    intermediate: linear(hidden, inner, ffn.pp("lin1"))?,
                    output: linear(inner, hidden, ffn.pp("lin2"))?,
                    output_norm: layer_norm(hidden, eps, vb.pp("output_layer_norm"))?,
                    activation: config.hidden_act,
                })
            }
            Architecture::Bert | Architecture::Roberta => {
                let attn = vb.pp("attention");
                let attn_self = attn.pp("self");
                let attn_out = attn.pp("output");
                Ok(Self {
                    attention: SelfAttention {
                        query: linear(hidden, hidden, attn_self.pp("query"))?,
                        key: linear(hidden, hidden, attn_self.pp("key"))?,
                        value: linear(hidden, hidden, attn_self.pp("value"))?,
                        output: linear(hidden, hidden, attn_out.pp("dense"))?,
                        num_attention_heads,
                        attention_head_size,
                    },
                    attention_norm: layer_norm(hidden, eps, attn_out.pp("LayerNorm"))?,
                    intermediate: linear(hidden, inner, vb.pp("intermediate").pp("dense"))?,
                    output: linear(inner, hidden, vb.pp("output").pp("dense"))?,
                    output_norm: layer_norm(hidden, eps, vb.pp("output").pp("LayerNorm"))?,
                    activation: config.hidden_act,
                })
            }
        }
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let attended = self.attention.forward(hidden_states, attention_mask)?;
        let hidden_states = (hidden_states + attended)?.apply(&self.attention_norm)?;

        let feed_forward = hidden_states
            .apply(&self.intermediate)?
            .apply(&self.activation)?
            .apply(&self.output)?;
        (hidden_states + feed_forward)?.apply(&self.output_norm)
    }
}

#[derive(Debug, Clone)]
enum ClassificationHead {
    /// BERT: pooler dense + tanh over `[CLS]`.
    Pooled { pooler: Linear, classifier: Linear },
    /// DistilBERT: pre-classifier dense + relu over `[CLS]`.
    PreClassifier {
        pre_classifier: Linear,
        classifier: Linear,
    },
    /// RoBERTa: dense + tanh over `<s>`, then an output projection.
    Dense { dense: Linear, out_proj: Linear },
}

impl ClassificationHead {
    fn load(vb: VarBuilder, config: &EncoderConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        let labels = config.num_labels();
        match config.architecture {
            Architecture::Bert => Ok(Self::Pooled {
                pooler: linear(hidden, hidden, vb.pp("bert").pp("pooler").pp("dense"))?,
                classifier: linear(hidden, labels, vb.pp("classifier"))?,
            }),
            Architecture::DistilBert => Ok(Self::PreClassifier {
                pre_classifier: linear(hidden, hidden, vb.pp("pre_classifier"))?,
                classifier: linear(hidden, labels, vb.pp("classifier"))?,
            }),
            Architecture::Roberta => {
                let head = vb.pp("classifier");
                Ok(Self::Dense {
                    dense: linear(hidden, hidden, head.pp("dense"))?,
                    out_proj: linear(hidden, labels, head.pp("out_proj"))?,
                })
            }
        }
    }
}

impl Module for ClassificationHead {
    fn forward(&self, first_token: &Tensor) -> Result<Tensor> {
        match self {
            Self::Pooled { pooler, classifier } => {
                first_token.apply(pooler)?.tanh()?.apply(classifier)
            }
            Self::PreClassifier {
                pre_classifier,
                classifier,
            } => first_token.apply(pre_classifier)?.relu()?.apply(classifier),
            Self::Dense { dense, out_proj } => first_token.apply(dense)?.tanh()?.apply(out_proj),
        }
    }
}

/// Encoder plus classification head, producing one logit per label.
#[derive(Debug, Clone)]
pub struct SequenceClassifier {
    embeddings: Embeddings,
    layers: Vec<EncoderLayer>,
    head: ClassificationHead,
}

impl SequenceClassifier {
    pub fn load(vb: VarBuilder, config: &EncoderConfig) -> Result<Self> {
        let base = vb.pp(config.architecture.prefix());
        let layers_vb = match config.architecture {
            Architecture::DistilBert => base.pp("transformer").pp("layer"),
            Architecture::Bert | Architecture::Roberta => base.pp("encoder").pp("layer"),
        };

        let embeddings = Embeddings::load(base.pp("embeddings"), config)?;
        let layers = (0..config.num_hidden_layers)
            .map(|index| EncoderLayer::load(layers_vb.pp(index), config))
            .collect::<Result<Vec<_>>>()?;
        let head = ClassificationHead::load(vb, config)?;

        Ok(Self {
            embeddings,
            layers,
            head,
        })
    }

    /// `input_ids` and `attention_mask` are `(batch, seq_len)`; returns
    /// `(batch, num_labels)` logits.
    pub fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        // (batch, 1, 1, seq_len): 0 for real tokens, a large negative for padding.
        let mask = attention_mask
            .to_dtype(DType::F32)?
            .affine(-MASKED_SCORE, MASKED_SCORE)?
            .unsqueeze(1)?
            .unsqueeze(1)?;

        let mut hidden_states = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden_states = layer.forward(&hidden_states, &mask)?;
        }

        let first_token = hidden_states.i((.., 0))?;
        self.head.forward(&first_token)
    }
}

/// A sentiment classifier running locally on Candle.
pub struct SequenceClassificationModel {
    model_id: String,
    classifier: SequenceClassifier,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

impl SequenceClassificationModel {
    /// Download config, tokenizer and weights for `model_id` and build the
    /// classifier on `device`.
    pub async fn from_hub(model_id: &str, device: Device) -> anyhow::Result<Self> {
        tracing::info!(model_id, "loading sequence classification checkpoint");

        let config = ClassifierConfigLoader::new(model_id, "config.json")
            .load()
            .await?;
        let tokenizer = TokenizerLoader::new(model_id)
            .load(config.max_sequence_length())
            .await?;
        let weights = WeightsLoader::new(model_id).load().await?;
        let vb = var_builder(&weights, &device)?;

        Self::new(model_id, &config, vb, tokenizer, device)
    }

    pub fn new(
        model_id: &str,
        config: &EncoderConfig,
        vb: VarBuilder,
        tokenizer: Tokenizer,
        device: Device,
    ) -> anyhow::Result<Self> {
        let classifier = SequenceClassifier::load(vb, config).with_context(|| {
            format!(
                "Failed to load {:?} weights for `{model_id}`",
                config.architecture
            )
        })?;

        Ok(Self {
            model_id: model_id.to_string(),
            classifier,
            tokenizer,
            labels: config.labels.clone(),
            device,
        })
    }

    /// Class probabilities for `text`, best first.
    pub fn scores(&self, text: &str) -> anyhow::Result<Vec<(String, f32)>> {
        // 1. Tokenize
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| E::msg(format!("Tokenization error: {e}")))?;

        // 2. Prepare tensors
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        // 3. Forward pass
        let logits = self.classifier.forward(&input_ids, &attention_mask)?;

        // 4. Probabilities, ranked
        let probabilities = softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;
        let mut ranked: Vec<(String, f32)> = probabilities
            .into_iter()
            .enumerate()
            .map(|(id, score)| {
                let label = self
                    .labels
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("LABEL_{id}"));
                (label, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }
}

#[async_trait::async_trait]
impl SentimentAnalysisModel for SequenceClassificationModel {
    async fn predict(&self, text: &str) -> anyhow::Result<Vec<ClassificationResult>> {
        Ok(self
            .scores(text)?
            .into_iter()
            .map(|(label, score)| ClassificationResult::new(label, Some(score)))
            .collect())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn var_builder(weights: &Path, device: &Device) -> anyhow::Result<VarBuilder<'static>> {
    let dtype = DType::F32;
    let vb = match weights.extension().and_then(|ext| ext.to_str()) {
        Some("safetensors") => unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights.to_path_buf()], dtype, device)?
        },
        Some("bin") => VarBuilder::from_pth(weights, dtype, device)?,
        _ => anyhow::bail!("Unsupported weight file format: {:?}", weights),
    };
    Ok(vb)
}
