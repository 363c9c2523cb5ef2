use crate::embeddings::{Embedding, EmbeddingModel};
use crate::generation::{LanguageModel, QaAnswer, SamplingParams};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_QA_MODEL: &str = "distilbert/distilbert-base-uncased-distilled-squad";
pub const DEFAULT_GENERATION_MODEL: &str = "openai-community/gpt2";

/// Inputs sent per feature-extraction request
const EMBED_REQUEST_SIZE: usize = 32;

/// Configuration for the Hugging Face inference API
#[derive(Clone, Debug)]
pub struct HfConfig {
    pub api_token: Option<String>,
    pub inference_url: String,
    pub embedding_model: String,
    pub qa_model: String,
    pub generation_model: String,
}

impl Default for HfConfig {
    fn default() -> Self {
        HfConfig {
            api_token: None,
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            qa_model: DEFAULT_QA_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
        }
    }
}

impl HfConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = HfConfig::default();

        HfConfig {
            api_token: env::var("HF_API_TOKEN").ok(),
            inference_url: env::var("HF_INFERENCE_URL").unwrap_or(defaults.inference_url),
            ..defaults
        }
    }
}

/// Client for the Hugging Face inference API
///
/// One client serves the embedding, question-answering and generation
/// models, sharing a single connection pool for the lifetime of the pipeline.
#[derive(Clone)]
pub struct HfClient {
    config: HfConfig,
    client: reqwest::Client,
}

impl HfClient {
    /// Create a new Hugging Face client
    pub fn new(config: HfConfig) -> Self {
        let client = reqwest::Client::new();
        HfClient { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &HfConfig {
        &self.config
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.config.inference_url.trim_end_matches('/'), model)
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed: {} {}",
                status,
                error_text
            ));
        }

        Ok(response.json().await?)
    }

    async fn feature_extraction(&self, inputs: &[String]) -> Result<Vec<Embedding>> {
        let url = format!(
            "{}/pipeline/feature-extraction",
            self.model_url(&self.config.embedding_model)
        );
        let request = InferenceRequest {
            inputs,
            parameters: None::<()>,
        };

        let response: FeatureExtractionResponse = self
            .post(&url, &request)
            .await
            .with_context(|| {
                format!("Embedding request to {} failed", self.config.embedding_model)
            })?;

        let embeddings = response.into_embeddings();
        if embeddings.len() != inputs.len() {
            anyhow::bail!(
                "Requested {} embeddings but received {}",
                inputs.len(),
                embeddings.len()
            );
        }

        Ok(embeddings)
    }
}

impl EmbeddingModel for HfClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.feature_extraction(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_REQUEST_SIZE) {
            embeddings.extend(self.feature_extraction(batch).await?);
        }

        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }
}

impl LanguageModel for HfClient {
    async fn answer_span(&self, question: &str, context: &str) -> Result<QaAnswer> {
        let url = self.model_url(&self.config.qa_model);
        let request = InferenceRequest {
            inputs: QaInputs { question, context },
            parameters: None::<()>,
        };

        self.post(&url, &request)
            .await
            .with_context(|| format!("Question answering with {} failed", self.config.qa_model))
    }

    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let url = self.model_url(&self.config.generation_model);
        let request = InferenceRequest {
            inputs: prompt,
            parameters: Some(GenerationParameters {
                sampling: params,
                return_full_text: true,
            }),
        };

        let response: Vec<GeneratedText> = self
            .post(&url, &request)
            .await
            .with_context(|| {
                format!(
                    "Text generation with {} failed",
                    self.config.generation_model
                )
            })?;

        response
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }
}

// Request/response structures for the inference API

#[derive(Serialize)]
struct InferenceRequest<I, P> {
    inputs: I,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<P>,
}

#[derive(Serialize)]
struct QaInputs<'a> {
    question: &'a str,
    context: &'a str,
}

#[derive(Serialize)]
struct GenerationParameters<'a> {
    #[serde(flatten)]
    sampling: &'a SamplingParams,
    return_full_text: bool,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Batch(Vec<Vec<f32>>),
    Single(Vec<f32>),
}

impl FeatureExtractionResponse {
    fn into_embeddings(self) -> Vec<Embedding> {
        match self {
            FeatureExtractionResponse::Batch(vectors) => {
                vectors.into_iter().map(Embedding::new).collect()
            }
            FeatureExtractionResponse::Single(values) => vec![Embedding::new(values)],
        }
    }
}

#[derive(Deserialize, Debug)]
struct GeneratedText {
    generated_text: String,
}
