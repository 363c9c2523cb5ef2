use crate::retrieval::RankedContext;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Template for the generative strategy
pub const GENERATION_TEMPLATE: &str = "Based on provided {context}, please try to answer on following {question}. Context is as follows: {context}, Question is as follows: {question}";

/// Preamble placed in front of the combined context for extractive answering
pub const EXTRACTIVE_PREAMBLE: &str = "You read a book about python, based on provided {context}, try to answer question, read this context carefully please answer me in at least 2 senteces. Context is as follows";

/// Sampling settings for causal text generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub do_sample: bool,
    pub num_return_sequences: u32,
    pub max_new_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            temperature: 0.7,
            top_k: 50,
            top_p: 0.9,
            do_sample: true,
            num_return_sequences: 1,
            max_new_tokens: 150,
        }
    }
}

/// Span answer from an extractive question-answering model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

/// Language models used to turn retrieved context into an answer
#[allow(async_fn_in_trait)]
pub trait LanguageModel {
    /// Select the span of `context` that answers `question`
    async fn answer_span(&self, question: &str, context: &str) -> Result<QaAnswer>;

    /// Continue `prompt`; the returned text starts with the prompt itself
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;
}

/// How an answer is produced from the retrieved contexts
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerStrategy {
    /// Pick a span out of all retrieved contexts
    Extractive,
    /// Generate free text from the best context
    Generative(SamplingParams),
}

impl Default for AnswerStrategy {
    fn default() -> Self {
        AnswerStrategy::Generative(SamplingParams::default())
    }
}

/// Replace every `{context}` and `{question}` placeholder in a template
pub fn fill_template(template: &str, context: &str, question: &str) -> String {
    template
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Produces answers from ranked contexts using a language model
pub struct Generator<L> {
    model: L,
    strategy: AnswerStrategy,
}

impl<L: LanguageModel> Generator<L> {
    pub fn new(model: L, strategy: AnswerStrategy) -> Self {
        Generator { model, strategy }
    }

    /// Answer a question from contexts ordered best first
    pub async fn answer(&self, question: &str, contexts: &[RankedContext]) -> Result<String> {
        match &self.strategy {
            AnswerStrategy::Extractive => self.answer_extractive(question, contexts).await,
            AnswerStrategy::Generative(params) => {
                self.answer_generative(question, contexts, params).await
            }
        }
    }

    async fn answer_extractive(
        &self,
        question: &str,
        contexts: &[RankedContext],
    ) -> Result<String> {
        if contexts.is_empty() {
            anyhow::bail!("No context retrieved for question");
        }

        let combined_context = contexts
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ");
        let final_context = format!("{}{}", EXTRACTIVE_PREAMBLE, combined_context);
        info!("Final content {}", final_context);

        let answer = self
            .model
            .answer_span(question, &final_context)
            .await
            .context("Extractive question answering failed")?;

        Ok(answer.answer)
    }

    async fn answer_generative(
        &self,
        question: &str,
        contexts: &[RankedContext],
        params: &SamplingParams,
    ) -> Result<String> {
        // Only the best context goes into the prompt
        let best = contexts
            .first()
            .context("No context retrieved for question")?;

        let prompt = fill_template(GENERATION_TEMPLATE, &best.chunk.text, question);
        info!("{}", prompt);

        self.model
            .generate(&prompt, params)
            .await
            .context("Text generation failed")
    }
}
