use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::{error, info};
use std::path::Path;

use pdf_rag::generation::{AnswerStrategy, Generator, SamplingParams};
use pdf_rag::huggingface::{
    HfClient, HfConfig, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_QA_MODEL,
};
use pdf_rag::rag::{RagPipeline, DEFAULT_TOP_K};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    /// Generate free text from the best matching batch
    Generative,
    /// Extract an answer span from all retrieved batches
    Extractive,
}

/// Question answering over a PDF with sentence embeddings and a language model
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    after_help = "Set RUST_LOG=info to print the assembled prompt, RUST_LOG=debug to also print the embedding of every batch."
)]
struct Args {
    /// Path to the document to process (supports PDF and text)
    #[arg(index = 1)]
    file_path: String,

    /// Question to answer; starts an interactive loop when omitted
    #[arg(short, long)]
    question: Option<String>,

    /// Number of batches the document is split into
    #[arg(short, long, default_value_t = 600)]
    batches: usize,

    /// Number of batches retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, value_enum, default_value_t = Strategy::Generative)]
    strategy: Strategy,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Sample only from the k most likely tokens
    #[arg(long, default_value_t = 50)]
    sampling_top_k: u32,

    /// Nucleus sampling cutoff
    #[arg(long, default_value_t = 0.9)]
    top_p: f32,

    #[arg(long, default_value_t = 150)]
    max_new_tokens: u32,

    #[arg(long, env = "RAG_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "RAG_QA_MODEL", default_value = DEFAULT_QA_MODEL)]
    qa_model: String,

    #[arg(long, env = "RAG_GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,
}

impl Args {
    fn answer_strategy(&self) -> AnswerStrategy {
        match self.strategy {
            Strategy::Extractive => AnswerStrategy::Extractive,
            Strategy::Generative => AnswerStrategy::Generative(SamplingParams {
                temperature: self.temperature,
                top_k: self.sampling_top_k,
                top_p: self.top_p,
                max_new_tokens: self.max_new_tokens,
                ..SamplingParams::default()
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    info!("Processing file: {}", args.file_path);

    let path = Path::new(&args.file_path);
    if !path.exists() {
        error!("File not found: {}", args.file_path);
        return Err(anyhow::anyhow!("File not found"));
    }

    let config = HfConfig {
        embedding_model: args.embedding_model.clone(),
        qa_model: args.qa_model.clone(),
        generation_model: args.generation_model.clone(),
        ..HfConfig::from_env()
    };
    let client = HfClient::new(config);

    let generator = Generator::new(client.clone(), args.answer_strategy());
    let pipeline = RagPipeline::new(client, generator).with_top_k(args.top_k);

    let index = pipeline
        .build_index(path, args.batches)
        .await
        .context("Failed to index document")?;
    info!("Indexed {} batches", index.len());

    match &args.question {
        Some(question) => {
            let answer = pipeline
                .answer(question, &index)
                .await
                .context("Failed to answer question")?;
            println!("{}", answer);
        }
        None => pipeline
            .run_query_loop(&index)
            .await
            .context("Error in query loop")?,
    }

    Ok(())
}
