use crate::chunking::{split_into_batches, TextChunk};
use crate::document::Document;
use crate::embeddings::{Embedding, EmbeddingModel};
use crate::generation::{Generator, LanguageModel};
use crate::retrieval::{top_k, RankedContext};
use anyhow::{Context, Result};
use log::{debug, info};
use std::io::{self, Write};
use std::path::Path;

/// Number of contexts retrieved per question
pub const DEFAULT_TOP_K: usize = 2;

/// Chunks of one document with their embeddings, aligned by position
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    chunks: Vec<TextChunk>,
    embeddings: Vec<Embedding>,
}

impl DocumentIndex {
    /// Pair chunks with their embeddings; `embeddings[i]` belongs to `chunks[i]`
    pub fn new(chunks: Vec<TextChunk>, embeddings: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        Ok(DocumentIndex { chunks, embeddings })
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Embedding>, Vec<TextChunk>) {
        (self.embeddings, self.chunks)
    }
}

/// RAG (Retrieval-Augmented Generation) pipeline
pub struct RagPipeline<E, L> {
    embedder: E,
    generator: Generator<L>,
    top_k: usize,
}

impl<E: EmbeddingModel, L: LanguageModel> RagPipeline<E, L> {
    /// Create a new pipeline; the embedder is reused for indexing and queries
    pub fn new(embedder: E, generator: Generator<L>) -> Self {
        RagPipeline {
            embedder,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Extract a document, split it into batches and embed every batch
    pub async fn build_index<P: AsRef<Path>>(
        &self,
        file_path: P,
        num_batches: usize,
    ) -> Result<DocumentIndex> {
        let document = Document::from_file(&file_path).context("Failed to process document")?;
        info!("Indexing {} ({})", document.document_id, document.mime_type);

        self.index_text(&document.content, num_batches).await
    }

    /// Split already extracted text into batches and embed every batch
    pub async fn index_text(&self, text: &str, num_batches: usize) -> Result<DocumentIndex> {
        let chunks = split_into_batches(text, num_batches)?;
        info!("Split into {} batches", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        info!("Generating embeddings with {}...", self.embedder.model_name());
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed batches")?;

        for (i, embedding) in embeddings.iter().enumerate() {
            debug!("Embedding for Batch {}:\n{:?}", i + 1, embedding.values);
        }

        DocumentIndex::new(chunks, embeddings)
    }

    /// Find the contexts most similar to a question, best first
    pub async fn retrieve(
        &self,
        question: &str,
        index: &DocumentIndex,
    ) -> Result<Vec<RankedContext>> {
        let question_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        top_k(
            &question_embedding,
            index.embeddings(),
            index.chunks(),
            self.top_k,
        )
    }

    /// Answer a question from the indexed document
    pub async fn answer(&self, question: &str, index: &DocumentIndex) -> Result<String> {
        let contexts = self.retrieve(question, index).await?;

        for (i, context) in contexts.iter().enumerate() {
            debug!(
                "Top {} Similar Context (Cosine Similarity: {:.4}):\n{}",
                i + 1,
                context.score,
                context.chunk.text
            );
        }

        self.generator.answer(question, &contexts).await
    }

    /// Run the interactive query loop over an indexed document
    pub async fn run_query_loop(&self, index: &DocumentIndex) -> Result<()> {
        println!("Ready to answer questions. Type 'exit' to quit.");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();

            if question.is_empty() {
                continue;
            }

            if question.to_lowercase() == "exit" {
                println!("Goodbye!");
                break;
            }

            let answer = self.answer(question, index).await?;

            println!("\n{}", answer);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{AnswerStrategy, QaAnswer, SamplingParams};
    use std::cell::Cell;

    const VOCABULARY: [&str; 8] = [
        "loop", "repeat", "code", "function", "group", "variable", "store", "data",
    ];

    /// Bag-of-words embedder over a tiny fixed vocabulary
    #[derive(Default)]
    struct KeywordEmbedder {
        calls: Cell<usize>,
    }

    impl EmbeddingModel for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.set(self.calls.get() + 1);
            let text = text.to_lowercase();
            let values = VOCABULARY
                .iter()
                .map(|word| text.matches(word).count() as f32)
                .collect();
            Ok(Embedding::new(values))
        }

        fn model_name(&self) -> &str {
            "keyword"
        }
    }

    struct EchoModel;

    impl LanguageModel for EchoModel {
        async fn answer_span(&self, _question: &str, _context: &str) -> Result<QaAnswer> {
            Ok(QaAnswer {
                answer: "repeat code".to_string(),
                score: 0.5,
                start: 0,
                end: 11,
            })
        }

        async fn generate(&self, prompt: &str, _params: &SamplingParams) -> Result<String> {
            Ok(format!("{} You can use loops to repeat code.", prompt))
        }
    }

    fn pipeline(strategy: AnswerStrategy) -> RagPipeline<KeywordEmbedder, EchoModel> {
        RagPipeline::new(KeywordEmbedder::default(), Generator::new(EchoModel, strategy))
    }

    fn text_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const DOCUMENT: &str = "Loops repeat code. Functions group code. Variables store data.";

    #[tokio::test]
    async fn test_embeddings_align_with_chunks() {
        let pipeline = pipeline(AnswerStrategy::default());

        let index = pipeline.index_text("loop. group. data.", 3).await.unwrap();

        assert_eq!(index.len(), 3);
        let embeddings = index.embeddings();
        for i in 0..embeddings.len() {
            for j in i + 1..embeddings.len() {
                assert_ne!(embeddings[i], embeddings[j]);
            }
        }
        for (chunk, embedding) in index.chunks().iter().zip(embeddings) {
            let expected = pipeline.embedder.embed(&chunk.text).await.unwrap();
            assert_eq!(embedding, &expected);
        }
    }

    #[tokio::test]
    async fn test_end_to_end_answer() {
        let file = text_file(DOCUMENT);
        let pipeline = pipeline(AnswerStrategy::default());

        let index = pipeline.build_index(file.path(), 3).await.unwrap();
        let chunk_texts: Vec<&str> = index.chunks().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            chunk_texts,
            vec!["Loops repeat code", "Functions group code", "Variables store data."]
        );

        let question = "For what I can use loop?";
        let contexts = pipeline.retrieve(question, &index).await.unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].chunk.text, "Loops repeat code");

        let answer = pipeline.answer(question, &index).await.unwrap();
        let prompt = crate::generation::fill_template(
            crate::generation::GENERATION_TEMPLATE,
            "Loops repeat code",
            question,
        );
        assert!(answer.len() > prompt.len());
        assert!(answer.starts_with(&prompt));
        assert!(prompt.contains(question));
    }

    #[tokio::test]
    async fn test_extractive_answer() {
        let pipeline = pipeline(AnswerStrategy::Extractive);
        let index = pipeline.index_text(DOCUMENT, 3).await.unwrap();

        let answer = pipeline.answer("For what I can use loop?", &index).await.unwrap();

        assert_eq!(answer, "repeat code");
    }

    #[tokio::test]
    async fn test_build_index_is_deterministic() {
        let file = text_file(DOCUMENT);
        let pipeline = pipeline(AnswerStrategy::default());

        let first = pipeline.build_index(file.path(), 2).await.unwrap();
        let second = pipeline.build_index(file.path(), 2).await.unwrap();

        assert_eq!(first.chunks(), second.chunks());
        assert_eq!(first.embeddings(), second.embeddings());
    }

    #[tokio::test]
    async fn test_embedder_is_reused_across_phases() {
        let pipeline = pipeline(AnswerStrategy::default()).with_top_k(10);
        let index = pipeline.index_text(DOCUMENT, 3).await.unwrap();

        let contexts = pipeline.retrieve("data", &index).await.unwrap();

        assert_eq!(contexts.len(), 3);
        assert_eq!(pipeline.embedder.calls.get(), 4);
    }

    #[tokio::test]
    async fn test_missing_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(AnswerStrategy::default());

        let result = pipeline.build_index(dir.path().join("missing.txt"), 3).await;

        assert!(result.is_err());
    }

    #[test]
    fn test_index_rejects_misaligned_parts() {
        let chunks = vec![TextChunk {
            text: "a".to_string(),
            index: 0,
        }];

        assert!(DocumentIndex::new(chunks, vec![]).is_err());
    }
}
