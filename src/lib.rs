pub mod chunking;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod huggingface;
pub mod rag;
pub mod retrieval;
