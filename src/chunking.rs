use anyhow::{bail, Result};

/// Delimiter used to approximate sentence boundaries
pub const SENTENCE_DELIMITER: &str = ". ";

/// Represents one batch of consecutive sentences
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The sentences of this batch joined back with the delimiter
    pub text: String,
    /// Position of this batch in the document
    pub index: usize,
}

/// Count the sentences the chunker will see in a text
pub fn sentence_count(text: &str) -> usize {
    text.split(SENTENCE_DELIMITER).count()
}

/// Split text into exactly `num_batches` batches of consecutive sentences.
///
/// Every batch holds `sentences / num_batches` sentences, except the last one
/// which also takes the remainder. When there are fewer sentences than
/// batches, all batches but the last are empty and the last holds the whole
/// text.
pub fn split_into_batches(text: &str, num_batches: usize) -> Result<Vec<TextChunk>> {
    if num_batches == 0 {
        bail!("Number of batches must be greater than zero");
    }

    let sentences: Vec<&str> = text.split(SENTENCE_DELIMITER).collect();
    let batch_size = sentences.len() / num_batches;

    let chunks = (0..num_batches)
        .map(|index| {
            let start = index * batch_size;
            let end = if index == num_batches - 1 {
                sentences.len()
            } else {
                (index + 1) * batch_size
            };

            TextChunk {
                text: sentences[start..end].join(SENTENCE_DELIMITER),
                index,
            }
        })
        .collect();

    Ok(chunks)
}
