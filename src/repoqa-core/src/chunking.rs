use tiktoken_rs::cl100k_base;

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Trait for splitting documents into retrieval-sized chunks
pub trait Chunker: Send + Sync {
    fn chunk(&self, document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>>;
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Token-window chunker using the cl100k BPE vocabulary.
///
/// `chunk_size` and `overlap` are measured in tokens; chunk offsets are
/// recorded in characters. Same document, same parameters, same chunk
/// sequence. With zero overlap the chunks concatenate back to the exact
/// document text; with overlap, consecutive chunks share the trailing
/// `overlap` tokens of the earlier one.
pub struct TokenChunker {
    bpe: tiktoken_rs::CoreBPE,
}

impl TokenChunker {
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| Error::Chunking(e.to_string()))?;
        Ok(Self { bpe })
    }

    fn decode(&self, tokens: &[usize]) -> Result<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| Error::Chunking(e.to_string()))
    }
}

impl Chunker for TokenChunker {
    fn chunk(&self, document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
        if chunk_size == 0 {
            return Err(Error::Configuration(
                "chunk_size must be positive".to_string(),
            ));
        }

        if document.content.is_empty() {
            return Ok(vec![]);
        }

        let tokens = self.bpe.encode_with_special_tokens(&document.content);

        // Whole document fits in a single chunk
        if tokens.len() <= chunk_size {
            return Ok(vec![Chunk {
                id: Chunk::chunk_id(&document.id, 0),
                document_id: document.id.clone(),
                content: document.content.clone(),
                offset: 0,
                index: 0,
                token_count: tokens.len(),
            }]);
        }

        // Overlap must leave room to advance
        let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
        let stride = chunk_size - effective_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut offset = 0;
        let mut index = 0;

        while start < tokens.len() {
            let end = std::cmp::min(start + chunk_size, tokens.len());
            let content = self.decode(&tokens[start..end])?;

            chunks.push(Chunk {
                id: Chunk::chunk_id(&document.id, index),
                document_id: document.id.clone(),
                content,
                offset,
                index,
                token_count: end - start,
            });

            if end >= tokens.len() {
                break;
            }

            // The stride region is text this chunk covers exclusively; its
            // character length carries the offset forward.
            offset += self.decode(&tokens[start..start + stride])?.chars().count();
            start += stride;
            index += 1;
        }

        Ok(chunks)
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}
