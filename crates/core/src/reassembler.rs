use crate::models::{Chunk, Document};
use std::collections::HashMap;

/// Rebuilds whole documents from a flat chunk list.
///
/// Chunks are grouped by `doc_id` in first-seen order and sorted by
/// `chunk_index` (stable, so duplicate indexes keep retrieval order). Each
/// document takes the best score among its chunks and the metadata of its
/// lowest-index chunk. Documents come out by descending score; equal scores
/// keep first-seen order.
pub fn reassemble(chunks: Vec<Chunk>) -> Vec<Document> {
    let mut slots = HashMap::<String, usize>::new();
    let mut groups: Vec<Vec<Chunk>> = Vec::new();

    for chunk in chunks {
        match slots.get(&chunk.doc_id) {
            Some(&slot) => groups[slot].push(chunk),
            None => {
                slots.insert(chunk.doc_id.clone(), groups.len());
                groups.push(vec![chunk]);
            }
        }
    }

    let mut documents = groups.into_iter().filter_map(build_document).collect::<Vec<_>>();
    documents.sort_by(|left, right| right.score.total_cmp(&left.score));
    documents
}

fn build_document(mut chunks: Vec<Chunk>) -> Option<Document> {
    chunks.sort_by_key(|chunk| chunk.chunk_index);

    let first = chunks.first()?;
    let doc_id = first.doc_id.clone();
    let metadata = first.metadata.clone();
    let score = chunks
        .iter()
        .map(|chunk| chunk.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let full_text = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Some(Document {
        doc_id,
        chunks,
        full_text,
        score,
        metadata,
    })
}
