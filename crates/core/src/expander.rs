use crate::config::PipelineSettings;
use crate::models::{Chunk, UNRANKED_SCORE};
use crate::traits::{ScrollRequest, VectorStore};
use crate::SearchError;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub const DOC_ID_FIELD: &str = "doc_id";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expansion {
    /// Expanded documents in fusion-rank order.
    pub doc_ids: Vec<String>,
    /// Every chunk of those documents, grouped in `doc_ids` order.
    pub chunks: Vec<Chunk>,
}

/// Distinct document ids in first-seen order, truncated to `cap`.
pub fn top_documents(ranked: &[Chunk], cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut doc_ids = Vec::new();
    for chunk in ranked {
        if doc_ids.len() == cap {
            break;
        }
        if seen.insert(chunk.doc_id.as_str()) {
            doc_ids.push(chunk.doc_id.clone());
        }
    }
    doc_ids
}

/// Pulls every chunk of the best-ranked documents back from the store.
pub struct DocumentExpander<'a> {
    store: &'a dyn VectorStore,
    document_cap: usize,
    page_size: usize,
}

impl<'a> DocumentExpander<'a> {
    pub fn new(store: &'a dyn VectorStore, settings: &PipelineSettings) -> Self {
        Self {
            store,
            document_cap: settings.document_cap,
            page_size: settings.expansion_page_size.max(1),
        }
    }

    pub async fn expand(
        &self,
        collection: &str,
        ranked: &[Chunk],
    ) -> Result<Expansion, SearchError> {
        let doc_ids = top_documents(ranked, self.document_cap);
        if doc_ids.is_empty() {
            return Ok(Expansion::default());
        }

        let fetched = self
            .fetch_all(collection, &doc_ids)
            .await
            .map_err(|error| SearchError::Expansion(error.to_string()))?;

        let scores: HashMap<&str, f64> = ranked
            .iter()
            .map(|chunk| (chunk.id.as_str(), chunk.score))
            .collect();
        let rank_of: HashMap<&str, usize> = doc_ids
            .iter()
            .enumerate()
            .map(|(position, doc_id)| (doc_id.as_str(), position))
            .collect();

        let mut seen_ids = HashSet::new();
        let mut chunks = Vec::with_capacity(fetched.len());
        for mut chunk in fetched {
            let capped = rank_of.contains_key(chunk.doc_id.as_str());
            if !capped || !seen_ids.insert(chunk.id.clone()) {
                continue;
            }
            chunk.score = scores
                .get(chunk.id.as_str())
                .copied()
                .unwrap_or(UNRANKED_SCORE);
            chunks.push(chunk);
        }

        // Seed chunks the listing missed still represent their document.
        for seed in ranked {
            if rank_of.contains_key(seed.doc_id.as_str()) && seen_ids.insert(seed.id.clone()) {
                chunks.push(seed.clone());
            }
        }

        chunks.sort_by_key(|chunk| rank_of.get(chunk.doc_id.as_str()).copied());

        debug!(
            collection,
            documents = doc_ids.len(),
            chunks = chunks.len(),
            ranked = chunks.iter().filter(|chunk| chunk.is_ranked()).count(),
            "documents expanded"
        );

        Ok(Expansion { doc_ids, chunks })
    }

    async fn fetch_all(
        &self,
        collection: &str,
        doc_ids: &[String],
    ) -> Result<Vec<Chunk>, SearchError> {
        let mut request = ScrollRequest {
            field: DOC_ID_FIELD.to_string(),
            any_of: doc_ids.to_vec(),
            limit: self.page_size,
            offset: None,
        };
        let mut chunks = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self.store.filtered_scroll(collection, &request).await?;
            pages += 1;
            for point in page.points {
                chunks.push(Chunk::from_payload(&point.id, UNRANKED_SCORE, point.payload)?);
            }
            match page.next_offset {
                Some(offset) if request.offset.as_ref() == Some(&offset) => {
                    return Err(SearchError::backend(
                        "vector store",
                        format!("scroll offset {offset} did not advance after page {pages}"),
                    ));
                }
                Some(offset) => request.offset = Some(offset),
                None => break,
            }
        }

        if pages > 1 {
            warn!(
                collection,
                pages,
                page_size = self.page_size,
                chunks = chunks.len(),
                "expansion exceeded one page; documents are larger than the expected chunk count"
            );
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ranked, stored, FakeStore};
    use std::sync::atomic::Ordering;

    const COLLECTION: &str = "tjsc-voyage-512-chunks";

    fn ranked_chunks(points: Vec<crate::models::ScoredPoint>) -> Vec<Chunk> {
        points
            .into_iter()
            .map(|point| Chunk::try_from(point).unwrap())
            .collect()
    }

    #[test]
    fn top_documents_dedups_in_first_seen_order() {
        let ranked = ranked_chunks(vec![
            ranked(1, "D2", 0, 0.9),
            ranked(2, "D1", 3, 0.8),
            ranked(3, "D2", 1, 0.7),
            ranked(4, "D3", 0, 0.6),
        ]);
        assert_eq!(top_documents(&ranked, 30), vec!["D2", "D1", "D3"]);
        assert_eq!(top_documents(&ranked, 2), vec!["D2", "D1"]);
    }

    #[tokio::test]
    async fn only_the_first_thirty_documents_are_expanded() {
        let ranked_points = (0..45u64)
            .map(|id| ranked(id, &format!("D{id}"), 0, 1.0 - id as f64 / 100.0))
            .collect::<Vec<_>>();
        let stored_points = (0..45u64)
            .flat_map(|id| {
                let doc_id = format!("D{id}");
                vec![stored(id, &doc_id, 0), stored(1000 + id, &doc_id, 1)]
            })
            .collect::<Vec<_>>();
        let store = FakeStore::with_collection(COLLECTION, Vec::new(), stored_points);
        let expander = DocumentExpander::new(&store, &PipelineSettings::default());

        let expansion = expander
            .expand(COLLECTION, &ranked_chunks(ranked_points))
            .await
            .unwrap();

        let expected = (0..30).map(|id| format!("D{id}")).collect::<Vec<_>>();
        assert_eq!(expansion.doc_ids, expected);
        assert_eq!(expansion.chunks.len(), 60);
        assert!(expansion
            .chunks
            .iter()
            .all(|chunk| expected.contains(&chunk.doc_id)));
    }

    #[tokio::test]
    async fn expansion_only_chunks_get_the_sentinel_score() {
        let ranked = ranked_chunks(vec![ranked(10, "D1", 1, 0.03), ranked(20, "D2", 0, 0.02)]);
        let store = FakeStore::with_collection(
            COLLECTION,
            Vec::new(),
            vec![
                stored(20, "D2", 0),
                stored(11, "D1", 2),
                stored(10, "D1", 1),
                stored(9, "D1", 0),
            ],
        );
        let expander = DocumentExpander::new(&store, &PipelineSettings::default());

        let expansion = expander.expand(COLLECTION, &ranked).await.unwrap();

        let scores = expansion
            .chunks
            .iter()
            .map(|chunk| (chunk.id.as_str(), chunk.score))
            .collect::<Vec<_>>();
        assert_eq!(
            scores,
            vec![("11", 0.0), ("10", 0.03), ("9", 0.0), ("20", 0.02)]
        );
    }

    #[tokio::test]
    async fn seed_chunk_missing_from_listing_is_kept() {
        let ranked = ranked_chunks(vec![ranked(1, "D1", 0, 0.5)]);
        let store = FakeStore::with_collection(COLLECTION, Vec::new(), Vec::new());
        let expander = DocumentExpander::new(&store, &PipelineSettings::default());

        let expansion = expander.expand(COLLECTION, &ranked).await.unwrap();

        assert_eq!(expansion.chunks.len(), 1);
        assert_eq!(expansion.chunks[0].score, 0.5);
    }

    #[tokio::test]
    async fn large_documents_are_paged_instead_of_truncated() {
        let ranked = ranked_chunks(vec![ranked(0, "D1", 0, 0.5)]);
        let stored_points = (0..25u32)
            .map(|index| stored(u64::from(index), "D1", index))
            .collect::<Vec<_>>();
        let store = FakeStore::with_collection(COLLECTION, Vec::new(), stored_points);
        let settings = PipelineSettings {
            expansion_page_size: 10,
            ..PipelineSettings::default()
        };
        let expander = DocumentExpander::new(&store, &settings);

        let expansion = expander.expand(COLLECTION, &ranked).await.unwrap();

        assert_eq!(expansion.chunks.len(), 25);
        assert_eq!(store.scroll_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn scroll_failure_is_an_expansion_error() {
        let ranked = ranked_chunks(vec![ranked(1, "D1", 0, 0.5)]);
        let mut store = FakeStore::with_collection(COLLECTION, Vec::new(), Vec::new());
        store.fail_scroll = true;
        let expander = DocumentExpander::new(&store, &PipelineSettings::default());

        let error = expander.expand(COLLECTION, &ranked).await.unwrap_err();

        assert!(matches!(
            error,
            SearchError::Expansion(ref message) if message.contains("Index required")
        ));
    }

    #[tokio::test]
    async fn scroll_that_repeats_its_offset_is_an_expansion_error() {
        let ranked = ranked_chunks(vec![ranked(1, "D1", 0, 0.5)]);
        let stored_points = (0..3u32)
            .map(|index| stored(u64::from(index), "D1", index))
            .collect::<Vec<_>>();
        let mut store = FakeStore::with_collection(COLLECTION, Vec::new(), stored_points);
        store.stalled_scroll = true;
        let expander = DocumentExpander::new(&store, &PipelineSettings::default());

        let error = expander.expand(COLLECTION, &ranked).await.unwrap_err();

        assert!(matches!(
            error,
            SearchError::Expansion(ref message) if message.contains("did not advance")
        ));
        assert_eq!(store.scroll_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_ranking_skips_the_store() {
        let store = FakeStore::with_collection(COLLECTION, Vec::new(), Vec::new());
        let expander = DocumentExpander::new(&store, &PipelineSettings::default());

        let expansion = expander.expand(COLLECTION, &[]).await.unwrap();

        assert_eq!(expansion, Expansion::default());
        assert_eq!(store.scroll_calls.load(Ordering::SeqCst), 0);
    }
}
