use crate::models::{PointId, ScoredPoint};
use std::collections::HashMap;

pub const DEFAULT_RRF_K: u32 = 60;

/// How the dense and sparse rankings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingStrategy {
    /// The vector store runs both prefetches and fuses them in one query.
    #[default]
    Delegated,
    /// Two plain queries fused here, for stores without native fusion.
    LocalRrf { k: u32 },
}

impl RankingStrategy {
    pub fn local_rrf() -> Self {
        Self::LocalRrf { k: DEFAULT_RRF_K }
    }
}

/// Reciprocal rank fusion over ranked lists. Each item scores
/// `sum(1 / (k + rank))` with 1-based ranks over the lists it appears in.
/// Equal scores keep first-appearance order across `lists`.
pub fn reciprocal_rank_fusion(
    lists: &[Vec<ScoredPoint>],
    k: u32,
    limit: usize,
) -> Vec<ScoredPoint> {
    let k = f64::from(k);
    let mut positions = HashMap::<PointId, usize>::new();
    let mut fused: Vec<ScoredPoint> = Vec::new();

    for list in lists {
        for (position, point) in list.iter().enumerate() {
            let contribution = 1.0 / (k + (position as f64 + 1.0));
            match positions.get(&point.id) {
                Some(&slot) => fused[slot].score += contribution,
                None => {
                    positions.insert(point.id.clone(), fused.len());
                    fused.push(ScoredPoint {
                        id: point.id.clone(),
                        score: contribution,
                        payload: point.payload.clone(),
                    });
                }
            }
        }
    }

    fused.sort_by(|left, right| right.score.total_cmp(&left.score));
    fused.truncate(limit);
    fused
}
