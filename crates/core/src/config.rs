use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SearchError;
use crate::fusion::RankingStrategy;

pub const DEFAULT_PREFETCH_WIDTH: usize = 100;
pub const DEFAULT_RANKED_WIDTH: usize = 100;
pub const DEFAULT_DOCUMENT_CAP: usize = 30;
pub const DEFAULT_EXPANSION_PAGE_SIZE: usize = 400;

pub const DEFAULT_PRIMARY_COLLECTION: &str = "tjsc-voyage-512-chunks";
pub const DEFAULT_ALTERNATE_COLLECTION: &str = "tjsc-voyage-1024-chunks";

/// Output dimensionality supported by the dense embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum DenseDimension {
    D512,
    D1024,
}

impl DenseDimension {
    pub fn size(self) -> usize {
        match self {
            Self::D512 => 512,
            Self::D1024 => 1024,
        }
    }

    /// Collections are named after their dense model size.
    pub fn infer_from_collection(collection: &str) -> Self {
        if collection.contains("1024") {
            Self::D1024
        } else {
            Self::D512
        }
    }
}

impl TryFrom<usize> for DenseDimension {
    type Error = SearchError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            512 => Ok(Self::D512),
            1024 => Ok(Self::D1024),
            other => Err(SearchError::InvalidRequest(format!(
                "unsupported dense dimension {other}; expected 512 or 1024"
            ))),
        }
    }
}

impl From<DenseDimension> for usize {
    fn from(value: DenseDimension) -> Self {
        value.size()
    }
}

impl fmt::Display for DenseDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.size())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub label: String,
    pub collection: String,
    pub dimension: DenseDimension,
}

impl CorpusConfig {
    pub fn new(label: impl Into<String>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        Self {
            label: label.into(),
            dimension: DenseDimension::infer_from_collection(&collection),
            collection,
        }
    }
}

/// The two fixed configurations used by compare mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusCatalog {
    pub primary: CorpusConfig,
    pub alternate: CorpusConfig,
}

impl Default for CorpusCatalog {
    fn default() -> Self {
        Self {
            primary: CorpusConfig::new("primary", DEFAULT_PRIMARY_COLLECTION),
            alternate: CorpusConfig::new("alternate", DEFAULT_ALTERNATE_COLLECTION),
        }
    }
}

impl CorpusCatalog {
    /// Resolves a requested corpus by label or collection name. Unknown names
    /// are queried as-is with a dimension inferred from the name; the store
    /// decides whether they exist.
    pub fn resolve(&self, requested: Option<&str>) -> CorpusConfig {
        let Some(name) = requested.map(str::trim).filter(|name| !name.is_empty()) else {
            return self.primary.clone();
        };

        [&self.primary, &self.alternate]
            .into_iter()
            .find(|corpus| corpus.label == name || corpus.collection == name)
            .cloned()
            .unwrap_or_else(|| CorpusConfig::new(name, name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub prefetch_width: usize,
    pub ranked_width: usize,
    pub document_cap: usize,
    pub expansion_page_size: usize,
    pub ranking: RankingStrategy,
    pub expose_error_details: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            prefetch_width: DEFAULT_PREFETCH_WIDTH,
            ranked_width: DEFAULT_RANKED_WIDTH,
            document_cap: DEFAULT_DOCUMENT_CAP,
            expansion_page_size: DEFAULT_EXPANSION_PAGE_SIZE,
            ranking: RankingStrategy::default(),
            expose_error_details: false,
        }
    }
}
