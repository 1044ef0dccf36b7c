pub mod qdrant;

pub use qdrant::{IndexAction, QdrantStore};
