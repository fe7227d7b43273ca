//! Retrieval plumbing for packrat.
//!
//! Documents go in one end (load → chunk → embed → store) and ranked
//! chunks come out the other at chat time. Everything here is an
//! interchangeable implementation of the core retrieval traits; the
//! budget-fit logic that decides what actually reaches the model lives in
//! `packrat-context`.

pub mod chunk;
pub mod embed;
pub mod indexer;
pub mod loader;
pub mod store;

pub use chunk::CharChunker;
pub use embed::HashingEmbedder;
pub use indexer::DocIndexer;
pub use loader::TextLoader;
pub use store::{InMemoryVectorStore, JsonVectorStore};
