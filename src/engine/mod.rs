pub mod searcher;

pub use searcher::{QueryMode, Searcher, SearchResult, VectorQuery};
