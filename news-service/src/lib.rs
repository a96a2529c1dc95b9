pub mod fetcher;
pub mod summarizer;

pub use fetcher::{NewsFetcher, PostSource};
pub use summarizer::Summarizer;
