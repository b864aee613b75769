pub mod devto;
pub mod github;
pub mod official_docs;
pub mod stackoverflow;
pub mod youtube;

use async_trait::async_trait;

use crate::models::{Category, SourceItem};

/// One per external knowledge source (component B, spec.md §4.2). Adapters
/// never raise into the research engine — any error or timeout collapses to
/// `(vec![], false)`, logged once with a one-line reason.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name used in log lines and `ResearchSourceStatus` bookkeeping.
    fn name(&self) -> &'static str;

    async fn fetch(&self, topic: &str, category: Category, language: Option<&str>) -> (Vec<SourceItem>, bool);
}

pub use devto::DevToAdapter;
pub use github::GithubAdapter;
pub use official_docs::OfficialDocsAdapter;
pub use stackoverflow::StackOverflowAdapter;
pub use youtube::YoutubeAdapter;
