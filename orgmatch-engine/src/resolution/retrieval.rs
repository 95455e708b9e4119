// Candidate retrieval interface
//
// The registry (search index, database, in-memory list) lives outside the
// engine. Retrieval is about recall: it may return loose matches, the fuzzy
// tier decides.

use crate::resolution::types::{Candidate, QueryContext, RetrievalError};
use async_trait::async_trait;

/// Query context forwarded to the retriever.
///
/// Hints may reorder results. They never exclude a candidate: registries
/// spell regions and industries inconsistently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalHints {
    pub industry: Option<String>,
    pub region: Option<String>,
}

impl RetrievalHints {
    pub fn is_empty(&self) -> bool {
        self.industry.is_none() && self.region.is_none()
    }
}

impl From<&QueryContext> for RetrievalHints {
    fn from(context: &QueryContext) -> Self {
        let hint = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            industry: hint(&context.industry),
            region: hint(&context.region),
        }
    }
}

/// Registry collaborator
#[async_trait]
pub trait CandidateRetriever: Send + Sync {
    /// Candidates plausibly named by `query`, best first, at most `limit`
    async fn search(
        &self,
        query: &str,
        hints: &RetrievalHints,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError>;

    /// Current record for `id`, if the entity still exists
    async fn fetch(&self, id: &str) -> Result<Option<Candidate>, RetrievalError>;
}
