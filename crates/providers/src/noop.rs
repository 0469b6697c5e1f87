use crate::{ClassifyResponse, FetchedPost, LlmProvider, PostSource, ProviderError};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl PostSource for NoopProvider {
    async fn recent_posts(
        &self,
        _handle: &str,
        _count: usize,
    ) -> Result<Vec<FetchedPost>, ProviderError> {
        Ok(Vec::new())
    }
}

#[async_trait::async_trait]
impl LlmProvider for NoopProvider {
    async fn classify(&self, _prompt: &str) -> Result<ClassifyResponse, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
