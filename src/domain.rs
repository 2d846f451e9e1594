use crate::errors::RepoError;
use crate::models::{Initiative, LikeDirection};
use async_trait::async_trait;

/// Storage operations for initiative records.
///
/// Titles are addressed through their lower-cased key (see
/// [`crate::models::title_key`]). When several records share a key, the
/// oldest one by `created_at` is the one addressed.
#[async_trait]
pub trait InitiativeRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Persists a new initiative.
    async fn create(&self, initiative: &Initiative) -> Result<(), RepoError>;

    /// Lists every initiative in the store's natural order.
    async fn list_all(&self) -> Result<Vec<Initiative>, RepoError>;

    /// Lists the initiatives owned by `username`, oldest first.
    async fn list_by_username(&self, username: &str) -> Result<Vec<Initiative>, RepoError>;

    /// Removes the initiative addressed by `title_key` and returns it.
    /// Returns `RepoError::NotFound` if nothing matches.
    async fn delete_by_title_key(&self, title_key: &str) -> Result<Initiative, RepoError>;

    /// Atomically adds the direction's delta to the like counter, never
    /// going below zero, and returns the updated record.
    async fn adjust_likes(&self, title_key: &str, direction: LikeDirection) -> Result<Initiative, RepoError>;
}
