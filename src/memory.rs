use crate::{
    domain::InitiativeRepository,
    errors::RepoError,
    models::{Initiative, LikeDirection},
};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local store for development without AWS and for tests.
///
/// Records are kept in insertion order, which is also creation order, so
/// the first key match is the oldest record.
#[derive(Debug, Default)]
pub struct InMemoryInitiativeRepository {
    initiatives: RwLock<Vec<Initiative>>,
}

impl InMemoryInitiativeRepository {
    pub fn new() -> Self {
        tracing::info!("Initializing InMemoryInitiativeRepository");
        Self::default()
    }
}

#[async_trait]
impl InitiativeRepository for InMemoryInitiativeRepository {
    async fn create(&self, initiative: &Initiative) -> Result<(), RepoError> {
        let mut initiatives = self.initiatives.write().await;
        if initiatives.iter().any(|existing| existing.id == initiative.id) {
            return Err(RepoError::BackendError(anyhow::anyhow!(
                "initiative id {} already exists",
                initiative.id
            )));
        }
        initiatives.push(initiative.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Initiative>, RepoError> {
        Ok(self.initiatives.read().await.clone())
    }

    async fn list_by_username(&self, username: &str) -> Result<Vec<Initiative>, RepoError> {
        let initiatives = self.initiatives.read().await;
        Ok(initiatives
            .iter()
            .filter(|initiative| initiative.username.as_deref() == Some(username))
            .cloned()
            .collect())
    }

    async fn delete_by_title_key(&self, title_key: &str) -> Result<Initiative, RepoError> {
        let mut initiatives = self.initiatives.write().await;
        let position = initiatives
            .iter()
            .position(|initiative| initiative.title_key == title_key)
            .ok_or_else(|| RepoError::NotFound(title_key.to_string()))?;
        Ok(initiatives.remove(position))
    }

    async fn adjust_likes(&self, title_key: &str, direction: LikeDirection) -> Result<Initiative, RepoError> {
        // The write guard makes the read-modify-write a single step.
        let mut initiatives = self.initiatives.write().await;
        let initiative = initiatives
            .iter_mut()
            .find(|initiative| initiative.title_key == title_key)
            .ok_or_else(|| RepoError::NotFound(title_key.to_string()))?;
        initiative.likes = (initiative.likes + direction.delta()).max(0);
        Ok(initiative.clone())
    }
}
