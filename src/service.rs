use crate::{
    config::Config,
    domain::InitiativeRepository,
    errors::{AppError, RepoError},
    models::{title_key, Initiative, LikeDirection, NewInitiative},
};
use chrono::Utc;
use std::{future::Future, sync::Arc, time::Duration};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Upper bound on a single store call.
    pub request_timeout: Duration,
    /// Longest accepted inline image data URL, if capped.
    pub max_image_bytes: Option<usize>,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        ServiceSettings {
            request_timeout: config.request_timeout,
            max_image_bytes: config.image_limit(),
        }
    }
}

/// Request logic for initiatives. Holds no state of its own; every
/// operation is a single call into the repository.
#[derive(Clone)]
pub struct InitiativeService {
    repo: Arc<dyn InitiativeRepository>,
    settings: ServiceSettings,
}

impl InitiativeService {
    pub fn new(repo: Arc<dyn InitiativeRepository>, settings: ServiceSettings) -> Self {
        Self { repo, settings }
    }

    pub async fn create(&self, payload: NewInitiative) -> Result<Initiative, AppError> {
        if payload.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title is required".to_string()));
        }
        validate_image(&payload.image, self.settings.max_image_bytes)?;

        let initiative = payload.into_initiative(Uuid::new_v4(), Utc::now());
        self.bounded(self.repo.create(&initiative)).await?;

        tracing::info!(initiative_id = %initiative.id, title = %initiative.title, "Initiative created");
        Ok(initiative)
    }

    pub async fn list_all(&self) -> Result<Vec<Initiative>, AppError> {
        let initiatives = self.bounded(self.repo.list_all()).await?;
        tracing::debug!(count = initiatives.len(), "Listed all initiatives");
        Ok(initiatives)
    }

    /// Lists a user's initiatives. An empty result is reported as
    /// `UserNotFound` rather than an empty list.
    pub async fn list_by_user(&self, username: &str) -> Result<Vec<Initiative>, AppError> {
        let initiatives = self.bounded(self.repo.list_by_username(username)).await?;
        if initiatives.is_empty() {
            return Err(AppError::UserNotFound(username.to_string()));
        }
        tracing::debug!(%username, count = initiatives.len(), "Listed initiatives for user");
        Ok(initiatives)
    }

    pub async fn delete_by_title(&self, title: &str) -> Result<Initiative, AppError> {
        let key = title_key(title);
        let deleted = self.bounded(self.repo.delete_by_title_key(&key)).await?;
        tracing::info!(initiative_id = %deleted.id, title = %deleted.title, "Initiative deleted");
        Ok(deleted)
    }

    pub async fn adjust_like_count(&self, title: &str, direction: LikeDirection) -> Result<Initiative, AppError> {
        let key = title_key(title);
        let updated = self.bounded(self.repo.adjust_likes(&key, direction)).await?;
        tracing::debug!(initiative_id = %updated.id, ?direction, likes = updated.likes, "Like count adjusted");
        Ok(updated)
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        match tokio::time::timeout(self.settings.request_timeout, operation).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Timeout(self.settings.request_timeout)),
        }
    }
}

/// Accepts an empty image or a `data:image/<subtype>[;...],<payload>` URL
/// with a media type known to `mime_guess`.
fn validate_image(image: &str, max_len: Option<usize>) -> Result<(), AppError> {
    if image.is_empty() {
        return Ok(());
    }
    if let Some(max_len) = max_len.filter(|max_len| image.len() > *max_len) {
        return Err(AppError::InvalidInput(format!(
            "image is {} bytes, the limit is {} bytes",
            image.len(),
            max_len
        )));
    }

    let header = image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .map(|(header, _)| header)
        .ok_or_else(|| AppError::InvalidInput("image must be an inline data URL".to_string()))?;

    let media_type = header.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let known_image = media_type.starts_with("image/") && mime_guess::get_mime_extensions_str(&media_type).is_some();
    if !known_image {
        return Err(AppError::InvalidInput(format!("unsupported image type '{}'", media_type)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryInitiativeRepository;
    use crate::models::InitiativeStatus;
    use async_trait::async_trait;

    fn service() -> InitiativeService {
        InitiativeService::new(
            Arc::new(InMemoryInitiativeRepository::new()),
            ServiceSettings {
                request_timeout: Duration::from_secs(5),
                max_image_bytes: Some(1024),
            },
        )
    }

    fn payload(title: &str) -> NewInitiative {
        NewInitiative {
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn created_record_is_listed_with_zero_likes() {
        let service = service();
        let created = service
            .create(NewInitiative {
                title: "Beach Cleanup".into(),
                description: "Saturday morning".into(),
                tags: vec!["ocean".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        let all = service.list_all().await.unwrap();
        assert_eq!(all, vec![created.clone()]);
        assert_eq!(created.likes, 0);
        assert_eq!(created.description, "Saturday morning");
    }

    #[tokio::test]
    async fn blank_title_is_invalid() {
        let err = service().create(payload("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_is_case_insensitive_and_exact() {
        let service = service();
        service.create(payload("beach cleanup")).await.unwrap();
        service.create(payload("beach cleanup crew")).await.unwrap();

        service.delete_by_title("Beach Cleanup").await.unwrap();
        let remaining = service.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "beach cleanup crew");

        let err = service.delete_by_title("Beach Cleanup").await.unwrap_err();
        assert!(matches!(err, AppError::InitiativeNotFound(_)));
    }

    #[tokio::test]
    async fn empty_user_listing_is_not_found() {
        let service = service();
        service
            .create(NewInitiative {
                title: "Bike Lanes".into(),
                username: Some("bob".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(matches!(service.list_by_user("alice").await, Err(AppError::UserNotFound(_))));
        assert_eq!(service.list_by_user("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn liking_a_missing_title_is_not_found() {
        let err = service().adjust_like_count("nothing here", LikeDirection::Like).await.unwrap_err();
        assert!(matches!(err, AppError::InitiativeNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_likes_are_not_lost() {
        let service = service();
        service.create(payload("Tree Planting")).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.adjust_like_count("tree planting", LikeDirection::Like).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = service.list_all().await.unwrap();
        assert_eq!(all[0].likes, 50);
    }

    #[tokio::test]
    async fn end_to_end_lifecycle() {
        let service = service();
        service
            .create(NewInitiative {
                title: "Tree Planting".into(),
                username: Some("bob".into()),
                status: Some(InitiativeStatus::Ongoing),
                donation_link: Some("http://x".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let all = service.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].likes, 0);
        assert_eq!(all[0].donation_link.as_deref(), Some("http://x"));

        service.adjust_like_count("Tree Planting", LikeDirection::Like).await.unwrap();
        let updated = service.adjust_like_count("Tree Planting", LikeDirection::Like).await.unwrap();
        assert_eq!(updated.likes, 2);

        service.delete_by_title("tree planting").await.unwrap();
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[test]
    fn image_must_be_a_known_image_data_url() {
        assert!(validate_image("", Some(100)).is_ok());
        assert!(validate_image("data:image/png;base64,iVBORw0KGgo=", Some(100)).is_ok());
        assert!(validate_image("data:text/plain;base64,aGVsbG8=", Some(100)).is_err());
        assert!(validate_image("https://example.org/cat.png", None).is_err());
        assert!(validate_image("data:image/png;base64,iVBORw0KGgo=", Some(10)).is_err());
    }

    #[tokio::test]
    async fn large_photo_is_accepted_without_an_image_cap() {
        let service = InitiativeService::new(
            Arc::new(InMemoryInitiativeRepository::new()),
            ServiceSettings {
                request_timeout: Duration::from_secs(5),
                max_image_bytes: None,
            },
        );
        let photo = format!("data:image/jpeg;base64,{}", "A".repeat(2_000_000));
        let created = service
            .create(NewInitiative {
                title: "Mangrove Restoration".into(),
                image: photo.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.image.len(), photo.len());
    }

    struct StalledRepository;

    #[async_trait]
    impl InitiativeRepository for StalledRepository {
        async fn create(&self, _: &Initiative) -> Result<(), RepoError> {
            std::future::pending().await
        }
        async fn list_all(&self) -> Result<Vec<Initiative>, RepoError> {
            std::future::pending().await
        }
        async fn list_by_username(&self, _: &str) -> Result<Vec<Initiative>, RepoError> {
            std::future::pending().await
        }
        async fn delete_by_title_key(&self, _: &str) -> Result<Initiative, RepoError> {
            std::future::pending().await
        }
        async fn adjust_likes(&self, _: &str, _: LikeDirection) -> Result<Initiative, RepoError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_store_times_out() {
        let service = InitiativeService::new(
            Arc::new(StalledRepository),
            ServiceSettings {
                request_timeout: Duration::from_millis(20),
                max_image_bytes: Some(1024),
            },
        );
        assert!(matches!(service.list_all().await, Err(AppError::Timeout(_))));
    }
}
