use crate::{
    domain::InitiativeRepository,
    errors::RepoError,
    models::{title_key, Initiative, LikeDirection},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    operation::{delete_item::DeleteItemError, update_item::UpdateItemError},
    types::{AttributeValue, ReturnValue, ReturnValuesOnConditionCheckFailure},
    Client as DynamoDbClient,
};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

/// GSI on (`title_key`, `created_at`).
pub const TITLE_KEY_INDEX: &str = "title_key-index";
/// GSI on (`username`, `created_at`).
pub const USERNAME_INDEX: &str = "username-index";

type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct DynamoDbInitiativeRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbInitiativeRepository {
    /// Creates a new repository instance configured for a specific table.
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbInitiativeRepository");
        Self { client, table_name }
    }

    fn parse_item(&self, item: &Item) -> Result<Initiative, RepoError> {
        parse_item(&self.table_name, item)
    }

    /// Queries a GSI by hash key, oldest first. With `first_only` a single
    /// item is read; otherwise every page is followed.
    async fn query_index(&self, index: &str, attribute: &str, value: &str, first_only: bool) -> Result<Vec<Item>, RepoError> {
        let mut items: Vec<Item> = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let mut request_builder = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", attribute)
                .expression_attribute_values(":pk", AttributeValue::S(value.to_string()))
                .scan_index_forward(true);

            if first_only {
                request_builder = request_builder.limit(1);
            }
            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!("DynamoDB: Failed to query index '{}' of table '{}'", index, self.table_name))
                .map_err(RepoError::BackendError)?;

            if let Some(page) = resp.items {
                tracing::debug!(index, count = page.len(), "DynamoDB Query: page returned");
                items.extend(page);
            }

            last_evaluated_key = resp.last_evaluated_key;
            if first_only || last_evaluated_key.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn find_oldest_by_title_key(&self, key: &str) -> Result<Initiative, RepoError> {
        let items = self.query_index(TITLE_KEY_INDEX, "title_key", key, true).await?;
        match items.first() {
            Some(item) => self.parse_item(item),
            None => Err(RepoError::NotFound(key.to_string())),
        }
    }
}

#[async_trait]
impl InitiativeRepository for DynamoDbInitiativeRepository {
    /// Stores an `Initiative` using PutItem. The condition guards against
    /// overwriting an existing id.
    async fn create(&self, initiative: &Initiative) -> Result<(), RepoError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(initiative_to_item(initiative)))
            .condition_expression("attribute_not_exists(initiative_id)")
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to put initiative (id: {})",
                self.table_name, initiative.id
            ))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }

    /// Lists all initiatives using DynamoDB Scan. Handles pagination.
    async fn list_all(&self) -> Result<Vec<Initiative>, RepoError> {
        tracing::debug!("DynamoDB: Scanning table '{}' for all initiatives", self.table_name);
        let mut initiatives: Vec<Initiative> = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let mut request_builder = self.client.scan().table_name(&self.table_name);

            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!("DynamoDB: Failed to scan table '{}'", self.table_name))
                .map_err(RepoError::BackendError)?;

            if let Some(items) = resp.items {
                tracing::debug!("DynamoDB Scan (table: {}): Returned {} items", self.table_name, items.len());
                for item in &items {
                    initiatives.push(self.parse_item(item)?);
                }
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        tracing::info!("DynamoDB (table: {}): Listed {} initiatives", self.table_name, initiatives.len());
        Ok(initiatives)
    }

    async fn list_by_username(&self, username: &str) -> Result<Vec<Initiative>, RepoError> {
        let items = self.query_index(USERNAME_INDEX, "username", username, false).await?;
        items.iter().map(|item| self.parse_item(item)).collect()
    }

    async fn delete_by_title_key(&self, key: &str) -> Result<Initiative, RepoError> {
        let target = self.find_oldest_by_title_key(key).await?;
        let id_str = target.id.to_string();
        tracing::debug!(initiative_id = %id_str, table_name = %self.table_name, "DynamoDB: Deleting item");

        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("initiative_id", AttributeValue::S(id_str.clone()))
            .condition_expression("attribute_exists(initiative_id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(target),
            Err(err) => Err(delete_error_to_repo(err.into_service_error(), &self.table_name, key, &id_str)),
        }
    }

    /// Uses an `ADD` update expression so concurrent adjustments never lose
    /// increments. Unlike is conditional on a positive counter; when that
    /// condition fails the unchanged record comes back via ALL_OLD.
    async fn adjust_likes(&self, key: &str, direction: LikeDirection) -> Result<Initiative, RepoError> {
        let target = self.find_oldest_by_title_key(key).await?;
        let id_str = target.id.to_string();

        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("initiative_id", AttributeValue::S(id_str.clone()))
            .update_expression("ADD #likes :delta")
            .expression_attribute_names("#likes", "likes")
            .expression_attribute_values(":delta", AttributeValue::N(direction.delta().to_string()))
            .return_values(ReturnValue::AllNew)
            .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld);

        request = match direction {
            LikeDirection::Like => request.condition_expression("attribute_exists(initiative_id)"),
            LikeDirection::Unlike => request
                .condition_expression("attribute_exists(initiative_id) AND #likes > :zero")
                .expression_attribute_values(":zero", AttributeValue::N("0".to_string())),
        };

        match request.send().await {
            Ok(output) => {
                let attributes = output.attributes.ok_or_else(|| {
                    RepoError::DataCorruption(format!("UpdateItem on '{}' returned no attributes", id_str))
                })?;
                self.parse_item(&attributes)
            }
            Err(err) => update_error_to_result(err.into_service_error(), &self.table_name, key, &id_str),
        }
    }
}

fn parse_item(table_name: &str, item: &Item) -> Result<Initiative, RepoError> {
    item_to_initiative(item).ok_or_else(|| {
        let item_id = item.get("initiative_id").and_then(|v| v.as_s().ok());
        tracing::error!(item.id = ?item_id, %table_name, "DynamoDB: Failed to parse item into Initiative");
        RepoError::DataCorruption(format!(
            "Failed to parse item {:?} from DynamoDB table '{}'",
            item_id, table_name
        ))
    })
}

/// A failed existence condition on DeleteItem means the item was removed
/// between the index query and the delete.
fn delete_error_to_repo(err: DeleteItemError, table_name: &str, key: &str, id: &str) -> RepoError {
    match err {
        DeleteItemError::ConditionalCheckFailedException(_) => RepoError::NotFound(key.to_string()),
        other => RepoError::BackendError(anyhow::Error::new(other).context(format!(
            "DynamoDB (table: {}): Failed to delete initiative (id: {})",
            table_name, id
        ))),
    }
}

/// On a failed UpdateItem condition, ALL_OLD carries the item only when it
/// still exists: that is the zero floor stopping an unlike. No item means
/// the record is gone.
fn update_error_to_result(err: UpdateItemError, table_name: &str, key: &str, id: &str) -> Result<Initiative, RepoError> {
    match err {
        UpdateItemError::ConditionalCheckFailedException(ex) => match ex.item() {
            Some(item) => {
                tracing::debug!(initiative_id = %id, "Like counter already at zero, leaving unchanged");
                parse_item(table_name, item)
            }
            None => Err(RepoError::NotFound(key.to_string())),
        },
        other => Err(RepoError::BackendError(anyhow::Error::new(other).context(format!(
            "DynamoDB (table: {}): Failed to update likes (id: {})",
            table_name, id
        )))),
    }
}

fn initiative_to_item(initiative: &Initiative) -> Item {
    let mut item: Item = HashMap::new();
    let mut put_s = |name: &str, value: &str| {
        item.insert(name.to_string(), AttributeValue::S(value.to_string()));
    };

    put_s("initiative_id", &initiative.id.to_string());
    put_s("title", &initiative.title);
    put_s("title_key", &initiative.title_key);
    put_s("initiative_type", &initiative.initiative_type);
    put_s("description", &initiative.description);
    put_s("image", &initiative.image);
    put_s("location", &initiative.location);
    put_s("organization", &initiative.organization);
    put_s("contact_email", &initiative.contact_email);
    if let Some(status) = initiative.status {
        put_s("status", status.as_str());
    }
    if let Some(link) = &initiative.donation_link {
        put_s("donation_link", link);
    }
    // GSI key attributes must be absent rather than empty.
    if let Some(username) = &initiative.username {
        put_s("username", username);
    }

    item.insert(
        "tags".to_string(),
        AttributeValue::L(initiative.tags.iter().cloned().map(AttributeValue::S).collect()),
    );
    item.insert("likes".to_string(), AttributeValue::N(initiative.likes.to_string()));
    item.insert(
        "created_at".to_string(),
        AttributeValue::N(initiative.created_at.timestamp_millis().to_string()),
    );
    item
}

fn item_to_initiative(item: &Item) -> Option<Initiative> {
    let get_s = |name: &str| item.get(name).and_then(|v| v.as_s().ok()).cloned();
    let get_n = |name: &str| item.get(name)?.as_n().ok()?.parse::<i64>().ok();

    let id = get_s("initiative_id").and_then(|s| Uuid::parse_str(&s).ok())?;
    let title = get_s("title")?;
    let status = match get_s("status") {
        Some(raw) => Some(raw.parse().ok()?),
        None => None,
    };
    let tags = item
        .get("tags")
        .and_then(|v| v.as_l().ok())
        .map(|list| list.iter().filter_map(|v| v.as_s().ok().cloned()).collect())
        .unwrap_or_default();
    let created_at = Utc.timestamp_millis_opt(get_n("created_at")?).single()?;

    Some(Initiative {
        id,
        title_key: get_s("title_key").unwrap_or_else(|| title_key(&title)),
        title,
        initiative_type: get_s("initiative_type").unwrap_or_default(),
        description: get_s("description").unwrap_or_default(),
        image: get_s("image").unwrap_or_default(),
        tags,
        location: get_s("location").unwrap_or_default(),
        organization: get_s("organization").unwrap_or_default(),
        contact_email: get_s("contact_email").unwrap_or_default(),
        status,
        donation_link: get_s("donation_link"),
        username: get_s("username"),
        likes: get_n("likes")?,
        created_at,
    })
}
