use crate::errors::AppError;
use crate::repositories::{TITLE_KEY_INDEX, USERNAME_INDEX};
use aws_sdk_dynamodb::{
    error::SdkError as DynamoSdkError,
    types::{
        AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
        ProjectionType, ScalarAttributeType, TableStatus,
    },
    Client as DynamoDbClient,
};
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tracing;

/// How long to wait for a freshly created table to become ACTIVE.
const TABLE_READY_TIMEOUT: Duration = Duration::from_secs(60);

fn attribute(name: &str, attribute_type: ScalarAttributeType) -> Result<AttributeDefinition, AppError> {
    Ok(AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(attribute_type)
        .build()?)
}

fn key(name: &str, key_type: KeyType) -> Result<KeySchemaElement, AppError> {
    Ok(KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()?)
}

// Secondary index keyed by `hash_attribute`, ordered by creation time.
fn index_by(index_name: &str, hash_attribute: &str) -> Result<GlobalSecondaryIndex, AppError> {
    Ok(GlobalSecondaryIndex::builder()
        .index_name(index_name)
        .key_schema(key(hash_attribute, KeyType::Hash)?)
        .key_schema(key("created_at", KeyType::Range)?)
        .projection(Projection::builder().projection_type(ProjectionType::All).build())
        .build()?)
}

/// Creates the DynamoDB table if it doesn't exist.
async fn create_initiatives_table_if_not_exists(client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(attribute("initiative_id", ScalarAttributeType::S)?)
        .attribute_definitions(attribute("title_key", ScalarAttributeType::S)?)
        .attribute_definitions(attribute("username", ScalarAttributeType::S)?)
        .attribute_definitions(attribute("created_at", ScalarAttributeType::N)?)
        .key_schema(key("initiative_id", KeyType::Hash)?)
        .global_secondary_indexes(index_by(TITLE_KEY_INDEX, "title_key")?)
        .global_secondary_indexes(index_by(USERNAME_INDEX, "username")?)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;
    match result {
        Ok(_) => {
            tracing::info!("Startup: Table '{}' created successfully or setup initiated.", table_name);
            Ok(())
        }
        Err(e) => {
            if let DynamoSdkError::ServiceError(service_err) = &e {
                if service_err.err().is_resource_in_use_exception() {
                    tracing::info!("Startup: Table '{}' already exists, no action needed.", table_name);
                    Ok(())
                } else {
                    let context = format!("Startup: Service error creating DynamoDB table '{}'", table_name);
                    tracing::error!("{}: {:?}", context, service_err);
                    Err(AppError::InitError(format!("{}: {}", context, e)))
                }
            } else {
                let context = format!("Startup: SDK error creating DynamoDB table '{}'", table_name);
                tracing::error!("{}: {}", context, e);
                Err(AppError::InitError(format!("{}: {}", context, e)))
            }
        }
    }
}

/// Polls DescribeTable with exponential backoff until the table is ACTIVE.
async fn wait_for_table_active(client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(TABLE_READY_TIMEOUT))
        .build();

    backoff::future::retry(policy, move || async move {
        let output = client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(format!("DescribeTable failed: {}", e)))?;

        let status = output.table().and_then(|table| table.table_status());
        match status {
            Some(TableStatus::Active) => Ok(()),
            other => {
                tracing::debug!(table_name, status = ?other, "Startup: Waiting for table to become active");
                Err(backoff::Error::transient(format!("table status is {:?}", other)))
            }
        }
    })
    .await
    .map_err(|reason| {
        AppError::InitError(format!(
            "Startup: Table '{}' not active after {:?}: {}",
            table_name, TABLE_READY_TIMEOUT, reason
        ))
    })
}

/// Initializes required AWS resources (the initiatives table and its indexes).
pub async fn init_resources(db_client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    tracing::info!("Startup: Initializing AWS resources...");
    create_initiatives_table_if_not_exists(db_client, table_name).await?;
    wait_for_table_active(db_client, table_name).await?;
    tracing::info!("Startup: AWS resource initialization complete.");
    Ok(())
}
