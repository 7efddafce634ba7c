//! MongoDB-backed notification store.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};

use crate::config::MongoConfig;
use crate::notifier::store::{LargeTransferNotification, NotificationStore, StoreError};

pub struct MongoNotificationStore {
    collection: Collection<LargeTransferNotification>,
}

impl MongoNotificationStore {
    /// Connects and ensures the unique index on `transaction_id`; the index
    /// is what makes redelivered events idempotent.
    pub async fn connect(config: &MongoConfig) -> Result<Self, MongoError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.connect_timeout = Some(config.timeout);
        options.server_selection_timeout = Some(config.timeout);

        let client = Client::with_options(options)?;
        let collection = client
            .database(&config.database)
            .collection::<LargeTransferNotification>(&config.collection);

        let index = IndexModel::builder()
            .keys(doc! { "transaction_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(index).await?;

        tracing::info!(
            database = %config.database,
            collection = %config.collection,
            "connected to mongodb"
        );

        Ok(Self { collection })
    }

    pub async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<LargeTransferNotification>, MongoError> {
        self.collection
            .find_one(doc! { "transaction_id": transaction_id })
            .await
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn save(&self, notification: &LargeTransferNotification) -> Result<(), StoreError> {
        match self.collection.insert_one(notification).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => {
                tracing::debug!(
                    transaction_id = %notification.transaction_id,
                    "notification already stored, duplicate absorbed"
                );
                Ok(())
            }
            Err(err) => Err(StoreError(err.to_string())),
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_err)) if write_err.code == 11000
    )
}
