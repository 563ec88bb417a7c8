use std::{collections::HashMap, sync::Arc};

use crate::{
    command::CommandError,
    domain::subscriber::{SUBSCRIBER_PREFIX, SubscriberKey},
    storage::KvStore,
};

/// Subscribers of primary-change pushes, kept in the external store.
#[derive(Clone)]
pub struct SubscriberRegistry {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl SubscriberRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_prefix(store, SUBSCRIBER_PREFIX)
    }

    pub fn with_prefix(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Inserts or overwrites the callback URL of `client_ip[/app]`.
    pub async fn register(
        &self,
        client_ip: &str,
        app: Option<&str>,
        url: &str,
    ) -> Result<(), CommandError> {
        let key = SubscriberKey::new(client_ip, app).store_key(&self.prefix);
        self.store.put(&key, url).await?;
        log::info!("Registered receive address {} for {}", url, key);
        Ok(())
    }

    /// Without an app name every subscriber of `client_ip` goes: the default
    /// entry and everything under `client_ip/`. A bare prefix delete on the
    /// IP would also hit `10.0.0.12` when deleting `10.0.0.1`.
    pub async fn delete(&self, client_ip: &str, app: Option<&str>) -> Result<(), CommandError> {
        let key = SubscriberKey::new(client_ip, app);
        let store_key = key.store_key(&self.prefix);
        self.store.delete(&store_key).await?;
        if key.app.is_none() {
            self.store.delete_prefix(&format!("{store_key}/")).await?;
            log::info!("Deleted receive addresses under {}", store_key);
        } else {
            log::info!("Deleted receive address {}", store_key);
        }
        Ok(())
    }

    pub async fn lookup(
        &self,
        client_ip: &str,
        app: Option<&str>,
    ) -> Result<Option<String>, CommandError> {
        let key = SubscriberKey::new(client_ip, app).store_key(&self.prefix);
        self.store.get(&key).await
    }

    /// `client_ip[/app]` → callback URL of every subscriber.
    ///
    /// `None` when the store has nothing under the prefix or cannot be read;
    /// callers treat both as "nobody to notify".
    pub async fn list(&self) -> Option<HashMap<String, String>> {
        let pairs = match self.store.scan_prefix(&self.prefix).await {
            Ok(Some(pairs)) => pairs,
            Ok(None) => return None,
            Err(e) => {
                log::error!("Failed to list receive addresses: {}", e);
                return None;
            }
        };

        Some(
            pairs
                .into_iter()
                .filter_map(|(key, url)| {
                    key.strip_prefix(self.prefix.as_str())
                        .map(|suffix| (suffix.to_string(), url))
                })
                .collect(),
        )
    }
}
