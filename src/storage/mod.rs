use std::collections::BTreeMap;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::command::{ClusterCtl, CommandError};

/// What the store prints when a key or prefix has no entries.
pub const KEY_NOT_FOUND: &str = "Key not found";

/// The get/put/delete surface of the external key-value store.
///
/// `get` and `scan_prefix` return `Ok(None)` when nothing is stored there.
pub trait KvStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommandError>>;

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<(String, String)>>, CommandError>>;

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommandError>>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CommandError>>;

    fn delete_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<(), CommandError>>;
}

/// The cluster manager's DCC, reached through `cm_ctl ddb`.
#[derive(Clone)]
pub struct DdbStore {
    ctl: ClusterCtl,
}

impl DdbStore {
    pub fn new(ctl: ClusterCtl) -> Self {
        Self { ctl }
    }

    async fn get_inner(&self, key: &str) -> Result<Option<String>, CommandError> {
        let output = self.ctl.ddb_get(key, false).await?.into_output()?;
        if output.contains(KEY_NOT_FOUND) {
            return Ok(None);
        }
        let pairs = parse_pairs(&output, key);
        Ok(pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    async fn scan_inner(&self, prefix: &str) -> Result<Option<Vec<(String, String)>>, CommandError> {
        let output = self.ctl.ddb_get(prefix, true).await?.into_output()?;
        if output.contains(KEY_NOT_FOUND) {
            return Ok(None);
        }
        Ok(Some(parse_pairs(&output, prefix)))
    }
}

impl KvStore for DdbStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommandError>> {
        Box::pin(self.get_inner(key))
    }

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<(String, String)>>, CommandError>> {
        Box::pin(self.scan_inner(prefix))
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            self.ctl.ddb_put(key, value).await?.into_output()?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            self.ctl.ddb_delete(key, false).await?.into_output()?;
            Ok(())
        })
    }

    fn delete_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            self.ctl.ddb_delete(prefix, true).await?.into_output()?;
            Ok(())
        })
    }
}

/// Pulls `key value` pairs out of `ddb --get` output.
///
/// Keys and values are whitespace separated, either on one line or on
/// consecutive lines; every token starting with `prefix` opens a pair.
pub fn parse_pairs(output: &str, prefix: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut tokens = output.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if !token.starts_with(prefix) {
            continue;
        }
        match tokens.peek() {
            Some(value) if !value.starts_with(prefix) => {
                pairs.push((token.to_string(), value.to_string()));
                tokens.next();
            }
            _ => log::warn!("Key {} has no value in store output", token),
        }
    }
    pairs
}

/// In-process store with the same semantics as [`DdbStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommandError>> {
        let value = self.entries.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<(String, String)>>, CommandError>> {
        let pairs: Vec<(String, String)> = self
            .entries
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let found = (!pairs.is_empty()).then_some(pairs);
        Box::pin(async move { Ok(found) })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommandError>> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Box::pin(async { Ok(()) })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CommandError>> {
        self.entries.lock().remove(key);
        Box::pin(async { Ok(()) })
    }

    fn delete_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<(), CommandError>> {
        self.entries.lock().retain(|k, _| !k.starts_with(prefix));
        Box::pin(async { Ok(()) })
    }
}
