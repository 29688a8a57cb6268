//! In-memory cache storage

use super::{CacheStorage, GenerationInfo};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Bucket {
    name: String,
    created_at: DateTime<Utc>,
    entries: HashMap<String, Response>,
}

impl Bucket {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            entries: HashMap::new(),
        }
    }
}

/// Cache storage that lives for the lifetime of the process
#[derive(Default)]
pub struct MemoryStorage {
    buckets: RwLock<Vec<Bucket>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn bucket_mut<'a>(buckets: &'a mut Vec<Bucket>, generation: &str) -> &'a mut Bucket {
    match buckets.iter().position(|b| b.name == generation) {
        Some(index) => &mut buckets[index],
        None => {
            buckets.push(Bucket::new(generation));
            let last = buckets.len() - 1;
            &mut buckets[last]
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, generation: &str) -> ShellcacheResult<()> {
        let mut buckets = self.buckets.write().await;
        bucket_mut(&mut buckets, generation);
        Ok(())
    }

    async fn has(&self, generation: &str) -> ShellcacheResult<bool> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .any(|b| b.name == generation))
    }

    async fn keys(&self) -> ShellcacheResult<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|b| b.name.clone())
            .collect())
    }

    async fn delete(&self, generation: &str) -> ShellcacheResult<bool> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|b| b.name != generation);
        Ok(buckets.len() != before)
    }

    async fn match_in(&self, generation: &str, key: &str) -> ShellcacheResult<Option<Response>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .find(|b| b.name == generation)
            .and_then(|b| b.entries.get(key).cloned()))
    }

    async fn put(&self, generation: &str, key: &str, response: &Response) -> ShellcacheResult<()> {
        let mut buckets = self.buckets.write().await;
        bucket_mut(&mut buckets, generation)
            .entries
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: &[(String, Response)],
    ) -> ShellcacheResult<()> {
        // a single write guard makes the whole batch visible at once
        let mut buckets = self.buckets.write().await;
        let bucket = bucket_mut(&mut buckets, generation);
        for (key, response) in entries {
            bucket.entries.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn entries(&self, generation: &str) -> ShellcacheResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        let bucket = buckets
            .iter()
            .find(|b| b.name == generation)
            .ok_or_else(|| ShellcacheError::GenerationNotFound(generation.to_string()))?;

        let mut keys: Vec<String> = bucket.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn info(&self) -> ShellcacheResult<Vec<GenerationInfo>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|b| GenerationInfo {
                name: b.name.clone(),
                created_at: b.created_at,
                entries: b.entries.len(),
            })
            .collect())
    }
}
