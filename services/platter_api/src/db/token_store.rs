// services/platter_api/src/db/token_store.rs

//! Short-lived payment-attempt state, keyed by a hash of the payment token.
//!
//! An entry's presence is the only proof a token is live and unconsumed.
//! A verification claims the entry with a versioned compare-and-swap that
//! marks it in flight, and deletes it only once the order row exists. Two
//! verifications racing on the same token cannot both win, and a token in
//! flight is never treated as stale.

use crate::errors::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Lowercase hex SHA-256 of a raw payment token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey(String);

impl TokenKey {
  pub fn from_token(token: &str) -> Self {
    TokenKey(hex::encode(Sha256::digest(token.as_bytes())))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
  pub attempts: u32,
  /// Set while one verification owns the token and is persisting its order.
  #[serde(default)]
  pub claimed: bool,
}

impl TokenEntry {
  pub fn available(attempts: u32) -> Self {
    Self { attempts, claimed: false }
  }

  pub fn in_flight(attempts: u32) -> Self {
    Self { attempts, claimed: true }
  }
}

/// A value together with the store-assigned version of the write that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versioned<T> {
  pub value: T,
  pub version: u64,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
  /// Writes `entry` with a fresh `ttl` and returns its new version.
  async fn put(&self, key: &TokenKey, entry: TokenEntry, ttl: Duration) -> Result<u64>;

  /// Expired entries read as absent.
  async fn fetch(&self, key: &TokenKey) -> Result<Option<Versioned<TokenEntry>>>;

  /// Replaces the entry only if it is live and still at `version`. Returns
  /// the new version, or `None` when the swap lost.
  async fn compare_and_swap(&self, key: &TokenKey, version: u64, entry: TokenEntry, ttl: Duration)
    -> Result<Option<u64>>;

  /// Deletes the entry only if it is live and still at `version`.
  async fn compare_and_delete(&self, key: &TokenKey, version: u64) -> Result<bool>;
}

struct StoredEntry {
  entry: TokenEntry,
  version: u64,
  expires_at: Instant,
}

impl StoredEntry {
  fn is_live(&self, now: Instant) -> bool {
    now < self.expires_at
  }
}

/// Process-local store. Expiry is lazy; `purge_expired` reclaims memory.
#[derive(Default)]
pub struct InMemoryTokenStore {
  entries: Mutex<HashMap<TokenKey, StoredEntry>>,
  next_version: AtomicU64,
}

impl InMemoryTokenStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Drops expired entries and returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    let before = entries.len();
    entries.retain(|_, stored| stored.is_live(now));
    before - entries.len()
  }

  pub fn len(&self) -> usize {
    let now = Instant::now();
    self.entries.lock().values().filter(|s| s.is_live(now)).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
  #[instrument(name = "token_store::put", skip(self, key), fields(attempts = entry.attempts))]
  async fn put(&self, key: &TokenKey, entry: TokenEntry, ttl: Duration) -> Result<u64> {
    let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
    self.entries.lock().insert(
      key.clone(),
      StoredEntry {
        entry,
        version,
        expires_at: Instant::now() + ttl,
      },
    );
    debug!(version, "token entry written");
    Ok(version)
  }

  async fn fetch(&self, key: &TokenKey) -> Result<Option<Versioned<TokenEntry>>> {
    let now = Instant::now();
    Ok(self.entries.lock().get(key).filter(|s| s.is_live(now)).map(|s| Versioned {
      value: s.entry,
      version: s.version,
    }))
  }

  #[instrument(name = "token_store::compare_and_swap", skip(self, key), fields(attempts = entry.attempts, claimed = entry.claimed))]
  async fn compare_and_swap(
    &self,
    key: &TokenKey,
    version: u64,
    entry: TokenEntry,
    ttl: Duration,
  ) -> Result<Option<u64>> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    match entries.get_mut(key) {
      Some(stored) if stored.is_live(now) && stored.version == version => {
        let next = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        stored.entry = entry;
        stored.version = next;
        stored.expires_at = now + ttl;
        debug!(version = next, "token entry swapped");
        Ok(Some(next))
      }
      _ => {
        debug!("compare-and-swap lost");
        Ok(None)
      }
    }
  }

  #[instrument(name = "token_store::compare_and_delete", skip(self, key))]
  async fn compare_and_delete(&self, key: &TokenKey, version: u64) -> Result<bool> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    let matches = entries
      .get(key)
      .map(|s| s.is_live(now) && s.version == version)
      .unwrap_or(false);
    if matches {
      entries.remove(key);
    }
    debug!(consumed = matches, "compare-and-delete finished");
    Ok(matches)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TTL: Duration = Duration::from_secs(300);

  #[test]
  fn key_is_a_hash_not_the_token() {
    let key = TokenKey::from_token("eyJhbGciOi.secret.bundle");
    assert_eq!(key.as_str().len(), 64);
    assert!(!key.as_str().contains("secret"));
    assert_eq!(key, TokenKey::from_token("eyJhbGciOi.secret.bundle"));
    assert_ne!(key, TokenKey::from_token("eyJhbGciOi.secret.bundlf"));
  }

  #[tokio::test]
  async fn compare_and_delete_consumes_once() {
    let store = InMemoryTokenStore::new();
    let key = TokenKey::from_token("tok");
    let version = store.put(&key, TokenEntry::available(0), TTL).await.unwrap();

    assert!(store.compare_and_delete(&key, version).await.unwrap());
    assert!(!store.compare_and_delete(&key, version).await.unwrap());
    assert_eq!(store.fetch(&key).await.unwrap(), None);
  }

  #[tokio::test]
  async fn stale_version_cannot_delete() {
    let store = InMemoryTokenStore::new();
    let key = TokenKey::from_token("tok");
    let first = store.put(&key, TokenEntry::available(0), TTL).await.unwrap();
    let second = store.put(&key, TokenEntry::available(1), TTL).await.unwrap();
    assert!(second > first);

    assert!(!store.compare_and_delete(&key, first).await.unwrap());
    let live = store.fetch(&key).await.unwrap().unwrap();
    assert_eq!(live.value.attempts, 1);
    assert_eq!(live.version, second);
  }

  #[tokio::test]
  async fn expired_entries_read_as_absent() {
    let store = InMemoryTokenStore::new();
    let key = TokenKey::from_token("tok");
    let version = store
      .put(&key, TokenEntry::available(0), Duration::from_millis(20))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(store.fetch(&key).await.unwrap(), None);
    assert!(!store.compare_and_delete(&key, version).await.unwrap());
    assert_eq!(store.purge_expired(), 1);
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn concurrent_consumers_have_one_winner() {
    let store = std::sync::Arc::new(InMemoryTokenStore::new());
    let key = TokenKey::from_token("tok");
    let version = store.put(&key, TokenEntry::default(), TTL).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
      let store = store.clone();
      let key = key.clone();
      handles.push(tokio::spawn(async move { store.compare_and_delete(&key, version).await.unwrap() }));
    }
    let mut winners = 0;
    for handle in handles {
      if handle.await.unwrap() {
        winners += 1;
      }
    }
    assert_eq!(winners, 1);
  }

  #[tokio::test]
  async fn claim_swaps_once_and_hides_the_old_version() {
    let store = InMemoryTokenStore::new();
    let key = TokenKey::from_token("tok");
    let version = store.put(&key, TokenEntry::available(0), TTL).await.unwrap();

    let claimed = store
      .compare_and_swap(&key, version, TokenEntry::in_flight(0), TTL)
      .await
      .unwrap()
      .unwrap();
    assert!(claimed > version);
    assert_eq!(
      store.compare_and_swap(&key, version, TokenEntry::in_flight(0), TTL).await.unwrap(),
      None
    );
    assert!(!store.compare_and_delete(&key, version).await.unwrap());

    let live = store.fetch(&key).await.unwrap().unwrap();
    assert!(live.value.claimed);
    assert_eq!(live.version, claimed);
    assert!(store.compare_and_delete(&key, claimed).await.unwrap());
    assert!(store.is_empty());
  }
}
