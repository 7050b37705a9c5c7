mod error;
mod memory;
mod turso;
mod upstash;

pub use error::StorageError;
pub use memory::{MemoryCache, MemoryUserStore};
pub use turso::TursoUserStore;
pub use upstash::RedisUserStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    config::StorageBackend,
    service::user::{User, UserPatch},
};

/// How a patch is folded into an existing user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Fields present in the patch overwrite stored values, absent fields are untouched.
    Merge,
    /// Fields present in the patch are only written where the document has no value yet.
    KeepExisting,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Merge => "merge",
            MergeStrategy::KeepExisting => "keep_existing",
        }
    }
}

/// Document store holding one user document per `userId`.
///
/// Every method is a single atomic document operation.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Creates the document if missing, then folds `patch` into it.
    async fn upsert(&self, user_id: &str, patch: &UserPatch, strategy: MergeStrategy) -> Result<(), StorageError>;

    /// Returns `Ok(None)` when no document exists for `user_id`.
    async fn get(&self, user_id: &str) -> Result<Option<User>, StorageError>;

    /// Merges `patch` into an existing document, `StorageError::NotFound` when there is none.
    async fn update(&self, user_id: &str, patch: &UserPatch) -> Result<(), StorageError>;
}

pub async fn open_user_store(backend: &StorageBackend) -> Result<Arc<dyn UserStore>, StorageError> {
    let store: Arc<dyn UserStore> = match backend {
        StorageBackend::Memory { capacity } => {
            warn!("Using in-memory user store, documents are lost on restart");
            Arc::new(MemoryUserStore::new(*capacity))
        }
        StorageBackend::Redis { url } => Arc::new(RedisUserStore::new(url).await?),
        StorageBackend::Turso { url, token } => Arc::new(TursoUserStore::new(url, token).await?),
    };

    Ok(store)
}
