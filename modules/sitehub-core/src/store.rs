//! Typed per-tenant profile persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sitehub_common::Profile;

/// Key→record store for canonical profiles. Writes are full-document
/// replaces: the last writer wins, there is no field-level patching.
///
/// Implemented by `MemoryProfileStore`; integration tests and alternate
/// backends implement this seam.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> Option<Profile>;
    async fn put(&self, tenant_id: &str, profile: Profile);
}

#[async_trait]
impl<S: ProfileStore> ProfileStore for Arc<S> {
    async fn get(&self, tenant_id: &str) -> Option<Profile> {
        self.as_ref().get(tenant_id).await
    }

    async fn put(&self, tenant_id: &str, profile: Profile) {
        self.as_ref().put(tenant_id, profile).await
    }
}

/// In-memory profile store.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, tenant_id: &str) -> Option<Profile> {
        self.profiles.read().await.get(tenant_id).cloned()
    }

    async fn put(&self, tenant_id: &str, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(tenant_id.to_string(), profile);
    }
}
