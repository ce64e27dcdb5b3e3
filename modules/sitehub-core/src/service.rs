//! Profile lookup and refresh policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use sitehub_common::{HubError, Profile, TenantRecord};

use crate::assemble::ProfileAssembler;
use crate::registry::TenantRegistry;
use crate::store::ProfileStore;

/// Upper bound on one refresh pass. A refresh still in flight past this is
/// abandoned and the previous profile is served; individual sub-fetches
/// already carry their own 15-second timeouts.
const DEFAULT_REFRESH_DEADLINE: Duration = Duration::from_secs(60);

pub struct HubService<S: ProfileStore> {
    registry: TenantRegistry,
    store: S,
    assembler: ProfileAssembler,
    refresh_deadline: Duration,
    /// One lock per tenant id: a refresh for a given tenant is
    /// at-most-one-concurrent; a second request waits for the in-flight one.
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: ProfileStore> HubService<S> {
    pub fn new(registry: TenantRegistry, store: S, assembler: ProfileAssembler) -> Self {
        Self {
            registry,
            store,
            assembler,
            refresh_deadline: DEFAULT_REFRESH_DEADLINE,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_deadline(mut self, deadline: Duration) -> Self {
        self.refresh_deadline = deadline;
        self
    }

    /// Resolve a credential and return the tenant's canonical profile,
    /// refreshing it first when forced or incomplete.
    ///
    /// The only error surfaced is `CredentialNotFound`; upstream outages
    /// degrade to serving the best available cached profile.
    pub async fn get_or_refresh(&self, credential: &str, force: bool) -> Result<Profile, HubError> {
        let tenant = self
            .registry
            .resolve(credential)
            .ok_or(HubError::CredentialNotFound)?
            .clone();

        let lock = self.tenant_lock(&tenant.id).await;
        let _guard = lock.lock().await;

        let mut profile = match self.store.get(&tenant.id).await {
            Some(stored) => stored,
            None => Profile::skeleton(&tenant),
        };

        // Light backfill: older stored documents may predate the license
        // fields; they are always present once the credential resolved.
        profile.backfill(&tenant);

        if force || !profile.is_inventory_complete() {
            debug!(
                tenant = %tenant.id,
                force,
                complete = profile.is_inventory_complete(),
                "refreshing profile"
            );
            profile = self.refresh(&tenant, profile).await;
            self.store.put(&tenant.id, profile.clone()).await;
            return Ok(profile);
        }

        Ok(profile)
    }

    /// Run the assembler under the refresh deadline. On deadline expiry the
    /// previous profile is served unchanged: a timed-out refresh is treated
    /// like a refresh whose every sub-fetch came back empty, except that the
    /// sync timestamp keeps reflecting the last successful refresh.
    async fn refresh(&self, tenant: &TenantRecord, previous: Profile) -> Profile {
        let fallback = previous.clone();
        match tokio::time::timeout(
            self.refresh_deadline,
            self.assembler.assemble(tenant, previous),
        )
        .await
        {
            Ok(profile) => profile,
            Err(_) => {
                warn!(
                    tenant = %tenant.id,
                    deadline_secs = self.refresh_deadline.as_secs(),
                    "refresh deadline exceeded, serving previous profile"
                );
                fallback
            }
        }
    }

    async fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
