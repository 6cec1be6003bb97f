//! Remote data store for integration rows.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::model::{Integration, IntegrationStatus, IntegrationUpsert};

mod rest;

pub use rest::RestIntegrationStore;

/// Persistence for the `integrations` table.
///
/// Rows are unique per `(project_id, provider)` and are never deleted; a
/// disconnect only flips the status.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait IntegrationStore: Send + Sync {
    /// Inserts the row or replaces status, metadata and organization of the existing one.
    async fn upsert(&self, row: IntegrationUpsert) -> IntegrationResult<Integration>;

    async fn set_status(&self, id: &str, status: IntegrationStatus)
        -> IntegrationResult<Integration>;

    async fn list_for_project(&self, project_id: &str) -> IntegrationResult<Vec<Integration>>;
}

/// Process-local store used offline and in tests.
#[derive(Default)]
pub struct InMemoryIntegrationStore {
    rows: Mutex<Vec<Integration>>,
    next_id: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<Integration> {
        self.rows.lock().unwrap().clone()
    }

    /// Makes every later write fail with [`IntegrationError::Persistence`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> IntegrationResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(IntegrationError::Persistence("store is read-only".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl IntegrationStore for InMemoryIntegrationStore {
    async fn upsert(&self, row: IntegrationUpsert) -> IntegrationResult<Integration> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows
            .iter_mut()
            .find(|existing| existing.project_id == row.project_id && existing.provider == row.provider)
        {
            existing.status = row.status;
            existing.metadata = row.metadata;
            existing.organization_id = row.organization_id;
            return Ok(existing.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let integration = Integration {
            id: format!("int-{id}"),
            project_id: row.project_id,
            provider: row.provider,
            status: row.status,
            metadata: row.metadata,
            organization_id: row.organization_id,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        rows.push(integration.clone());
        Ok(integration)
    }

    async fn set_status(
        &self,
        id: &str,
        status: IntegrationStatus,
    ) -> IntegrationResult<Integration> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| IntegrationError::NotFound(id.to_string()))?;
        row.status = status;
        Ok(row.clone())
    }

    async fn list_for_project(&self, project_id: &str) -> IntegrationResult<Vec<Integration>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.project_id == project_id)
            .cloned()
            .collect())
    }
}
