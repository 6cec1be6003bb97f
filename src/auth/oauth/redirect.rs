use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::auth::error::AuthResult;

/// State recorded before leaving for the provider, consumed on return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingRedirect {
    pub provider_id: String,
    pub operation: RedirectOperation,
    /// PKCE verifier needed by the code exchange.
    pub code_verifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedirectOperation {
    SignIn,
    LinkIntegration { project_id: String },
}

pub trait RedirectPersistence: Send + Sync {
    fn set(&self, pending: Option<PendingRedirect>) -> AuthResult<()>;
    fn get(&self) -> AuthResult<Option<PendingRedirect>>;

    /// Reads and clears the pending redirect.
    fn take(&self) -> AuthResult<Option<PendingRedirect>> {
        let pending = self.get()?;
        if pending.is_some() {
            self.set(None)?;
        }
        Ok(pending)
    }
}

#[derive(Default, Debug)]
pub struct InMemoryRedirectPersistence {
    inner: Mutex<Option<PendingRedirect>>,
}

impl RedirectPersistence for InMemoryRedirectPersistence {
    fn set(&self, pending: Option<PendingRedirect>) -> AuthResult<()> {
        *self.inner.lock().unwrap() = pending;
        Ok(())
    }

    fn get(&self) -> AuthResult<Option<PendingRedirect>> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn take(&self) -> AuthResult<Option<PendingRedirect>> {
        Ok(self.inner.lock().unwrap().take())
    }
}

impl InMemoryRedirectPersistence {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_pending_redirect() {
        let persistence = InMemoryRedirectPersistence::shared();
        let pending = PendingRedirect {
            provider_id: "google".into(),
            operation: RedirectOperation::LinkIntegration {
                project_id: "pj-1".into(),
            },
            code_verifier: Some("verifier".into()),
        };

        persistence.set(Some(pending.clone())).unwrap();
        assert_eq!(persistence.get().unwrap(), Some(pending.clone()));
        assert_eq!(persistence.take().unwrap(), Some(pending));
        assert_eq!(persistence.get().unwrap(), None);
    }

    #[test]
    fn operation_serializes_with_kind_tag() {
        let value = serde_json::to_value(RedirectOperation::LinkIntegration {
            project_id: "pj-1".into(),
        })
        .unwrap();
        assert_eq!(value["kind"], "link_integration");
        assert_eq!(value["project_id"], "pj-1");
    }
}
