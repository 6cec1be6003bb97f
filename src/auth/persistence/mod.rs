//! Local identity store backends.
//!
//! The store holds at most one [`LocalUser`]. Its presence is what the route
//! gate treats as "signed in".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::auth::error::AuthResult;
use crate::auth::model::LocalUser;

/// Storage key shared with the dashboard front end.
pub const LOCAL_USER_KEY: &str = "nexus_user";

pub type PersistenceListener = Arc<dyn Fn(Option<LocalUser>) + Send + Sync>;

/// Keeps a listener registered until dropped.
pub struct PersistenceSubscription {
    cleanup: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl PersistenceSubscription {
    pub fn new<F>(cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn noop() -> Self {
        Self { cleanup: None }
    }
}

impl Default for PersistenceSubscription {
    fn default() -> Self {
        Self::noop()
    }
}

impl Drop for PersistenceSubscription {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// Storage backend for the signed-in identity.
///
/// `subscribe` should fire when the value changes outside this process (another
/// tab, another instance) so contexts stay in sync.
pub trait IdentityPersistence: Send + Sync {
    fn set(&self, user: Option<LocalUser>) -> AuthResult<()>;
    fn get(&self) -> AuthResult<Option<LocalUser>>;

    fn subscribe(&self, _listener: PersistenceListener) -> AuthResult<PersistenceSubscription> {
        Ok(PersistenceSubscription::noop())
    }
}

#[derive(Default)]
struct InMemoryState {
    value: Option<LocalUser>,
    listeners: Vec<(usize, PersistenceListener)>,
}

pub struct InMemoryPersistence {
    state: Arc<Mutex<InMemoryState>>,
    next_id: AtomicUsize,
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState::default())),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl IdentityPersistence for InMemoryPersistence {
    fn set(&self, user: Option<LocalUser>) -> AuthResult<()> {
        let listeners = {
            let mut guard = self.state.lock().unwrap();
            guard.value = user.clone();
            guard
                .listeners
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect::<Vec<_>>()
        };

        for listener in listeners {
            listener(user.clone());
        }
        Ok(())
    }

    fn get(&self) -> AuthResult<Option<LocalUser>> {
        Ok(self.state.lock().unwrap().value.clone())
    }

    fn subscribe(&self, listener: PersistenceListener) -> AuthResult<PersistenceSubscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().listeners.push((id, listener));

        let state = Arc::downgrade(&self.state);
        Ok(PersistenceSubscription::new(move || {
            if let Some(state) = state.upgrade() {
                if let Ok(mut guard) = state.lock() {
                    guard.listeners.retain(|(listener_id, _)| *listener_id != id);
                }
            }
        }))
    }
}

type DynSetFn = dyn Fn(Option<LocalUser>) -> AuthResult<()> + Send + Sync;
type DynGetFn = dyn Fn() -> AuthResult<Option<LocalUser>> + Send + Sync;

/// Persistence built from a pair of closures, for hosts with their own storage.
pub struct ClosurePersistence {
    set_fn: Arc<DynSetFn>,
    get_fn: Arc<DynGetFn>,
}

impl ClosurePersistence {
    pub fn new<Set, Get>(set: Set, get: Get) -> Self
    where
        Set: Fn(Option<LocalUser>) -> AuthResult<()> + Send + Sync + 'static,
        Get: Fn() -> AuthResult<Option<LocalUser>> + Send + Sync + 'static,
    {
        Self {
            set_fn: Arc::new(set),
            get_fn: Arc::new(get),
        }
    }
}

impl IdentityPersistence for ClosurePersistence {
    fn set(&self, user: Option<LocalUser>) -> AuthResult<()> {
        (self.set_fn)(user)
    }

    fn get(&self) -> AuthResult<Option<LocalUser>> {
        (self.get_fn)()
    }
}

#[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
mod file;

#[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
pub use file::FilePersistence;

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub mod web;

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use web::{
    WebStorageDriver, WebStoragePersistence, WebStorageRedirectPersistence, PENDING_REDIRECT_KEY,
};
