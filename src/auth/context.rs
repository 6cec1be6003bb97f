use std::sync::{Arc, Mutex, Weak};

use crate::auth::error::AuthResult;
use crate::auth::model::LocalUser;
use crate::auth::persistence::{IdentityPersistence, PersistenceSubscription};
use crate::util::{ObserverList, PartialObserver};

/// Outcome of checking a protected route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectTo(String),
}

/// Owner of the signed-in identity for one dashboard instance.
///
/// The context mirrors the identity store in memory and tells observers when
/// the user signs in or out, including changes made by other tabs. Create it
/// with [`AuthContext::new`], call [`AuthContext::initialize`] once, and
/// [`AuthContext::teardown`] when the host goes away.
pub struct AuthContext {
    persistence: Arc<dyn IdentityPersistence>,
    current: Mutex<Option<LocalUser>>,
    observers: ObserverList<Option<LocalUser>>,
    subscription: Mutex<Option<PersistenceSubscription>>,
}

impl AuthContext {
    pub fn new(persistence: Arc<dyn IdentityPersistence>) -> Arc<Self> {
        Arc::new(Self {
            persistence,
            current: Mutex::new(None),
            observers: ObserverList::default(),
            subscription: Mutex::new(None),
        })
    }

    /// Loads the stored identity and starts following external changes.
    pub fn initialize(self: &Arc<Self>) -> AuthResult<()> {
        let stored = self.persistence.get()?;
        *self.current.lock().unwrap() = stored;

        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = self.persistence.subscribe(Arc::new(move |user| {
            if let Some(context) = weak.upgrade() {
                context.apply_external(user);
            }
        }))?;
        *self.subscription.lock().unwrap() = Some(subscription);
        Ok(())
    }

    /// Stops following the store and drops every observer.
    pub fn teardown(&self) {
        self.subscription.lock().unwrap().take();
        self.observers.clear();
    }

    pub fn persistence(&self) -> Arc<dyn IdentityPersistence> {
        self.persistence.clone()
    }

    pub fn current_user(&self) -> Option<LocalUser> {
        self.current.lock().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    /// Persists `user` as the signed-in identity.
    ///
    /// If the store rejects the write the in-memory state is left unchanged.
    pub fn sign_in(&self, user: LocalUser) -> AuthResult<()> {
        self.replace(Some(user))
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        self.replace(None)
    }

    /// Route gate for protected pages.
    pub fn guard(&self, login_route: &str) -> RouteDecision {
        if self.is_authenticated() {
            RouteDecision::Allow
        } else {
            RouteDecision::RedirectTo(login_route.to_string())
        }
    }

    /// Registers an observer; returns the id for [`AuthContext::remove_observer`].
    pub fn on_auth_state_changed(&self, observer: PartialObserver<Option<LocalUser>>) -> usize {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, id: usize) {
        self.observers.remove(id);
    }

    fn replace(&self, user: Option<LocalUser>) -> AuthResult<()> {
        let previous = std::mem::replace(&mut *self.current.lock().unwrap(), user.clone());
        if let Err(err) = self.persistence.set(user.clone()) {
            *self.current.lock().unwrap() = previous;
            self.observers.notify_error(&err);
            return Err(err);
        }
        if previous != user {
            self.observers.notify(&user);
        }
        Ok(())
    }

    fn apply_external(&self, user: Option<LocalUser>) {
        let changed = {
            let mut current = self.current.lock().unwrap();
            if *current == user {
                false
            } else {
                *current = user.clone();
                true
            }
        };
        if changed {
            log::debug!("identity changed outside this context");
            self.observers.notify(&user);
        }
    }
}
