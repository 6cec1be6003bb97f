use std::sync::Arc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{BroadcastChannel, EventTarget, MessageEvent, Storage, StorageEvent, Window};

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::model::LocalUser;
use crate::auth::oauth::{PendingRedirect, RedirectPersistence};

use super::{IdentityPersistence, PersistenceListener, PersistenceSubscription, LOCAL_USER_KEY};

const DEFAULT_CHANNEL_NAME: &str = "nexus-identity";

/// Storage key of the redirect state that has to survive leaving for the provider.
pub const PENDING_REDIRECT_KEY: &str = "nexus_pending_redirect";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WebStorageDriver {
    Local,
    Session,
}

/// Identity store in `localStorage`/`sessionStorage` under [`LOCAL_USER_KEY`].
///
/// Same-origin tabs are kept in sync through `storage` events and a
/// `BroadcastChannel`.
#[derive(Debug, Clone)]
pub struct WebStoragePersistence {
    key: Arc<String>,
    channel_name: Arc<String>,
    driver: WebStorageDriver,
}

impl Default for WebStoragePersistence {
    fn default() -> Self {
        Self::new(WebStorageDriver::Local)
    }
}

impl WebStoragePersistence {
    pub fn new(driver: WebStorageDriver) -> Self {
        Self::with_key(driver, LOCAL_USER_KEY)
    }

    pub fn with_key(driver: WebStorageDriver, key: impl Into<String>) -> Self {
        Self {
            key: Arc::new(key.into()),
            channel_name: Arc::new(DEFAULT_CHANNEL_NAME.to_string()),
            driver,
        }
    }

    fn window() -> AuthResult<Window> {
        browser_window()
    }

    fn storage(&self, window: &Window) -> AuthResult<Storage> {
        web_storage(window, self.driver)
    }

    fn decode(value: &str) -> Option<LocalUser> {
        if value.is_empty() {
            return None;
        }
        serde_json::from_str(value).ok()
    }

    fn broadcast(&self, payload: Option<&str>) {
        if let Ok(channel) = BroadcastChannel::new(self.channel_name.as_ref()) {
            let message = payload.map(JsValue::from_str).unwrap_or(JsValue::NULL);
            if let Err(err) = channel.post_message(&message) {
                log::warn!("identity broadcast failed: {}", stringify_js_error(err));
            }
        }
    }
}

impl IdentityPersistence for WebStoragePersistence {
    fn set(&self, user: Option<LocalUser>) -> AuthResult<()> {
        let storage = self.storage(&Self::window()?)?;

        match user {
            Some(ref user) => {
                let serialized = serde_json::to_string(user).map_err(|err| {
                    AuthError::Persistence(format!("Failed to serialize local user: {err}"))
                })?;
                storage
                    .set_item(self.key.as_ref(), &serialized)
                    .map_err(map_js_error)?;
                self.broadcast(Some(&serialized));
            }
            None => {
                storage.remove_item(self.key.as_ref()).map_err(map_js_error)?;
                self.broadcast(None);
            }
        }
        Ok(())
    }

    fn get(&self) -> AuthResult<Option<LocalUser>> {
        let storage = self.storage(&Self::window()?)?;
        let value = storage.get_item(self.key.as_ref()).map_err(map_js_error)?;
        Ok(value.and_then(|text| Self::decode(&text)))
    }

    fn subscribe(&self, listener: PersistenceListener) -> AuthResult<PersistenceSubscription> {
        let window = Self::window()?;
        let key = self.key.clone();
        let storage_listener = listener.clone();
        let storage_closure = Closure::wrap(Box::new(move |event: StorageEvent| {
            match event.key() {
                // `localStorage.clear()` reports no key.
                None => storage_listener(None),
                Some(event_key) if event_key == *key => storage_listener(
                    event
                        .new_value()
                        .and_then(|value| WebStoragePersistence::decode(&value)),
                ),
                Some(_) => {}
            }
        }) as Box<dyn FnMut(StorageEvent)>);
        let storage_handle = StorageListenerHandle::attach(window.into(), storage_closure)?;

        let broadcast_handle = BroadcastChannel::new(self.channel_name.as_ref())
            .map(|channel| {
                let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
                    let data = event.data();
                    if data.is_null() || data.is_undefined() {
                        listener(None);
                    } else if let Some(text) = data.as_string() {
                        listener(WebStoragePersistence::decode(&text));
                    }
                }) as Box<dyn FnMut(MessageEvent)>);
                BroadcastListenerHandle::attach(channel, closure)
            })
            .map_err(|err| log::warn!("BroadcastChannel unavailable: {}", stringify_js_error(err)))
            .ok();

        Ok(PersistenceSubscription::new(move || {
            drop(storage_handle);
            drop(broadcast_handle);
        }))
    }
}

/// Pending redirect kept in web storage so it outlives the full-page trip to the provider.
///
/// Defaults to `sessionStorage`: the verifier belongs to the tab that started the flow.
#[derive(Debug, Clone)]
pub struct WebStorageRedirectPersistence {
    key: Arc<String>,
    driver: WebStorageDriver,
}

impl Default for WebStorageRedirectPersistence {
    fn default() -> Self {
        Self::new(WebStorageDriver::Session)
    }
}

impl WebStorageRedirectPersistence {
    pub fn new(driver: WebStorageDriver) -> Self {
        Self::with_key(driver, PENDING_REDIRECT_KEY)
    }

    pub fn with_key(driver: WebStorageDriver, key: impl Into<String>) -> Self {
        Self {
            key: Arc::new(key.into()),
            driver,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl RedirectPersistence for WebStorageRedirectPersistence {
    fn set(&self, pending: Option<PendingRedirect>) -> AuthResult<()> {
        let storage = web_storage(&browser_window()?, self.driver)?;
        match pending {
            Some(pending) => {
                let serialized = serde_json::to_string(&pending).map_err(|err| {
                    AuthError::Persistence(format!("Failed to serialize pending redirect: {err}"))
                })?;
                storage
                    .set_item(self.key.as_ref(), &serialized)
                    .map_err(map_js_error)
            }
            None => storage.remove_item(self.key.as_ref()).map_err(map_js_error),
        }
    }

    fn get(&self) -> AuthResult<Option<PendingRedirect>> {
        let storage = web_storage(&browser_window()?, self.driver)?;
        let value = storage.get_item(self.key.as_ref()).map_err(map_js_error)?;
        match value.filter(|text| !text.is_empty()) {
            Some(text) => serde_json::from_str(&text).map(Some).map_err(|err| {
                AuthError::Persistence(format!("Failed to parse pending redirect: {err}"))
            }),
            None => Ok(None),
        }
    }
}

fn browser_window() -> AuthResult<Window> {
    web_sys::window().ok_or_else(|| AuthError::Persistence("window object is not available".into()))
}

fn web_storage(window: &Window, driver: WebStorageDriver) -> AuthResult<Storage> {
    match driver {
        WebStorageDriver::Local => window.local_storage().map_err(map_js_error)?,
        WebStorageDriver::Session => window.session_storage().map_err(map_js_error)?,
    }
    .ok_or_else(|| AuthError::Persistence("Web storage API is unavailable".into()))
}

fn map_js_error(err: JsValue) -> AuthError {
    AuthError::Persistence(format!("Web storage error: {}", stringify_js_error(err)))
}

fn stringify_js_error(err: JsValue) -> String {
    if let Some(text) = err.as_string() {
        return text;
    }
    js_sys::JSON::stringify(&err)
        .ok()
        .and_then(|value| value.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

struct StorageListenerHandle {
    target: EventTarget,
    callback: Closure<dyn FnMut(StorageEvent)>,
}

impl StorageListenerHandle {
    fn attach(target: EventTarget, callback: Closure<dyn FnMut(StorageEvent)>) -> AuthResult<Self> {
        target
            .add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref())
            .map_err(map_js_error)?;
        Ok(Self { target, callback })
    }
}

impl Drop for StorageListenerHandle {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback("storage", self.callback.as_ref().unchecked_ref());
    }
}

// wasm32 is single-threaded; the handles never leave the main thread.
unsafe impl Send for StorageListenerHandle {}
unsafe impl Sync for StorageListenerHandle {}

struct BroadcastListenerHandle {
    channel: BroadcastChannel,
    #[allow(dead_code)]
    callback: Closure<dyn FnMut(MessageEvent)>,
}

impl BroadcastListenerHandle {
    fn attach(channel: BroadcastChannel, callback: Closure<dyn FnMut(MessageEvent)>) -> Self {
        channel.set_onmessage(Some(callback.as_ref().unchecked_ref()));
        Self { channel, callback }
    }
}

impl Drop for BroadcastListenerHandle {
    fn drop(&mut self) {
        self.channel.set_onmessage(None);
        self.channel.close();
    }
}

unsafe impl Send for BroadcastListenerHandle {}
unsafe impl Sync for BroadcastListenerHandle {}
