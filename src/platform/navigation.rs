use std::sync::Mutex;
use std::time::Duration;

use crate::platform::lifecycle::TaskLiveness;
use crate::platform::runtime::sleep;

/// Address bar and client-side router as seen by the callback flows.
pub trait Navigator: Send + Sync {
    /// Full URL currently displayed, when the platform has one.
    fn current_href(&self) -> Option<String>;

    /// Replaces the visible address without adding a history entry.
    fn replace_url(&self, url: &str);

    /// Navigates the client-side router to `route` (e.g. `/squads`).
    fn navigate(&self, route: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigationEvent {
    Replaced(String),
    Navigated(String),
}

/// Navigator that records every call; used by headless drivers and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    href: Mutex<Option<String>>,
    events: Mutex<Vec<NavigationEvent>>,
}

impl RecordingNavigator {
    pub fn with_href(href: impl Into<String>) -> Self {
        Self {
            href: Mutex::new(Some(href.into())),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<NavigationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Last route passed to [`Navigator::navigate`].
    pub fn last_route(&self) -> Option<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|event| match event {
                NavigationEvent::Navigated(route) => Some(route.clone()),
                NavigationEvent::Replaced(_) => None,
            })
    }
}

impl Navigator for RecordingNavigator {
    fn current_href(&self) -> Option<String> {
        self.href.lock().unwrap().clone()
    }

    fn replace_url(&self, url: &str) {
        *self.href.lock().unwrap() = Some(url.to_string());
        self.events
            .lock()
            .unwrap()
            .push(NavigationEvent::Replaced(url.to_string()));
    }

    fn navigate(&self, route: &str) {
        self.events
            .lock()
            .unwrap()
            .push(NavigationEvent::Navigated(route.to_string()));
    }
}

/// A route change a flow wants performed after a delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredNavigation {
    pub route: String,
    pub after: Duration,
}

impl DeferredNavigation {
    pub fn new(route: impl Into<String>, after: Duration) -> Self {
        Self {
            route: route.into(),
            after,
        }
    }

    pub fn immediate(route: impl Into<String>) -> Self {
        Self::new(route, Duration::ZERO)
    }

    /// Waits `after`, then navigates.
    pub async fn perform(&self, navigator: &dyn Navigator) {
        sleep(self.after).await;
        navigator.navigate(&self.route);
    }

    /// Like [`DeferredNavigation::perform`] but skips the navigation if the
    /// owner was abandoned while waiting.
    pub async fn perform_if_live(&self, navigator: &dyn Navigator, liveness: &TaskLiveness) {
        sleep(self.after).await;
        if liveness.is_live() {
            navigator.navigate(&self.route);
        }
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
mod browser {
    use wasm_bindgen::JsValue;

    use super::Navigator;

    /// Navigator backed by `window.location` and `window.history` with a hash router.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct BrowserNavigator;

    impl Navigator for BrowserNavigator {
        fn current_href(&self) -> Option<String> {
            web_sys::window()?.location().href().ok()
        }

        fn replace_url(&self, url: &str) {
            let Some(window) = web_sys::window() else {
                return;
            };
            match window.history() {
                Ok(history) => {
                    if let Err(err) = history.replace_state_with_url(&JsValue::NULL, "", Some(url)) {
                        web_sys::console::error_2(&JsValue::from_str("replaceState"), &err);
                    }
                }
                Err(err) => web_sys::console::error_2(&JsValue::from_str("history"), &err),
            }
        }

        fn navigate(&self, route: &str) {
            if let Some(window) = web_sys::window() {
                if let Err(err) = window.location().set_hash(route) {
                    web_sys::console::error_2(&JsValue::from_str("location.hash"), &err);
                }
            }
        }
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use browser::BrowserNavigator;
