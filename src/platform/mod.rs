//! Runtime, lifecycle and environment helpers shared by the flows.
pub mod environment;
pub mod lifecycle;
pub mod navigation;
pub mod runtime;

#[doc(inline)]
pub use lifecycle::{OnceGate, TaskLiveness};

#[doc(inline)]
pub use navigation::{DeferredNavigation, NavigationEvent, Navigator, RecordingNavigator};

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
#[doc(inline)]
pub use navigation::BrowserNavigator;
