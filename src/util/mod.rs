pub mod subscribe;

pub use subscribe::{ObserverList, PartialObserver};
