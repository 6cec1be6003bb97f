use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type NextFn<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;
pub type ErrorFn = Arc<dyn Fn(&dyn Error) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct PartialObserver<T> {
    pub next: Option<NextFn<T>>,
    pub error: Option<ErrorFn>,
}

impl<T> PartialObserver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_next<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(callback));
        self
    }

    pub fn with_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&dyn Error) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(callback));
        self
    }
}

impl<T> Default for PartialObserver<T> {
    fn default() -> Self {
        Self {
            next: None,
            error: None,
        }
    }
}

/// Registry of observers keyed by a subscription id.
pub struct ObserverList<T> {
    observers: Mutex<Vec<(usize, PartialObserver<T>)>>,
    next_id: AtomicUsize,
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl<T> ObserverList<T> {
    /// Adds an observer and returns the id used to remove it again.
    pub fn add(&self, observer: PartialObserver<T>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().unwrap().push((id, observer));
        id
    }

    pub fn remove(&self, id: usize) {
        self.observers
            .lock()
            .unwrap()
            .retain(|(observer_id, _)| *observer_id != id);
    }

    pub fn clear(&self) {
        self.observers.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every `next` callback. Callbacks run outside the registry lock.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<NextFn<T>> = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, observer)| observer.next.clone())
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn notify_error(&self, error: &dyn Error) {
        let callbacks: Vec<ErrorFn> = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, observer)| observer.error.clone())
            .collect();
        for callback in callbacks {
            callback(error);
        }
    }
}
