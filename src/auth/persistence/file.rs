use std::fs::{remove_file, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::model::LocalUser;
use crate::auth::persistence::{IdentityPersistence, PersistenceListener, PersistenceSubscription};

/// Stores the local user as a JSON file, for native hosts.
#[derive(Clone)]
pub struct FilePersistence {
    path: Arc<PathBuf>,
    listeners: Arc<Mutex<Vec<PersistenceListener>>>,
}

impl std::fmt::Debug for FilePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePersistence").field("path", &self.path).finish()
    }
}

impl FilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn notify_listeners(&self, user: Option<LocalUser>) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener(user.clone());
        }
    }

    fn write(&self, user: &LocalUser) -> AuthResult<()> {
        let serialized = serde_json::to_string(user)
            .map_err(|err| AuthError::Persistence(format!("Failed to serialize local user: {err}")))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                AuthError::Persistence(format!("Failed to create identity store directory: {err}"))
            })?;
        }
        let mut file = File::create(&*self.path)
            .map_err(|err| AuthError::Persistence(format!("Failed to create identity file: {err}")))?;
        file.write_all(serialized.as_bytes())
            .map_err(|err| AuthError::Persistence(format!("Failed to write identity file: {err}")))
    }
}

impl IdentityPersistence for FilePersistence {
    fn set(&self, user: Option<LocalUser>) -> AuthResult<()> {
        match &user {
            Some(user) => self.write(user)?,
            None if self.path.exists() => remove_file(&*self.path).map_err(|err| {
                AuthError::Persistence(format!("Failed to remove identity file: {err}"))
            })?,
            None => {}
        }

        self.notify_listeners(user);
        Ok(())
    }

    fn get(&self) -> AuthResult<Option<LocalUser>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut buffer = String::new();
        File::open(&*self.path)
            .and_then(|mut file| file.read_to_string(&mut buffer))
            .map_err(|err| AuthError::Persistence(format!("Failed to read identity file: {err}")))?;

        if buffer.trim().is_empty() {
            return Ok(None);
        }

        // A corrupt entry reads as signed out rather than as an error.
        match serde_json::from_str(&buffer) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                log::warn!("ignoring unreadable identity file {}: {err}", self.path.display());
                Ok(None)
            }
        }
    }

    fn subscribe(&self, listener: PersistenceListener) -> AuthResult<PersistenceSubscription> {
        self.listeners.lock().unwrap().push(listener.clone());

        let listeners = Arc::downgrade(&self.listeners);
        Ok(PersistenceSubscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                if let Ok(mut guard) = listeners.lock() {
                    guard.retain(|existing| !Arc::ptr_eq(existing, &listener));
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("nexus-identity-test-{}-{}.json", name, std::process::id()));
        path
    }

    #[test]
    fn stores_and_clears_local_user() {
        let path = temp_path("store");
        let persistence = FilePersistence::new(&path);
        let user = LocalUser {
            id: "usr-1".into(),
            email: "demo@nexus.com".into(),
            name: "Demo User".into(),
        };

        persistence.set(Some(user.clone())).unwrap();
        assert_eq!(persistence.get().unwrap(), Some(user));

        persistence.set(None).unwrap();
        assert!(persistence.get().unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_reads_as_signed_out() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        let persistence = FilePersistence::new(&path);

        assert!(persistence.get().unwrap().is_none());
        let _ = remove_file(path);
    }
}
