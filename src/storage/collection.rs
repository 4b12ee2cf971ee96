use crate::db::{RealtimeDb, path};
use crate::error::PinsyncError;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{debug, error};

/// Typed CRUD over `users/{uid}/{root}/{id}`.
pub struct Collection<T> {
    db: RealtimeDb,
    root: &'static str,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            root: self.root,
            _item: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(db: RealtimeDb, root: &'static str) -> Self {
        Self {
            db,
            root,
            _item: PhantomData,
        }
    }

    pub fn path(&self, uid: &str, id: Option<&str>) -> Result<String, PinsyncError> {
        match id {
            Some(id) => path::join(&["users", uid, self.root, id]),
            None => path::join(&["users", uid, self.root]),
        }
    }

    pub async fn save(&self, uid: &str, id: &str, item: &T) -> Result<(), PinsyncError> {
        let path = self.path(uid, Some(id))?;
        let value = serde_json::to_value(item)?;
        self.db
            .write(&path, &value)
            .await
            .inspect_err(|e| error!(path = %path, error = %e, "save failed"))?;
        debug!(path = %path, "data saved");
        Ok(())
    }

    pub async fn get(&self, uid: &str, id: &str) -> Result<T, PinsyncError> {
        let path = self.path(uid, Some(id))?;
        let value = self
            .db
            .read(&path)
            .await
            .inspect_err(|e| error!(path = %path, error = %e, "get failed"))?
            .ok_or_else(|| PinsyncError::NotFound("Data not found".to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Every item keyed by id; empty when nothing is stored.
    pub async fn get_all(&self, uid: &str) -> Result<BTreeMap<String, T>, PinsyncError> {
        let path = self.path(uid, None)?;
        let value = self
            .db
            .read(&path)
            .await
            .inspect_err(|e| error!(path = %path, error = %e, "get all failed"))?;
        match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub async fn remove(&self, uid: &str, id: &str) -> Result<(), PinsyncError> {
        let path = self.path(uid, Some(id))?;
        self.db
            .delete(&path)
            .await
            .inspect_err(|e| error!(path = %path, error = %e, "remove failed"))?;
        debug!(path = %path, "data removed");
        Ok(())
    }
}
