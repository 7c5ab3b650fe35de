use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use shared::domain::ItemKey;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{BasketEvent, CollectionController, ViewState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowEditState {
    pub target_name: String,
    pub draft_value: String,
    pub is_busy: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPhase {
    Idle,
    Editing,
    Saving,
}

/// Everything a list renderer needs besides the collection itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowSnapshot {
    pub editing: Option<RowEditState>,
    pub deleting: BTreeSet<ItemKey>,
    pub delete_errors: BTreeMap<ItemKey, String>,
}

/// A row action refused by a guard. Refused actions leave all state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditRejected {
    #[error("another row is already being edited")]
    RowLocked,
    #[error("the collection is loading or submitting")]
    CollectionBusy,
    #[error("no row is being edited")]
    NotEditing,
    #[error("the edited row is saving")]
    Saving,
    #[error("{0} is not in the collection")]
    UnknownItem(String),
    #[error("a delete for {0} is already in flight")]
    DeleteInFlight(String),
    #[error("name must not be blank")]
    BlankName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Applied,
    Failed(String),
}

pub struct RowEditController {
    collection: Arc<CollectionController>,
    inner: Mutex<RowSnapshot>,
}

impl RowEditController {
    pub fn new(collection: Arc<CollectionController>) -> Arc<Self> {
        Arc::new(Self {
            collection,
            inner: Mutex::new(RowSnapshot::default()),
        })
    }

    pub fn collection(&self) -> &Arc<CollectionController> {
        &self.collection
    }

    pub async fn snapshot(&self) -> RowSnapshot {
        self.rows().clone()
    }

    pub async fn editing(&self) -> Option<RowEditState> {
        self.rows().editing.clone()
    }

    pub async fn phase(&self, name: &str) -> RowPhase {
        let guard = self.rows();
        match &guard.editing {
            Some(edit) if ItemKey::new(&edit.target_name) == ItemKey::new(name) => {
                if edit.is_busy {
                    RowPhase::Saving
                } else {
                    RowPhase::Editing
                }
            }
            _ => RowPhase::Idle,
        }
    }

    pub async fn delete_error(&self, name: &str) -> Option<String> {
        self.rows().delete_errors.get(&ItemKey::new(name)).cloned()
    }

    pub async fn can_edit(&self, name: &str) -> bool {
        let view = self.collection.view().await;
        let guard = self.rows();
        row_guard(&view, &guard, name).is_ok()
    }

    pub async fn can_delete(&self, name: &str) -> bool {
        self.can_edit(name).await
    }

    pub async fn begin_edit(&self, name: &str) -> Result<(), EditRejected> {
        let view = self.collection.view().await;
        let mut guard = self.rows();
        row_guard(&view, &guard, name)?;

        guard.editing = Some(RowEditState {
            target_name: name.to_string(),
            draft_value: name.to_string(),
            is_busy: false,
            error: None,
        });
        debug!(name, "row: editing started");
        self.publish(&guard);
        Ok(())
    }

    pub async fn change_draft(&self, value: impl Into<String>) -> Result<(), EditRejected> {
        let mut guard = self.rows();
        let edit = editable(&mut guard.editing)?;
        edit.draft_value = value.into();
        self.publish(&guard);
        Ok(())
    }

    pub async fn cancel(&self) -> Result<(), EditRejected> {
        let mut guard = self.rows();
        let edit = editable(&mut guard.editing)?;
        debug!(name = %edit.target_name, "row: editing cancelled");
        guard.editing = None;
        self.publish(&guard);
        Ok(())
    }

    /// Saves the draft through the collection. A failed save keeps the row in edit mode
    /// with the error attached so the user can retry or cancel.
    pub async fn commit(&self) -> Result<RowOutcome, EditRejected> {
        let (target_name, new_name) = {
            let mut guard = self.rows();
            let edit = editable(&mut guard.editing)?;
            let new_name = edit.draft_value.trim().to_string();
            if new_name.is_empty() {
                return Err(EditRejected::BlankName);
            }
            edit.is_busy = true;
            edit.error = None;
            let target_name = edit.target_name.clone();
            self.publish(&guard);
            (target_name, new_name)
        };
        let key = ItemKey::new(&target_name);
        let pending = PendingRow::saving(self, key.clone());

        let result = self
            .collection
            .try_rename_item(&target_name, &new_name)
            .await;

        let mut guard = pending.settle();
        let outcome = match result {
            Ok(()) => {
                info!(old_name = %target_name, new_name = %new_name, "row: rename saved");
                guard.editing = None;
                guard.delete_errors.remove(&key);
                RowOutcome::Applied
            }
            Err(err) => {
                if let Some(edit) = guard.editing.as_mut() {
                    edit.is_busy = false;
                    edit.error = Some(err.message.clone());
                }
                RowOutcome::Failed(err.message)
            }
        };
        self.publish(&guard);
        Ok(outcome)
    }

    /// Deletes one row. Its failure is reported on that row only.
    pub async fn delete_row(&self, name: &str) -> Result<RowOutcome, EditRejected> {
        let key = ItemKey::new(name);
        {
            let view = self.collection.view().await;
            let mut guard = self.rows();
            row_guard(&view, &guard, name)?;
            guard.deleting.insert(key.clone());
            self.publish(&guard);
        }
        let pending = PendingRow::deleting(self, key.clone());

        let result = self.collection.try_remove_item(name).await;

        let mut guard = pending.settle();
        guard.deleting.remove(&key);
        let outcome = match result {
            Ok(()) => {
                guard.delete_errors.remove(&key);
                RowOutcome::Applied
            }
            Err(err) => {
                guard.delete_errors.insert(key, err.message.clone());
                RowOutcome::Failed(err.message)
            }
        };
        self.publish(&guard);
        Ok(outcome)
    }

    fn rows(&self) -> MutexGuard<'_, RowSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: &RowSnapshot) {
        self.collection.publish(BasketEvent::Row(snapshot.clone()));
    }
}

#[derive(Clone, Copy)]
enum PendingAction {
    Save,
    Delete,
}

/// Busy state a row raised for an outstanding request. If the request is dropped
/// before it settles, the row is returned to where the user can act on it again.
struct PendingRow<'a> {
    rows: &'a RowEditController,
    key: ItemKey,
    action: PendingAction,
    settled: bool,
}

impl<'a> PendingRow<'a> {
    fn saving(rows: &'a RowEditController, key: ItemKey) -> Self {
        Self {
            rows,
            key,
            action: PendingAction::Save,
            settled: false,
        }
    }

    fn deleting(rows: &'a RowEditController, key: ItemKey) -> Self {
        Self {
            rows,
            key,
            action: PendingAction::Delete,
            settled: false,
        }
    }

    fn settle(mut self) -> MutexGuard<'a, RowSnapshot> {
        self.settled = true;
        let rows = self.rows;
        rows.rows()
    }
}

impl Drop for PendingRow<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut guard = self.rows.rows();
        match self.action {
            PendingAction::Save => {
                if let Some(edit) = guard.editing.as_mut() {
                    if edit.is_busy && ItemKey::new(&edit.target_name) == self.key {
                        warn!(name = %edit.target_name, "row: save abandoned before it resolved");
                        edit.is_busy = false;
                    }
                }
            }
            PendingAction::Delete => {
                if guard.deleting.remove(&self.key) {
                    warn!(key = ?self.key, "row: delete abandoned before it resolved");
                }
            }
        }
        self.rows.publish(&guard);
    }
}

fn row_guard(view: &ViewState, rows: &RowSnapshot, name: &str) -> Result<(), EditRejected> {
    if rows.editing.is_some() {
        return Err(EditRejected::RowLocked);
    }
    if view.is_busy() {
        return Err(EditRejected::CollectionBusy);
    }
    if !view.contains(name) {
        return Err(EditRejected::UnknownItem(name.to_string()));
    }
    if rows.deleting.contains(&ItemKey::new(name)) {
        return Err(EditRejected::DeleteInFlight(name.to_string()));
    }
    Ok(())
}

fn editable(editing: &mut Option<RowEditState>) -> Result<&mut RowEditState, EditRejected> {
    match editing {
        None => Err(EditRejected::NotEditing),
        Some(edit) if edit.is_busy => Err(EditRejected::Saving),
        Some(edit) => Ok(edit),
    }
}
