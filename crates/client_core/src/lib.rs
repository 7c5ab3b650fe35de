//! Client-side view state for a fruit basket: the cached collection, the add form,
//! and the single-row inline editor, all reconciled against an injected [`BasketApi`].

use serde::Serialize;
use shared::domain::Collection;

mod add_form;
mod collection;
mod row_edit;

pub use add_form::AddForm;
pub use basket_api::{ApiFailure, BasketApi};
pub use collection::{failure_message, CollectionController, OperationError, OperationKind};
pub use row_edit::{
    EditRejected, RowEditController, RowEditState, RowOutcome, RowPhase, RowSnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub items: Collection,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_submitting: bool,
}

impl ViewState {
    fn initial() -> Self {
        Self {
            items: Vec::new(),
            is_loading: true,
            error: None,
            is_submitting: false,
        }
    }

    /// True while the add form or the initial load holds the collection.
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_submitting
    }

    pub fn contains(&self, name: &str) -> bool {
        shared::domain::position_of(&self.items, name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BasketEvent {
    View(ViewState),
    Row(RowSnapshot),
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
