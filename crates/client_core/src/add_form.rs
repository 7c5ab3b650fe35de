use std::sync::Arc;

use crate::{CollectionController, EditRejected};

/// The "add a fruit" input. Blank input never reaches the collection.
pub struct AddForm {
    collection: Arc<CollectionController>,
    value: String,
}

impl AddForm {
    pub fn new(collection: Arc<CollectionController>) -> Self {
        Self {
            collection,
            value: String::new(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub async fn can_submit(&self) -> bool {
        !self.collection.view().await.is_busy()
    }

    /// Clears the input and submits its trimmed value. Returns whether the add succeeded;
    /// the failure text lands in the collection's error.
    pub async fn submit(&mut self) -> Result<bool, EditRejected> {
        let name = self.value.trim().to_string();
        if name.is_empty() {
            return Err(EditRejected::BlankName);
        }
        if !self.can_submit().await {
            return Err(EditRejected::CollectionBusy);
        }

        self.value.clear();
        Ok(self.collection.add_item(&name).await)
    }
}
