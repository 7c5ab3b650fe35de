use std::time::Duration;

use async_trait::async_trait;
use shared::{
    domain::{position_of, same_item, sorted_collection, Collection},
    error::{ApiException, ErrorCode},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod config;

pub use config::{load_settings_from, BasketSettings};

pub const DEFAULT_LATENCY: Duration = Duration::from_millis(2000);

pub const DEFAULT_SEED: [&str; 10] = [
    "Apple",
    "Banana",
    "Blueberry",
    "Cherry",
    "Kiwi",
    "Mango",
    "Orange",
    "Pear",
    "Pineapple",
    "Strawberry",
];

#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error(transparent)]
    Rejected(#[from] ApiException),
    /// A failure that carries nothing fit to show a user.
    #[error("unrecognized failure: {detail}")]
    Unrecognized { detail: String },
}

impl ApiFailure {
    pub fn unrecognized(detail: impl Into<String>) -> Self {
        Self::Unrecognized {
            detail: detail.into(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected(exception) => Some(exception.message.as_str()),
            Self::Unrecognized { .. } => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected(exception) => Some(exception.code),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Authoritative store of item names. Every mutation answers with the whole sorted collection.
#[async_trait]
pub trait BasketApi: Send + Sync {
    async fn list_all(&self) -> Result<Collection, ApiFailure>;
    async fn add(&self, name: &str) -> Result<Collection, ApiFailure>;
    async fn rename(&self, old_name: &str, new_name: &str) -> Result<Collection, ApiFailure>;
    async fn remove(&self, name: &str) -> Result<Collection, ApiFailure>;
}

pub struct MemoryBasket {
    fruits: Mutex<Vec<String>>,
    latency: Duration,
}

impl MemoryBasket {
    pub fn new<I, S>(seed: I, latency: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fruits: Vec<String> = Vec::new();
        for name in seed.into_iter().map(Into::into) {
            if position_of(&fruits, &name).is_some() {
                warn!(name = %name, "basket: dropping duplicate seed item");
                continue;
            }
            fruits.push(name);
        }

        Self {
            fruits: Mutex::new(fruits),
            latency,
        }
    }

    pub fn with_default_seed(latency: Duration) -> Self {
        Self::new(DEFAULT_SEED, latency)
    }

    pub fn from_settings(settings: &BasketSettings) -> Self {
        Self::new(settings.seed.iter().cloned(), settings.latency())
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl BasketApi for MemoryBasket {
    async fn list_all(&self) -> Result<Collection, ApiFailure> {
        self.simulate_latency().await;
        let fruits = self.fruits.lock().await;
        debug!(count = fruits.len(), "basket: listing items");
        Ok(sorted_collection(&fruits))
    }

    async fn add(&self, name: &str) -> Result<Collection, ApiFailure> {
        self.simulate_latency().await;
        let mut fruits = self.fruits.lock().await;
        if position_of(&fruits, name).is_some() {
            return Err(ApiException::already_exists(name).into());
        }

        fruits.push(name.to_string());
        info!(name, count = fruits.len(), "basket: item added");
        Ok(sorted_collection(&fruits))
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<Collection, ApiFailure> {
        self.simulate_latency().await;
        let mut fruits = self.fruits.lock().await;
        let Some(index) = position_of(&fruits, old_name) else {
            return Err(ApiException::not_found(old_name).into());
        };
        if !same_item(old_name, new_name) && position_of(&fruits, new_name).is_some() {
            return Err(ApiException::already_in_use(new_name).into());
        }

        fruits[index] = new_name.to_string();
        info!(old_name, new_name, "basket: item renamed");
        Ok(sorted_collection(&fruits))
    }

    async fn remove(&self, name: &str) -> Result<Collection, ApiFailure> {
        self.simulate_latency().await;
        let mut fruits = self.fruits.lock().await;
        let Some(index) = position_of(&fruits, name) else {
            return Err(ApiException::not_found(name).into());
        };

        fruits.remove(index);
        info!(name, count = fruits.len(), "basket: item removed");
        Ok(sorted_collection(&fruits))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
