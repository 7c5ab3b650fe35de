use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use basket_api::{ApiFailure, BasketApi, MemoryBasket};
use shared::{domain::Collection, error::ApiException};
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListAll,
    Add(String),
    Rename(String, String),
    Remove(String),
}

struct Scripted {
    gate: Option<oneshot::Receiver<()>>,
    result: Result<Collection, ApiFailure>,
}

/// Answers calls from a queue of scripted results, in call order. A gated result
/// is held back until its sender fires.
#[derive(Default)]
pub struct FakeBasket {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBasket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn respond(&self, result: Result<Collection, ApiFailure>) {
        self.script
            .lock()
            .await
            .push_back(Scripted { gate: None, result });
    }

    pub async fn respond_gated(
        &self,
        result: Result<Collection, ApiFailure>,
    ) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.script.lock().await.push_back(Scripted {
            gate: Some(gate),
            result,
        });
        release
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.lock().await.len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("basket was never called");
    }

    async fn answer(&self, call: Call) -> Result<Collection, ApiFailure> {
        self.calls.lock().await.push(call);
        let Some(next) = self.script.lock().await.pop_front() else {
            return Err(ApiFailure::unrecognized("no scripted response"));
        };
        if let Some(gate) = next.gate {
            let _ = gate.await;
        }
        next.result
    }
}

#[async_trait]
impl BasketApi for FakeBasket {
    async fn list_all(&self) -> Result<Collection, ApiFailure> {
        self.answer(Call::ListAll).await
    }

    async fn add(&self, name: &str) -> Result<Collection, ApiFailure> {
        self.answer(Call::Add(name.to_string())).await
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<Collection, ApiFailure> {
        self.answer(Call::Rename(old_name.to_string(), new_name.to_string()))
            .await
    }

    async fn remove(&self, name: &str) -> Result<Collection, ApiFailure> {
        self.answer(Call::Remove(name.to_string())).await
    }
}

pub fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|name| name.to_string()).collect()
}

pub fn ok(raw: &[&str]) -> Result<Collection, ApiFailure> {
    Ok(names(raw))
}

pub fn rejected(exception: ApiException) -> Result<Collection, ApiFailure> {
    Err(ApiFailure::Rejected(exception))
}

pub fn unrecognized(detail: &str) -> Result<Collection, ApiFailure> {
    Err(ApiFailure::unrecognized(detail))
}

pub fn instant_basket(seed: &[&str]) -> Arc<MemoryBasket> {
    Arc::new(MemoryBasket::new(seed.iter().copied(), Duration::ZERO))
}
