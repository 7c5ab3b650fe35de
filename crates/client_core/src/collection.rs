use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use basket_api::{ApiFailure, BasketApi};
use shared::domain::Collection;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{BasketEvent, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Load,
    Add,
    Rename,
    Remove,
}

impl OperationKind {
    pub fn default_message(self) -> &'static str {
        match self {
            Self::Load => "Failed to load fruits",
            Self::Add => "Failed to add fruit",
            Self::Rename => "Failed to update fruit",
            Self::Remove => "Failed to delete fruit",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Add => "add",
            Self::Rename => "rename",
            Self::Remove => "remove",
        }
    }
}

/// A failed collection operation, already reduced to the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    pub kind: OperationKind,
    pub message: String,
}

/// The failure's own message when it has one, the operation's default otherwise.
pub fn failure_message(kind: OperationKind, failure: &ApiFailure) -> String {
    failure
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| kind.default_message().to_string())
}

struct CollectionState {
    view: ViewState,
    last_applied_ticket: u64,
    initial_load_pending: bool,
    loads_in_flight: usize,
    submissions_in_flight: usize,
}

pub struct CollectionController {
    api: Arc<dyn BasketApi>,
    inner: Mutex<CollectionState>,
    next_ticket: AtomicU64,
    events: broadcast::Sender<BasketEvent>,
}

impl CollectionController {
    pub fn new(api: Arc<dyn BasketApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            inner: Mutex::new(CollectionState {
                view: ViewState::initial(),
                last_applied_ticket: 0,
                initial_load_pending: true,
                loads_in_flight: 0,
                submissions_in_flight: 0,
            }),
            next_ticket: AtomicU64::new(0),
            events,
        })
    }

    /// Builds the controller and spawns its initial load on the current runtime.
    pub fn start(api: Arc<dyn BasketApi>) -> (Arc<Self>, JoinHandle<()>) {
        let controller = Self::new(api);
        let task = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.load().await }
        });
        (controller, task)
    }

    pub async fn view(&self) -> ViewState {
        self.state().view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BasketEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: BasketEvent) {
        let _ = self.events.send(event);
    }

    pub async fn load(&self) {
        let _ = self.run(OperationKind::Load, self.api.list_all()).await;
    }

    pub async fn add_item(&self, name: &str) -> bool {
        self.try_add_item(name).await.is_ok()
    }

    pub async fn try_add_item(&self, name: &str) -> Result<(), OperationError> {
        self.run(OperationKind::Add, self.api.add(name)).await
    }

    pub async fn rename_item(&self, old_name: &str, new_name: &str) -> bool {
        self.try_rename_item(old_name, new_name).await.is_ok()
    }

    pub async fn try_rename_item(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), OperationError> {
        self.run(OperationKind::Rename, self.api.rename(old_name, new_name))
            .await
    }

    pub async fn remove_item(&self, name: &str) -> bool {
        self.try_remove_item(name).await.is_ok()
    }

    pub async fn try_remove_item(&self, name: &str) -> Result<(), OperationError> {
        self.run(OperationKind::Remove, self.api.remove(name)).await
    }

    /// Runs one request. When a mutation's success turns out to be older than what is
    /// already shown, the collection is reloaded so the newer server state is not lost.
    async fn run<F>(&self, kind: OperationKind, call: F) -> Result<(), OperationError>
    where
        F: Future<Output = Result<Collection, ApiFailure>>,
    {
        let flight = self.dispatch(kind);
        let outcome = call.await;
        let settled = self.settle(flight, outcome);

        if settled.stale && kind != OperationKind::Load {
            debug!(operation = kind.label(), "collection: reloading after stale response");
            let refresh = self.dispatch(OperationKind::Load);
            let outcome = self.api.list_all().await;
            self.settle(refresh, outcome);
        }
        settled.result
    }

    fn dispatch(&self, kind: OperationKind) -> InFlight<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state();
            match kind {
                OperationKind::Load => {
                    state.initial_load_pending = false;
                    state.loads_in_flight += 1;
                }
                OperationKind::Add => state.submissions_in_flight += 1,
                OperationKind::Rename | OperationKind::Remove => {}
            }
            state.view.error = None;
            refresh_flags(&mut state);
            self.publish(BasketEvent::View(state.view.clone()));
        }
        debug!(operation = kind.label(), ticket, "collection: request dispatched");
        InFlight {
            controller: self,
            kind,
            ticket,
            settled: false,
        }
    }

    fn settle(
        &self,
        mut flight: InFlight<'_>,
        outcome: Result<Collection, ApiFailure>,
    ) -> Settled {
        flight.settled = true;
        let (kind, ticket) = (flight.kind, flight.ticket);

        let mut state = self.state();
        release(&mut state, kind);

        let mut stale = false;
        let result = match outcome {
            Ok(items) => {
                if ticket > state.last_applied_ticket {
                    info!(
                        operation = kind.label(),
                        ticket,
                        count = items.len(),
                        "collection: response applied"
                    );
                    state.last_applied_ticket = ticket;
                    state.view.items = items;
                } else {
                    debug!(
                        operation = kind.label(),
                        ticket,
                        last_applied = state.last_applied_ticket,
                        "collection: stale response discarded"
                    );
                    stale = true;
                }
                Ok(())
            }
            Err(failure) => {
                let message = failure_message(kind, &failure);
                warn!(
                    operation = kind.label(),
                    ticket,
                    error = %failure,
                    "collection: request failed"
                );
                state.view.error = Some(message.clone());
                Err(OperationError { kind, message })
            }
        };

        refresh_flags(&mut state);
        self.publish(BasketEvent::View(state.view.clone()));
        Settled { result, stale }
    }

    fn state(&self) -> MutexGuard<'_, CollectionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Settled {
    result: Result<(), OperationError>,
    stale: bool,
}

/// A dispatched request whose busy flag is still raised. Dropping it unsettled, as
/// happens when the caller's future is cancelled, lowers the flag and republishes.
struct InFlight<'a> {
    controller: &'a CollectionController,
    kind: OperationKind,
    ticket: u64,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(
            operation = self.kind.label(),
            ticket = self.ticket,
            "collection: request abandoned before it resolved"
        );
        let mut state = self.controller.state();
        release(&mut state, self.kind);
        refresh_flags(&mut state);
        self.controller.publish(BasketEvent::View(state.view.clone()));
    }
}

fn release(state: &mut CollectionState, kind: OperationKind) {
    match kind {
        OperationKind::Load => state.loads_in_flight -= 1,
        OperationKind::Add => state.submissions_in_flight -= 1,
        OperationKind::Rename | OperationKind::Remove => {}
    }
}

fn refresh_flags(state: &mut CollectionState) {
    state.view.is_loading = state.initial_load_pending || state.loads_in_flight > 0;
    state.view.is_submitting = state.submissions_in_flight > 0;
}
