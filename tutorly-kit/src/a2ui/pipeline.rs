//! A2UI Action Pipeline
//!
//! A bounded, priority-ordered queue of [`Action`]s drained by a background
//! tokio task that hands each one to the handler registered for its
//! [`ActionType`].
//!
//! ```text
//! enqueue ──► ActionQueue (high | normal | low) ──► drain task ──► handler
//!                 │ overflow                              │
//!                 ▼                                       ▼
//!              Dropped                               Completed
//! ```
//!
//! All queue mutations go through one mutex, and lifecycle events are sent
//! while it is held, so each action's events arrive as `Queued`,
//! `Processing`, `Completed` (or `Dropped`). Handlers run outside it, on
//! their own task, so a slow or panicking handler never blocks `enqueue`.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};

use super::action::{Action, ActionPriority, ActionType};
use super::error::ActionError;

pub const DEFAULT_CAPACITY: usize = 50;

const EVENT_BUFFER: usize = 256;

/// Pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Most actions held at once, across all tiers
    pub capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Result of offering an action to a full or non-full queue
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Admitted without displacing anything
    Queued,
    /// Admitted; the returned lower-priority action was dropped for it
    Evicted(Action),
    /// Not admitted; the queue is full of equal or higher priority work
    Rejected(Action),
}

impl PushOutcome {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, PushOutcome::Rejected(_))
    }
}

/// Bounded three-tier queue. High is served first, FIFO within a tier.
///
/// When full, the oldest entry of the lowest non-empty tier makes room for a
/// strictly higher-priority arrival. Otherwise the arrival is turned away.
#[derive(Debug, Clone)]
pub struct ActionQueue {
    capacity: usize,
    /// Indexed by [`tier`]
    tiers: [VecDeque<Action>; 3],
}

fn tier(priority: ActionPriority) -> usize {
    match priority {
        ActionPriority::Low => 0,
        ActionPriority::Normal => 1,
        ActionPriority::High => 2,
    }
}

impl ActionQueue {
    pub fn new(capacity: usize) -> Self {
        ActionQueue {
            capacity,
            tiers: Default::default(),
        }
    }

    pub fn push(&mut self, action: Action) -> PushOutcome {
        let incoming = tier(action.priority());

        if self.len() < self.capacity {
            self.tiers[incoming].push_back(action);
            return PushOutcome::Queued;
        }

        let lowest = self.tiers.iter().position(|t| !t.is_empty());
        match lowest {
            Some(lowest) if incoming > lowest => match self.tiers[lowest].pop_front() {
                Some(victim) => {
                    self.tiers[incoming].push_back(action);
                    PushOutcome::Evicted(victim)
                }
                None => PushOutcome::Rejected(action),
            },
            _ => PushOutcome::Rejected(action),
        }
    }

    /// Next action to run: the oldest of the highest non-empty tier
    pub fn pop(&mut self) -> Option<Action> {
        self.tiers.iter_mut().rev().find_map(VecDeque::pop_front)
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued actions at a priority
    pub fn len_of(&self, priority: ActionPriority) -> usize {
        self.tiers[tier(priority)].len()
    }

    /// Remove everything, highest tier first
    pub fn drain(&mut self) -> Vec<Action> {
        self.tiers
            .iter_mut()
            .rev()
            .flat_map(|t| t.drain(..))
            .collect()
    }
}

/// Runs actions of one type.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, action: Action) -> BoxFuture<'static, Result<(), ActionError>>;
}

struct FnHandler<F>(F);

impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Action) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn handle(&self, action: Action) -> BoxFuture<'static, Result<(), ActionError>> {
        Box::pin((self.0)(action))
    }
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Why an action left the queue without running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    Overflow,
    Cleared,
    ShutDown,
}

/// Lifecycle transition of a single action
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Queued(Action),
    Processing(Action),
    /// The handler finished; `error` is set when it failed
    Completed {
        action: Action,
        error: Option<ActionError>,
    },
    Dropped {
        action: Action,
        reason: DropReason,
    },
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDiagnostics {
    pub total_queued: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
    pub capacity: usize,
    pub processing: bool,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
}

struct State {
    queue: ActionQueue,
    worker_active: bool,
    closed: bool,
    completed: u64,
    failed: u64,
    dropped: u64,
}

struct Inner {
    state: Mutex<State>,
    handlers: RwLock<HashMap<ActionType, Arc<dyn ActionHandler>>>,
    default_handler: RwLock<Option<Arc<dyn ActionHandler>>>,
    processing: watch::Sender<bool>,
    events: broadcast::Sender<PipelineEvent>,
    runtime: Handle,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn handler_for(&self, action_type: &ActionType) -> Option<Arc<dyn ActionHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(action_type).cloned().or_else(|| {
            self.default_handler
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }
}

/// The action pipeline for a session.
///
/// Cheap to clone; clones share the queue and handlers.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = ActionPipeline::new(Handle::current(), PipelineConfig::default());
/// pipeline.register_handler(
///     ActionType::BackgroundTask,
///     handler_fn(|action: Action| async move {
///         sync_progress(&action).await;
///         Ok::<_, ActionError>(())
///     }),
/// );
///
/// pipeline.enqueue(Action::new("sync", "root", ActionType::BackgroundTask))?;
/// pipeline.wait_idle().await;
/// ```
#[derive(Clone)]
pub struct ActionPipeline {
    inner: Arc<Inner>,
}

impl ActionPipeline {
    /// Create a pipeline whose drain task runs on `runtime`
    pub fn new(runtime: Handle, config: PipelineConfig) -> Self {
        let (processing, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        ActionPipeline {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: ActionQueue::new(config.capacity),
                    worker_active: false,
                    closed: false,
                    completed: 0,
                    failed: 0,
                    dropped: 0,
                }),
                handlers: RwLock::new(HashMap::new()),
                default_handler: RwLock::new(None),
                processing,
                events,
                runtime,
            }),
        }
    }

    /// Register or replace the handler for an action type
    pub fn register_handler(&self, action_type: ActionType, handler: Arc<dyn ActionHandler>) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(action_type, handler);
    }

    /// Handler for action types without a dedicated one
    pub fn set_default_handler(&self, handler: Arc<dyn ActionHandler>) {
        *self
            .inner
            .default_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Offer an action to the queue.
    ///
    /// Never waits on a handler. Overflow is reported through the returned
    /// outcome and a [`PipelineEvent::Dropped`], not as an error.
    pub fn enqueue(&self, action: Action) -> Result<PushOutcome, ActionError> {
        let mut state = self.inner.state();
        if state.closed {
            return Err(ActionError::ShutDown);
        }

        // Events go out under the lock so the drain task cannot report
        // `Processing` for this action before its `Queued`.
        let outcome = state.queue.push(action.clone());
        match &outcome {
            PushOutcome::Queued => {
                ::log::debug!("[A2UI] Queued action {} ({})", action.action_id, action.priority().name());
                self.inner.emit(PipelineEvent::Queued(action));
            }
            PushOutcome::Evicted(victim) => {
                ::log::warn!(
                    "[A2UI] Queue full, dropped {} ({}) for {} ({})",
                    victim.action_id,
                    victim.priority().name(),
                    action.action_id,
                    action.priority().name()
                );
                state.dropped += 1;
                self.inner.emit(PipelineEvent::Dropped {
                    action: victim.clone(),
                    reason: DropReason::Overflow,
                });
                self.inner.emit(PipelineEvent::Queued(action));
            }
            PushOutcome::Rejected(rejected) => {
                ::log::warn!(
                    "[A2UI] Queue full, dropped incoming {} ({})",
                    rejected.action_id,
                    rejected.priority().name()
                );
                state.dropped += 1;
                self.inner.emit(PipelineEvent::Dropped {
                    action: rejected.clone(),
                    reason: DropReason::Overflow,
                });
            }
        }

        if outcome.is_admitted() && !state.worker_active {
            state.worker_active = true;
            self.inner.processing.send_replace(true);
            self.inner.runtime.spawn(drain(self.inner.clone()));
        }

        Ok(outcome)
    }

    /// Discard everything still queued. In-flight actions run to completion.
    ///
    /// Returns how many actions were discarded.
    pub fn clear_queue(&self) -> usize {
        self.discard(DropReason::Cleared)
    }

    /// Discard the queue and refuse further actions
    pub fn shutdown(&self) -> usize {
        self.inner.state().closed = true;
        let discarded = self.discard(DropReason::ShutDown);
        ::log::info!("[A2UI] Action pipeline shut down, {} discarded", discarded);
        discarded
    }

    fn discard(&self, reason: DropReason) -> usize {
        let mut state = self.inner.state();
        let discarded = state.queue.drain();
        let count = discarded.len();
        state.dropped += count as u64;
        for action in discarded {
            self.inner.emit(PipelineEvent::Dropped { action, reason });
        }
        count
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state().closed
    }

    /// Whether actions are being processed right now
    pub fn is_processing(&self) -> bool {
        *self.inner.processing.borrow()
    }

    /// Observe the processing flag
    pub fn processing_flag(&self) -> watch::Receiver<bool> {
        self.inner.processing.subscribe()
    }

    /// Resolve once the queue has drained and the last handler returned
    pub async fn wait_idle(&self) {
        let mut flag = self.inner.processing.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = flag.wait_for(|processing| !*processing).await;
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.events.subscribe()
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        let state = self.inner.state();
        PipelineDiagnostics {
            total_queued: state.queue.len(),
            high: state.queue.len_of(ActionPriority::High),
            normal: state.queue.len_of(ActionPriority::Normal),
            low: state.queue.len_of(ActionPriority::Low),
            capacity: state.queue.capacity(),
            processing: state.worker_active,
            completed: state.completed,
            failed: state.failed,
            dropped: state.dropped,
        }
    }
}

impl std::fmt::Debug for ActionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionPipeline")
            .field("diagnostics", &self.diagnostics())
            .finish_non_exhaustive()
    }
}

/// Background worker: runs queued actions one at a time until the queue is
/// empty, then clears the processing flag and exits.
async fn drain(inner: Arc<Inner>) {
    loop {
        let action = {
            let mut state = inner.state();
            match state.queue.pop() {
                Some(action) => {
                    inner.emit(PipelineEvent::Processing(action.clone()));
                    action
                }
                None => {
                    state.worker_active = false;
                    inner.processing.send_replace(false);
                    return;
                }
            }
        };

        let error = match inner.handler_for(&action.action_type) {
            Some(handler) => {
                // Own task, so a panicking handler cannot take the worker down
                match inner.runtime.spawn(handler.handle(action.clone())).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(join_error) => Some(ActionError::Failed {
                        action_id: action.action_id.clone(),
                        reason: join_error.to_string(),
                    }),
                }
            }
            None => {
                ::log::warn!(
                    "[A2UI] No handler for {} action {}",
                    action.action_type,
                    action.action_id
                );
                None
            }
        };

        match &error {
            Some(e) => ::log::error!("[A2UI] Action {} failed: {}", action.action_id, e),
            None => ::log::debug!("[A2UI] Completed action {}", action.action_id),
        }

        {
            let mut state = inner.state();
            state.completed += 1;
            if error.is_some() {
                state.failed += 1;
            }
            inner.emit(PipelineEvent::Completed { action, error });
        }
    }
}
