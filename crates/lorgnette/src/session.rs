//! The session actor: single owner of all mutable client state.
//!
//! One tokio task holds the history store, the user preferences, and the
//! render bookkeeping. HTTP fetches and graph layout run as side tasks that
//! report back over an internal channel, so every mutation is serialized
//! through the actor loop and late results are vetted before they touch
//! anything: snapshot completions go through the write-once cache, layout
//! completions through a sequence-number staleness check.
//!
//! After every command, poll tick, or task completion the actor re-derives
//! the active view (index → cached state → method → markup) and publishes
//! it over a watch channel when it changed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lorgnette_types::{
    Breakpoint, CompilationState, ConnectionState, SnapshotPreference, endpoints,
};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::history::HistoryStore;
use crate::layout::LayoutEngine;
use crate::view::{resolve_active_index, resolve_active_method, step_next, step_previous};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub poll_interval: Duration,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Read-only view published to consumers after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub connection: ConnectionState,
    pub history: Vec<Breakpoint>,
    pub active_breakpoint: Option<usize>,
    pub active_state: Option<Arc<CompilationState>>,
    pub active_method: Option<String>,
    pub active_markup: Option<String>,
}

/// User-facing handle to a running session.
///
/// Actions are fire-and-forget commands; effects show up through the view
/// receiver. Dropping every handle shuts the session down.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ViewState>,
}

impl SessionHandle {
    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    /// Resumes the compiler and goes back to following the newest
    /// breakpoint.
    pub fn continue_execution(&self) {
        let _ = self.commands.send(Command::ContinueExecution);
    }

    pub fn select_previous_snapshot(&self) {
        let _ = self.commands.send(Command::SelectPrevious);
    }

    pub fn select_next_snapshot(&self) {
        let _ = self.commands.send(Command::SelectNext);
    }

    pub fn set_active_snapshot(&self, pref: SnapshotPreference) {
        let _ = self.commands.send(Command::SetActiveSnapshot(pref));
    }

    pub fn set_preferred_active_method(&self, key: impl Into<String>) {
        let _ = self.commands.send(Command::SetPreferredMethod(key.into()));
    }
}

enum Command {
    ContinueExecution,
    SelectPrevious,
    SelectNext,
    SetActiveSnapshot(SnapshotPreference),
    SetPreferredMethod(String),
}

enum TaskEvent {
    /// `None` means "no update this tick" (unavailable or malformed).
    ListingFetched(Option<Vec<Breakpoint>>),
    SnapshotFetched {
        index: usize,
        state: Option<CompilationState>,
    },
    MarkupRendered {
        seq: u64,
        markup: Option<String>,
    },
}

pub struct Session;

impl Session {
    /// Spawns the session actor and returns a handle to it.
    pub fn spawn(config: SessionConfig, layout: Arc<dyn LayoutEngine>) -> SessionHandle {
        let api = ApiClient::new(config.base_url.clone());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ViewState::default());

        let actor = SessionActor {
            api,
            layout,
            poll_interval: config.poll_interval,
            history: HistoryStore::new(),
            preference: SnapshotPreference::Latest,
            method_preference: None,
            poll_in_flight: false,
            fetch_in_flight: HashSet::new(),
            fetch_cooldown: HashSet::new(),
            render_seq: 0,
            last_dispatched: None,
            markup: None,
            event_tx,
            view_tx,
        };
        tokio::spawn(actor.run(command_rx, event_rx));

        SessionHandle {
            commands: command_tx,
            view: view_rx,
        }
    }
}

struct SessionActor {
    api: ApiClient,
    layout: Arc<dyn LayoutEngine>,
    poll_interval: Duration,

    history: HistoryStore,
    preference: SnapshotPreference,
    method_preference: Option<String>,

    poll_in_flight: bool,
    fetch_in_flight: HashSet<usize>,
    /// Indexes whose fetch came back unusable. Cleared on every poll
    /// completion, so failed snapshots are retried at the polling cadence
    /// instead of hot-looping on their own completion events.
    fetch_cooldown: HashSet<usize>,

    /// Sequence number of the most recently dispatched layout run; only a
    /// completion carrying this exact number may publish markup.
    render_seq: u64,
    /// `(index, method)` of the last dispatched layout run. A cached state
    /// never changes under an index, so this pair identifies the graph
    /// source.
    last_dispatched: Option<(usize, String)>,
    markup: Option<String>,

    event_tx: mpsc::UnboundedSender<TaskEvent>,
    view_tx: watch::Sender<ViewState>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TaskEvent>,
    ) {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => self.poll_history(),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle dropped: session over.
                    None => break,
                },
                event = events.recv() => {
                    // The actor holds a sender, so this arm never closes.
                    if let Some(event) = event {
                        self.handle_event(event);
                    }
                }
            }
            self.recompute();
        }
        debug!("session actor stopped");
    }

    fn poll_history(&mut self) {
        if self.poll_in_flight {
            return;
        }
        self.poll_in_flight = true;
        let api = self.api.clone();
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            let listing = match api.fetch(endpoints::BREAKPOINT_LISTING).await {
                Some(body) => match facet_json::from_str::<Vec<Breakpoint>>(&body) {
                    Ok(listing) => Some(listing),
                    Err(error) => {
                        warn!(%error, "malformed breakpoint listing");
                        None
                    }
                },
                None => None,
            };
            let _ = events.send(TaskEvent::ListingFetched(listing));
        });
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ContinueExecution => {
                // Resume following the newest breakpoint, whatever was
                // pinned before.
                self.preference = SnapshotPreference::Latest;
                info!("continue requested");
                let api = self.api.clone();
                tokio::spawn(async move {
                    // Body ignored; success doubles as a connectivity probe.
                    let _ = api.fetch(endpoints::BREAKPOINT_CONTINUE).await;
                });
            }
            Command::SelectPrevious => {
                self.preference = step_previous(self.preference, self.history.len());
            }
            Command::SelectNext => {
                self.preference = step_next(self.preference, self.history.len());
            }
            Command::SetActiveSnapshot(pref) => {
                info!(?pref, "active snapshot set");
                self.preference = pref;
            }
            Command::SetPreferredMethod(key) => {
                let active_state = resolve_active_index(self.preference, self.history.len())
                    .and_then(|idx| self.history.cached_state(idx));
                if let Some(state) = active_state
                    && !state.graphs.contains_key(&key)
                {
                    warn!(method = %key, "ignoring selection of unknown graph");
                    return;
                }
                info!(method = %key, "active method set");
                self.method_preference = Some(key);
            }
        }
    }

    fn handle_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::ListingFetched(listing) => {
                self.poll_in_flight = false;
                self.fetch_cooldown.clear();
                if let Some(listing) = listing
                    && self.history.absorb_listing(listing)
                {
                    debug!(len = self.history.len(), "breakpoint history grew");
                }
            }
            TaskEvent::SnapshotFetched { index, state } => {
                self.fetch_in_flight.remove(&index);
                if let Some(state) = state
                    && self.history.cache_state(index, state)
                {
                    debug!(index, "snapshot cached");
                }
                // Unavailable, malformed, or rejected as misaligned: hold
                // off until the next poll completion.
                if self.history.cached_state(index).is_none() {
                    self.fetch_cooldown.insert(index);
                }
            }
            TaskEvent::MarkupRendered { seq, markup } => {
                if seq != self.render_seq {
                    debug!(seq, latest = self.render_seq, "discarding stale layout result");
                    return;
                }
                // On failure this clears the previous graph's markup: the
                // dispatch bookkeeping already points at the new graph, so
                // keeping the old SVG would pair it with the wrong method.
                self.markup = markup;
            }
        }
    }

    /// Re-derives the active view and publishes it if it changed.
    fn recompute(&mut self) {
        let active_idx = resolve_active_index(self.preference, self.history.len());

        // Snapshot fetch coordination: at most one in-flight fetch per
        // index, none once cached. Failed indexes sit in the cooldown set
        // until the next poll completion and are then retried.
        if let Some(idx) = active_idx
            && self.history.cached_state(idx).is_none()
            && !self.fetch_cooldown.contains(&idx)
            && self.fetch_in_flight.insert(idx)
        {
            self.spawn_snapshot_fetch(idx);
        }

        let active_state = active_idx.and_then(|idx| self.history.cached_state(idx));
        let active_method = active_state.as_ref().and_then(|state| {
            resolve_active_method(&state.graphs, self.method_preference.as_deref())
                .map(str::to_string)
        });

        let render_key = active_idx.zip(active_method.clone());
        if render_key != self.last_dispatched {
            self.last_dispatched = render_key;
            match (&active_state, &active_method) {
                (Some(state), Some(method)) => {
                    if let Some(graph) = state.graphs.get(method) {
                        self.dispatch_render(graph.source_text.clone());
                    }
                }
                _ => {
                    // Nothing to render. Bump the sequence so an in-flight
                    // layout for the previous graph cannot publish into the
                    // cleared view.
                    self.render_seq += 1;
                    self.markup = None;
                }
            }
        }

        let next = ViewState {
            connection: self.api.health().get(),
            history: self.history.breakpoints(),
            active_breakpoint: active_idx,
            active_state,
            active_method,
            active_markup: self.markup.clone(),
        };
        self.view_tx.send_if_modified(|view| {
            if *view == next {
                return false;
            }
            *view = next;
            true
        });
    }

    fn spawn_snapshot_fetch(&self, index: usize) {
        let api = self.api.clone();
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            let state = match api.fetch(&endpoints::snapshot(index)).await {
                Some(body) => match facet_json::from_str::<CompilationState>(&body) {
                    Ok(state) => Some(state),
                    Err(error) => {
                        warn!(index, %error, "malformed snapshot payload");
                        None
                    }
                },
                None => None,
            };
            let _ = events.send(TaskEvent::SnapshotFetched { index, state });
        });
    }

    fn dispatch_render(&mut self, source_text: String) {
        self.render_seq += 1;
        let seq = self.render_seq;
        let layout = self.layout.clone();
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            let markup = match layout.render(&source_text).await {
                Ok(markup) => Some(markup),
                Err(error) => {
                    warn!(%error, "graph layout failed");
                    None
                }
            };
            let _ = events.send(TaskEvent::MarkupRendered { seq, markup });
        });
    }
}
