use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hfsm_value::Value;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::events::{DelayedEventHandle, Event, Priority};
use crate::invoke::{InvocationHandle, InvocationTracker, Outcome, PluginRegistry};
use crate::log::{Level, LogCursor, LogRecord, LogStream};
use crate::machine::Machine;
use crate::types::{StateId, StateKind, TransitionNode};

struct DelayedSlot {
    cancelled: Arc<AtomicBool>,
}

struct EngineState {
    running: bool,
    active: HashSet<StateId>,
    high: VecDeque<Event>,
    normal: VecDeque<Event>,
    delayed: HashMap<DelayedEventHandle, DelayedSlot>,
    invocations: HashMap<StateId, InvocationHandle>,
    /// Guards exactly-once posting: a `done.<id>` is enqueued at
    /// most once per "episode" of a state being active, cleared on exit.
    done_posted: HashSet<StateId>,
}

impl EngineState {
    fn new() -> Self {
        EngineState {
            running: false,
            active: HashSet::new(),
            high: VecDeque::new(),
            normal: VecDeque::new(),
            delayed: HashMap::new(),
            invocations: HashMap::new(),
            done_posted: HashSet::new(),
        }
    }

    fn push(&mut self, event: Event) {
        match event.priority {
            Priority::High => self.high.push_back(event),
            Priority::Normal => self.normal.push_back(event),
        }
    }

    fn pop(&mut self) -> Option<Event> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }
}

/// The single-threaded cooperative macrostep scheduler.
///
/// All state mutation happens under `state`'s lock; the only asynchronous
/// edge is spawning a plugin's `invoke`/`cancel` call as a detached task, so
/// a macrostep itself never awaits.
pub struct Engine {
    machine: Machine,
    plugins: PluginRegistry,
    tracker: InvocationTracker,
    completions: Mutex<tokio::sync::mpsc::UnboundedReceiver<(InvocationHandle, Outcome)>>,
    log: LogStream,
    state: Mutex<EngineState>,
    next_delayed_id: AtomicU64,
}

impl Engine {
    pub fn new(machine: Machine, plugins: PluginRegistry) -> Arc<Engine> {
        let (tracker, receiver) = InvocationTracker::new();
        Arc::new(Engine {
            machine,
            plugins,
            tracker,
            completions: Mutex::new(receiver),
            log: LogStream::new(1024),
            state: Mutex::new(EngineState::new()),
            next_delayed_id: AtomicU64::new(0),
        })
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn log(&self) -> &LogStream {
        &self.log
    }

    pub fn read_log(&self, cursor: LogCursor) -> Vec<LogRecord> {
        self.log.read_since(cursor)
    }

    pub async fn read_log_blocking(&self, cursor: LogCursor, timeout: Duration) -> Vec<LogRecord> {
        self.log.read_since_blocking(cursor, timeout).await
    }

    /// Current active configuration, for introspection and tests.
    pub fn active_configuration(&self) -> HashSet<StateId> {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).active.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).running
    }

    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.running {
            return Err(EngineError::AlreadyRunning);
        }
        state.running = true;
        info!("machine starting");
        self.log.push("engine", Level::Info, "machine starting");
        self.enter_recursive(self.machine.root, &mut state);
        self.run_automatic_fixpoint(&mut state);
        Ok(())
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if !state.running {
            return Err(EngineError::NotRunning);
        }
        self.do_stop(&mut state);
        Ok(())
    }

    fn do_stop(&self, state: &mut EngineState) {
        for (_, slot) in state.delayed.drain() {
            slot.cancelled.store(true, Ordering::Release);
        }
        if state.active.contains(&self.machine.root) {
            self.exit_recursive(self.machine.root, state);
        }
        state.high.clear();
        state.normal.clear();
        state.running = false;
        info!("machine stopped");
        self.log.push("engine", Level::Info, "machine stopped");
    }

    pub fn post_event(&self, event: Event) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if !state.running {
            return Err(EngineError::NotRunning);
        }
        state.push(event);
        self.dispatch(&mut state);
        Ok(())
    }

    pub fn post_delayed(self: &Arc<Self>, event: Event, delay: Duration) -> Result<DelayedEventHandle, EngineError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if !state.running {
            return Err(EngineError::NotRunning);
        }
        let id = self.next_delayed_id.fetch_add(1, Ordering::Relaxed);
        let handle = DelayedEventHandle(id);
        let cancelled = Arc::new(AtomicBool::new(false));
        state.delayed.insert(handle, DelayedSlot { cancelled: cancelled.clone() });
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if cancelled.load(Ordering::Acquire) {
                return;
            }
            let mut state = engine.state.lock().unwrap_or_else(|p| p.into_inner());
            if !state.running {
                return;
            }
            state.delayed.remove(&handle);
            state.push(event);
            engine.dispatch(&mut state);
        });
        Ok(handle)
    }

    pub fn cancel_delayed(&self, handle: DelayedEventHandle) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = state.delayed.remove(&handle) {
            slot.cancelled.store(true, Ordering::Release);
        }
    }

    /// Drains any plugin completions already received and folds them into
    /// posted `done.<id>`/`error.<id>` events, then dispatches. Safe to call
    /// from a polling loop (e.g. `hfsm-server`'s request handlers) or after
    /// an `invoke` known to complete synchronously.
    pub fn pump(&self) {
        let mut completions = self.completions.lock().unwrap_or_else(|p| p.into_inner());
        let mut received = Vec::new();
        while let Ok(item) = completions.try_recv() {
            received.push(item);
        }
        drop(completions);
        if received.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        for (handle, outcome) in received {
            self.resolve_completion(handle, outcome, &mut state);
        }
        self.dispatch(&mut state);
    }

    fn resolve_completion(&self, handle: InvocationHandle, outcome: Outcome, state: &mut EngineState) {
        let Some(&invoke_id) = state
            .invocations
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(id, _)| id)
        else {
            return;
        };
        state.invocations.remove(&invoke_id);
        match outcome {
            Outcome::Success(value) => {
                if let Some(v) = value {
                    let _ = self.machine.state(invoke_id).output.unite(&v);
                }
                self.apply_outbound_dataflows(invoke_id, state);
                self.post_done(invoke_id, state);
            }
            Outcome::Error(message) => {
                self.log.push(
                    self.machine.state(invoke_id).external_id.clone(),
                    Level::Warn,
                    format!("invoke error: {message}"),
                );
                state.push(Event::error(&self.machine.state(invoke_id).external_id));
            }
        }
    }

    // -- dispatch loop --------------------------------------------------------

    fn dispatch(&self, state: &mut EngineState) {
        while state.running {
            let Some(event) = state.pop() else { break };
            self.run_macrostep(&event.name, state);
            self.run_automatic_fixpoint(state);
        }
    }

    fn run_macrostep(&self, event_name: &str, state: &mut EngineState) {
        let selected = self.select_transitions(event_name, state);
        self.fire(&selected, state);
    }

    fn run_automatic_fixpoint(&self, state: &mut EngineState) {
        const MAX_ITERATIONS: usize = 10_000;
        for _ in 0..MAX_ITERATIONS {
            let selected = self.select_transitions("", state);
            if selected.is_empty() {
                return;
            }
            self.fire(&selected, state);
        }
        self.log.push(
            "engine",
            Level::Error,
            "automatic transition fixpoint did not converge; aborting to avoid an infinite loop",
        );
    }

    fn select_transitions(&self, event_name: &str, state: &EngineState) -> Vec<TransitionNode> {
        let mut candidates: Vec<&TransitionNode> = Vec::new();
        for &id in &state.active {
            for &tid in &self.machine.state(id).outgoing {
                let t = self.machine.transition(tid);
                if t.event_name != event_name {
                    continue;
                }
                let src = self.machine.state(t.source);
                let enabled = t
                    .condition
                    .as_ref()
                    .map(|c| c.eval(&src.input, &src.output))
                    .unwrap_or(true);
                if enabled {
                    candidates.push(t);
                }
            }
        }

        candidates.sort_by(|a, b| {
            let da = self.machine.state(a.source).depth(&self.machine);
            let db = self.machine.state(b.source).depth(&self.machine);
            db.cmp(&da).then(a.id.0.cmp(&b.id.0))
        });

        let mut selected = Vec::new();
        let mut claimed: HashSet<StateId> = HashSet::new();
        for t in candidates {
            let lca = self.machine.lca(t.source, t.target);
            let exit_set = self.ancestor_path(t.source, lca);
            if exit_set.iter().any(|s| claimed.contains(s)) {
                continue;
            }
            claimed.extend(exit_set.iter().copied());
            selected.push(t.clone());
        }
        selected
    }

    fn fire(&self, selected: &[TransitionNode], state: &mut EngineState) {
        for t in selected {
            let lca = self.machine.lca(t.source, t.target);
            let exit_path = self.ancestor_path(t.source, lca);
            self.perform_exit(&exit_path, state);
            let source_id = &self.machine.state(t.source).external_id;
            let target_id = &self.machine.state(t.target).external_id;
            debug!(source = %source_id, target = %target_id, event = %t.event_name, "transition fired");
            self.log.push(
                "engine",
                Level::Debug,
                format!("transition {source_id} -> {target_id} fired on '{}'", t.event_name),
            );
            self.perform_entry(lca, t.target, state);
        }
    }

    /// States from `source` up to (excluding) `ancestor`, deepest first.
    fn ancestor_path(&self, source: StateId, ancestor: StateId) -> Vec<StateId> {
        let mut path = Vec::new();
        let mut cur = source;
        while cur != ancestor {
            path.push(cur);
            cur = self.machine.state(cur).parent.expect("ancestor is reachable");
        }
        path
    }

    fn perform_exit(&self, path: &[StateId], state: &mut EngineState) {
        if let Some(&deepest) = path.first() {
            if state.active.contains(&deepest) {
                self.exit_recursive(deepest, state);
            }
        }
        for &ancestor in &path[1.min(path.len())..] {
            if let StateKind::Invoke { .. } = &self.machine.state(ancestor).kind {
                self.cancel_invoke_if_any(ancestor, state);
            }
            state.active.remove(&ancestor);
            state.done_posted.remove(&ancestor);
            self.log.push(self.machine.state(ancestor).external_id.clone(), Level::Debug, "exit");
        }
    }

    fn perform_entry(&self, lca: StateId, target: StateId, state: &mut EngineState) {
        let mut path = Vec::new();
        let mut cur = target;
        while cur != lca {
            path.push(cur);
            cur = self.machine.state(cur).parent.expect("lca is an ancestor of target");
        }
        path.reverse();
        for (i, &id) in path.iter().enumerate() {
            if i + 1 == path.len() {
                self.enter_recursive(id, state);
            } else {
                state.active.insert(id);
                self.log.push(self.machine.state(id).external_id.clone(), Level::Debug, "enter");
                // An intermediate hop through a Parallel only tells us which
                // region continues toward the target; the Parallel's other
                // regions are siblings that must be entered in full here too.
                if let ShapeKind::Parallel(regions) = self.machine.state(id).kind.clone_shape() {
                    let next_on_path = path[i + 1];
                    for region in regions {
                        if region != next_on_path {
                            self.enter_recursive(region, state);
                        }
                    }
                }
            }
        }
    }

    fn enter_recursive(&self, id: StateId, state: &mut EngineState) {
        state.active.insert(id);
        let external_id = &self.machine.state(id).external_id;
        debug!(state = %external_id, "enter");
        self.log.push(external_id.clone(), Level::Debug, "enter");
        match self.machine.state(id).kind.clone_shape() {
            ShapeKind::Final => self.on_final_entered(id, state),
            ShapeKind::Invoke => self.enter_invoke(id, state),
            ShapeKind::CompositeLike(initial_child) => {
                if let Some(child) = initial_child {
                    self.enter_recursive(child, state);
                }
            }
            ShapeKind::Parallel(regions) => {
                for region in regions {
                    self.enter_recursive(region, state);
                }
            }
        }
    }

    fn exit_recursive(&self, id: StateId, state: &mut EngineState) {
        match self.machine.state(id).kind.clone_shape() {
            ShapeKind::CompositeLike(_) => {
                if let Some(&active_child) = self
                    .machine
                    .state(id)
                    .kind
                    .children()
                    .iter()
                    .find(|c| state.active.contains(*c))
                {
                    self.exit_recursive(active_child, state);
                }
            }
            ShapeKind::Parallel(regions) => {
                for region in regions {
                    if state.active.contains(&region) {
                        self.exit_recursive(region, state);
                    }
                }
            }
            ShapeKind::Invoke => self.cancel_invoke_if_any(id, state),
            ShapeKind::Final => {}
        }
        state.active.remove(&id);
        state.done_posted.remove(&id);
        let external_id = &self.machine.state(id).external_id;
        debug!(state = %external_id, "exit");
        self.log.push(external_id.clone(), Level::Debug, "exit");
    }

    fn on_final_entered(&self, id: StateId, state: &mut EngineState) {
        let Some(parent) = self.machine.state(id).parent else {
            return;
        };
        self.apply_outbound_dataflows(parent, state);
        self.post_done(parent, state);
        if let Some(grandparent) = self.machine.state(parent).parent {
            if self.machine.state(grandparent).kind.is_parallel()
                && self.machine.parallel_is_finished(grandparent, &state.active)
            {
                self.apply_outbound_dataflows(grandparent, state);
                self.post_done(grandparent, state);
            }
        }
    }

    /// The root `Machine` has no parent and no outgoing transitions of its
    /// own, so a `done.<root>` event would have nothing to react to it —
    /// per spec, the root stops itself the moment it finishes.
    fn post_done(&self, id: StateId, state: &mut EngineState) {
        if !state.done_posted.insert(id) {
            return;
        }
        let external_id = &self.machine.state(id).external_id;
        debug!(state = %external_id, "done posted");
        if id == self.machine.root {
            self.do_stop(state);
            return;
        }
        state.push(Event::done(external_id).with_priority(Priority::Normal));
    }

    fn apply_outbound_dataflows(&self, source: StateId, _state: &mut EngineState) {
        for &dfid in &self.machine.state(source).outbound_dataflows {
            let df = self.machine.dataflow(dfid);
            let src = self.machine.state(df.source);
            let mut value = src.output.path_get(&df.from_path).unwrap_or_else(|_| Value::undefined());
            if value.is_undefined() {
                value = src.input.path_get(&df.from_path).unwrap_or_else(|_| Value::undefined());
            }
            if value.is_undefined() {
                self.log.push(
                    src.external_id.clone(),
                    Level::Warn,
                    format!("dataflow source path '{}' is undefined", df.from_path),
                );
            }
            let dst = self.machine.state(df.target);
            if let Err(e) = dst.input.path_set(&df.to_path, value.deep_copy()) {
                self.log.push(dst.external_id.clone(), Level::Warn, format!("dataflow apply failed: {e}"));
            }
        }
    }

    // -- invoke -----------------------------------------------------------

    fn enter_invoke(&self, id: StateId, state: &mut EngineState) {
        let StateKind::Invoke { binding, endpoint } = &self.machine.state(id).kind else {
            return;
        };
        let plugin = match self.plugins.get(binding) {
            Ok(p) => p,
            Err(_) => {
                self.log.push(self.machine.state(id).external_id.clone(), Level::Error, format!("unknown binding '{binding}'"));
                state.push(Event::error(&self.machine.state(id).external_id));
                return;
            }
        };
        let (handle, sink) = self.tracker.begin();
        state.invocations.insert(id, handle);
        let endpoint = endpoint.clone();
        let input = self.machine.state(id).input.clone();
        tokio::spawn(async move {
            plugin.invoke(endpoint, input, sink).await;
        });
    }

    fn cancel_invoke_if_any(&self, id: StateId, state: &mut EngineState) {
        if let Some(handle) = state.invocations.remove(&id) {
            handle.mark_cancelled();
            let StateKind::Invoke { binding, .. } = &self.machine.state(id).kind else {
                return;
            };
            if let Ok(plugin) = self.plugins.get(binding) {
                tokio::spawn(async move {
                    plugin.cancel(&handle).await;
                });
            }
        }
    }
}

/// A shape-only view of [`StateKind`] used by the engine's recursion so it
/// never has to match the invoke-specific payload fields it doesn't need.
enum ShapeKind {
    Final,
    Invoke,
    CompositeLike(Option<StateId>),
    Parallel(Vec<StateId>),
}

trait ShapeExt {
    fn clone_shape(&self) -> ShapeKind;
}

impl ShapeExt for StateKind {
    fn clone_shape(&self) -> ShapeKind {
        match self {
            StateKind::Final => ShapeKind::Final,
            StateKind::Invoke { .. } => ShapeKind::Invoke,
            StateKind::Composite { initial_child, .. } | StateKind::Machine { initial_child, .. } => {
                ShapeKind::CompositeLike(*initial_child)
            }
            StateKind::Parallel { regions } => ShapeKind::Parallel(regions.clone()),
        }
    }
}
