use std::collections::{HashMap, HashSet};

use hfsm_value::Value;

use crate::condition;
use crate::error::BuildError;
use crate::machine::Machine;
use crate::types::{DataflowId, DataflowNode, StateId, StateKind, StateNode, TransitionId, TransitionNode};

/// Variant-specific input to [`StateSpec`], mirroring `StateKind` but with
/// children/initial-child expressed as builder-supplied external ids
/// instead of resolved arena ids.
#[derive(Debug, Clone)]
pub enum StateSpecKind {
    Final,
    Composite { initial_child: Option<String> },
    Parallel,
    Invoke { binding: String, endpoint: Value },
    Machine { initial_child: Option<String> },
}

#[derive(Debug, Clone)]
pub struct StateSpec {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: Option<String>,
    pub kind: StateSpecKind,
    pub input: Value,
    pub output: Value,
}

impl StateSpec {
    pub fn new(id: impl Into<String>, parent_id: Option<String>, kind: StateSpecKind) -> Self {
        StateSpec {
            id: id.into(),
            parent_id,
            name: None,
            kind,
            input: Value::object(),
            output: Value::object(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransitionSpec {
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    /// Empty string means automatic.
    pub event_name: String,
    pub condition: Option<String>,
}

impl TransitionSpec {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        TransitionSpec {
            id: None,
            source: source.into(),
            target: target.into(),
            event_name: String::new(),
            condition: None,
        }
    }

    pub fn on_event(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct DataflowSpec {
    pub source: String,
    pub target: String,
    pub from_path: String,
    pub to_path: String,
}

impl DataflowSpec {
    pub fn new(
        source: impl Into<String>,
        from_path: impl Into<String>,
        target: impl Into<String>,
        to_path: impl Into<String>,
    ) -> Self {
        DataflowSpec {
            source: source.into(),
            target: target.into(),
            from_path: from_path.into(),
            to_path: to_path.into(),
        }
    }
}

/// Collects `addState`/`addTransition`/`addDataflow` calls order-insensitively
/// and resolves them into a ready-to-run [`Machine`].
/// Building is single-threaded and must complete before any
/// [`crate::engine::Engine`] is started against the result.
#[derive(Debug, Default)]
pub struct Builder {
    states: Vec<StateSpec>,
    transitions: Vec<TransitionSpec>,
    dataflows: Vec<DataflowSpec>,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    pub fn add_state(mut self, spec: StateSpec) -> Self {
        self.states.push(spec);
        self
    }

    pub fn add_transition(mut self, spec: TransitionSpec) -> Self {
        self.transitions.push(spec);
        self
    }

    pub fn add_dataflow(mut self, spec: DataflowSpec) -> Self {
        self.dataflows.push(spec);
        self
    }

    /// Runs the build algorithm: link parents, link
    /// transitions, link dataflows, validate, then initialize. Collects
    /// every applicable error rather than stopping at the first; on any
    /// error the partially built graph is discarded.
    pub fn build(self) -> Result<Machine, Vec<BuildError>> {
        let mut errors = Vec::new();

        // Step 1: exactly one root Machine state.
        let root_specs: Vec<&StateSpec> = self
            .states
            .iter()
            .filter(|s| matches!(s.kind, StateSpecKind::Machine { .. }))
            .collect();
        match root_specs.len() {
            0 => errors.push(BuildError::NoRoot),
            1 => {}
            _ => errors.push(BuildError::MultipleRoots(
                root_specs.iter().map(|s| s.id.clone()).collect(),
            )),
        }

        // Duplicate id detection.
        let mut seen = HashSet::new();
        let mut duplicates = HashSet::new();
        for s in &self.states {
            if !seen.insert(s.id.clone()) {
                duplicates.insert(s.id.clone());
            }
        }
        for dup in &duplicates {
            errors.push(BuildError::DuplicateId(dup.clone()));
        }

        // Build the external-id -> arena-index table, skipping duplicates
        // (their position is ambiguous; the DuplicateId error above already
        // covers them).
        let mut index_of: HashMap<String, usize> = HashMap::new();
        for (i, s) in self.states.iter().enumerate() {
            if !duplicates.contains(&s.id) {
                index_of.insert(s.id.clone(), i);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let root_spec = root_specs[0];

        // Step 2: link parents, building each state's children list in
        // insertion order.
        let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
        for s in &self.states {
            if s.id == root_spec.id {
                continue;
            }
            match &s.parent_id {
                None => errors.push(BuildError::UnknownParent {
                    state: s.id.clone(),
                    parent: String::new(),
                }),
                Some(parent) => {
                    if index_of.contains_key(parent) {
                        children_of.entry(parent.clone()).or_default().push(s.id.clone());
                    } else {
                        errors.push(BuildError::UnknownParent {
                            state: s.id.clone(),
                            parent: parent.clone(),
                        });
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        // Assign stable StateIds in input order.
        let id_of: HashMap<String, StateId> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), StateId(i as u32)))
            .collect();

        let resolve_children = |external_id: &str| -> Vec<StateId> {
            children_of
                .get(external_id)
                .into_iter()
                .flatten()
                .map(|c| id_of[c])
                .collect()
        };

        let resolve_initial = |external_id: &str, initial: &Option<String>, errors: &mut Vec<BuildError>| -> Option<StateId> {
            let kids = resolve_children(external_id);
            match initial {
                Some(init) => match id_of.get(init) {
                    Some(&id) if kids.contains(&id) => Some(id),
                    _ => {
                        errors.push(BuildError::InitialChildMissing {
                            state: external_id.to_string(),
                            initial: init.clone(),
                        });
                        None
                    }
                },
                None => kids.first().copied(),
            }
        };

        let mut states = Vec::with_capacity(self.states.len());
        for spec in &self.states {
            let kind = match &spec.kind {
                StateSpecKind::Final => StateKind::Final,
                StateSpecKind::Composite { initial_child } => StateKind::Composite {
                    children: resolve_children(&spec.id),
                    initial_child: resolve_initial(&spec.id, initial_child, &mut errors),
                },
                StateSpecKind::Parallel => {
                    let regions = resolve_children(&spec.id);
                    if regions.is_empty() {
                        errors.push(BuildError::EmptyParallel(spec.id.clone()));
                    }
                    StateKind::Parallel { regions }
                }
                StateSpecKind::Invoke { binding, endpoint } => StateKind::Invoke {
                    binding: binding.clone(),
                    endpoint: endpoint.clone(),
                },
                StateSpecKind::Machine { initial_child } => StateKind::Machine {
                    children: resolve_children(&spec.id),
                    initial_child: resolve_initial(&spec.id, initial_child, &mut errors),
                },
            };

            states.push(StateNode {
                id: id_of[&spec.id],
                external_id: spec.id.clone(),
                name: spec.name.clone(),
                parent: spec.parent_id.as_ref().and_then(|p| id_of.get(p)).copied(),
                input: spec.input.clone(),
                output: spec.output.clone(),
                outgoing: Vec::new(),
                outbound_dataflows: Vec::new(),
                kind,
            });
        }

        // Step 3: link transitions.
        let mut transitions = Vec::with_capacity(self.transitions.len());
        for (i, spec) in self.transitions.iter().enumerate() {
            let source = id_of.get(&spec.source).copied();
            let target = id_of.get(&spec.target).copied();
            if source.is_none() {
                errors.push(BuildError::UnknownSource {
                    transition: spec.id.clone().unwrap_or_else(|| format!("#{i}")),
                    source: spec.source.clone(),
                });
            }
            if target.is_none() {
                errors.push(BuildError::UnknownTarget {
                    transition: spec.id.clone().unwrap_or_else(|| format!("#{i}")),
                    target: spec.target.clone(),
                });
            }
            let condition = match &spec.condition {
                Some(expr) => match condition::parse(expr) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                None => None,
            };
            if let (Some(source), Some(target)) = (source, target) {
                let tid = TransitionId(i as u32);
                transitions.push(TransitionNode {
                    id: tid,
                    external_id: spec.id.clone(),
                    source,
                    target,
                    event_name: spec.event_name.clone(),
                    condition,
                });
                states[source.0 as usize].outgoing.push(tid);
            }
        }

        // Step 4: link dataflows, attached to the source state.
        let mut dataflows = Vec::with_capacity(self.dataflows.len());
        for (i, spec) in self.dataflows.iter().enumerate() {
            let source = id_of.get(&spec.source).copied();
            let target = id_of.get(&spec.target).copied();
            if source.is_none() {
                errors.push(BuildError::UnknownDataflowSource(spec.source.clone()));
            }
            if target.is_none() {
                errors.push(BuildError::UnknownDataflowTarget(spec.target.clone()));
            }
            if let (Some(source), Some(target)) = (source, target) {
                let did = DataflowId(i as u32);
                dataflows.push(DataflowNode {
                    id: did,
                    source,
                    target,
                    from_path: spec.from_path.clone(),
                    to_path: spec.to_path.clone(),
                });
                states[source.0 as usize].outbound_dataflows.push(did);
            }
        }

        // Step 5: validate.
        for (i, s) in states.iter().enumerate() {
            if s.is_final() && !s.outgoing.is_empty() {
                errors.push(BuildError::FinalHasOutgoing(s.external_id.clone()));
            }
            let _ = i;
        }

        let root = id_of[&root_spec.id];
        let mut reachable = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                stack.extend(states[id.0 as usize].kind.children());
            }
        }
        for s in &states {
            if !reachable.contains(&s.id) {
                errors.push(BuildError::Unreachable(s.external_id.clone()));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Machine {
            states,
            transitions,
            dataflows,
            root,
        })
    }
}
