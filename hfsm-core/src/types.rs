use hfsm_value::Value;

/// Stable index into a [`Machine`](crate::machine::Machine)'s state arena.
///
/// Arena ids replace pointer-based back-references: a state's parent, a transition's source and
/// target, and a dataflow's endpoints are all `StateId`s resolved by the
/// [`crate::builder::Builder`], never raw references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataflowId(pub u32);

/// Variant-specific fields of a [`StateNode`].
#[derive(Debug, Clone)]
pub enum StateKind {
    /// Terminal leaf. On entry, posts `done.<parent>` to its enclosing
    /// composite/parallel/machine.
    Final,
    /// Has an ordered list of children and an `initial_child`; at most one
    /// child active at a time.
    Composite {
        children: Vec<StateId>,
        initial_child: Option<StateId>,
    },
    /// Has one or more child composite regions, all entered together; the
    /// parallel is finished once every region reaches Final.
    Parallel { regions: Vec<StateId> },
    /// Leaf that delegates one external operation to a registered plugin.
    Invoke {
        binding: String,
        endpoint: Value,
    },
    /// The composite that roots the whole machine; carries lifecycle state
    /// in [`crate::engine::Engine`], not here.
    Machine {
        children: Vec<StateId>,
        initial_child: Option<StateId>,
    },
}

impl StateKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StateKind::Final => "final",
            StateKind::Composite { .. } => "composite",
            StateKind::Parallel { .. } => "parallel",
            StateKind::Invoke { .. } => "invoke",
            StateKind::Machine { .. } => "machine",
        }
    }

    pub fn children(&self) -> &[StateId] {
        match self {
            StateKind::Composite { children, .. } | StateKind::Machine { children, .. } => {
                children
            }
            StateKind::Parallel { regions } => regions,
            StateKind::Final | StateKind::Invoke { .. } => &[],
        }
    }

    pub fn initial_child(&self) -> Option<StateId> {
        match self {
            StateKind::Composite { initial_child, .. } | StateKind::Machine { initial_child, .. } => {
                *initial_child
            }
            _ => None,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, StateKind::Parallel { .. })
    }

    pub fn is_composite_like(&self) -> bool {
        matches!(self, StateKind::Composite { .. } | StateKind::Machine { .. })
    }
}

/// A built state node, owned by the [`Machine`](crate::machine::Machine)'s
/// arena for the machine's whole lifetime.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub id: StateId,
    /// The builder-supplied string id; unique within the machine.
    pub external_id: String,
    pub name: Option<String>,
    pub parent: Option<StateId>,
    pub input: Value,
    pub output: Value,
    pub outgoing: Vec<TransitionId>,
    pub outbound_dataflows: Vec<DataflowId>,
    pub kind: StateKind,
}

impl StateNode {
    pub fn is_final(&self) -> bool {
        matches!(self.kind, StateKind::Final)
    }

    /// Depth of this state in the tree (root = 0). Used for the "deeper
    /// source wins" conflict resolution rule.
    pub fn depth(&self, machine: &crate::machine::Machine) -> u32 {
        let mut depth = 0;
        let mut current = self.parent;
        while let Some(id) = current {
            depth += 1;
            current = machine.state(id).parent;
        }
        depth
    }
}

#[derive(Debug, Clone)]
pub struct TransitionNode {
    pub id: TransitionId,
    pub external_id: Option<String>,
    pub source: StateId,
    pub target: StateId,
    /// Empty means "automatic" — always matches during the fixpoint phase.
    pub event_name: String,
    pub condition: Option<crate::condition::Condition>,
}

/// A dataflow copy edge, attached to its source state.
#[derive(Debug, Clone)]
pub struct DataflowNode {
    pub id: DataflowId,
    pub source: StateId,
    pub target: StateId,
    pub from_path: String,
    pub to_path: String,
}
