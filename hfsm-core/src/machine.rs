use crate::events::Event;
use crate::types::{DataflowId, DataflowNode, StateId, StateKind, StateNode, TransitionId, TransitionNode};

/// A built, ready-to-run HFSM: states and
/// transitions are owned by the root `Machine` for its whole lifetime and
/// must not be rewired while an [`crate::engine::Engine`] is running.
///
/// Storage is a flat arena: every cross-reference (parent, source,
/// target, dataflow endpoints) is a `StateId`/`TransitionId`/`DataflowId`,
/// not a pointer, so the tree has no ownership cycles even though its
/// logical shape does.
#[derive(Debug)]
pub struct Machine {
    pub(crate) states: Vec<StateNode>,
    pub(crate) transitions: Vec<TransitionNode>,
    pub(crate) dataflows: Vec<DataflowNode>,
    pub(crate) root: StateId,
}

impl Machine {
    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0 as usize]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut StateNode {
        &mut self.states[id.0 as usize]
    }

    pub fn transition(&self, id: TransitionId) -> &TransitionNode {
        &self.transitions[id.0 as usize]
    }

    pub fn dataflow(&self, id: DataflowId) -> &DataflowNode {
        &self.dataflows[id.0 as usize]
    }

    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    /// Pre-order walk of the subtree rooted at `start`, returning the first
    /// state whose `external_id` matches.
    pub fn find_state(&self, start: StateId, external_id: &str) -> Option<StateId> {
        if self.state(start).external_id == external_id {
            return Some(start);
        }
        for &child in self.state(start).kind.children() {
            if let Some(found) = self.find_state(child, external_id) {
                return Some(found);
            }
        }
        None
    }

    pub fn lca(&self, a: StateId, b: StateId) -> StateId {
        let path_to_root = |mut id: StateId| {
            let mut path = vec![id];
            while let Some(parent) = self.state(id).parent {
                path.push(parent);
                id = parent;
            }
            path
        };
        let a_path = path_to_root(a);
        let b_path: std::collections::HashSet<StateId> = path_to_root(b).into_iter().collect();
        a_path
            .into_iter()
            .find(|id| b_path.contains(id))
            .unwrap_or(self.root)
    }

    /// Whether `ancestor` is `descendant` itself or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: StateId, descendant: StateId) -> bool {
        let mut current = Some(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.state(id).parent;
        }
        false
    }

    /// The completion event a state posts to its parent on becoming Final
    /// (leaf) or finished (composite/parallel all-Final).
    pub fn done_event(&self, id: StateId) -> Event {
        Event::done(&self.state(id).external_id)
    }

    /// True if every region of a Parallel has an active Final descendant
    /// along the given active configuration; used by the engine's
    /// completion-propagation step.
    pub fn parallel_is_finished(&self, parallel: StateId, active: &std::collections::HashSet<StateId>) -> bool {
        let StateKind::Parallel { regions } = &self.state(parallel).kind else {
            return false;
        };
        if regions.is_empty() {
            return false;
        }
        regions.iter().all(|&region| {
            active.iter().any(|&a| self.state(a).is_final() && self.is_ancestor_or_self(region, a))
        })
    }
}
