use std::sync::atomic::{AtomicU64, Ordering};

use hfsm_core::{Builder, DataflowSpec, StateSpec, StateSpecKind, TransitionSpec};
use hfsm_value::Value;

use crate::dto::{DataflowDto, EndpointDto, MachineDto, NodeDto, TransitionDto};
use crate::error::ImportError;

/// Event names the description format lets an author write instead of the
/// engine-generated `done.<id>`/`error.<id>`; rewritten against the
/// enclosing state's id as the transitions are linked.
const FINISH_ALIASES: &[&str] = &["finish", "state.success"];
const ERROR_ALIAS: &str = "state.error";

static SYNTH_COUNTER: AtomicU64 = AtomicU64::new(0);

fn synth_id(prefix: &str) -> String {
    let n = SYNTH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("_{prefix}{n}")
}

fn rewrite_event(event_name: &str, owning_state_id: &str) -> String {
    if FINISH_ALIASES.contains(&event_name) {
        format!("done.{owning_state_id}")
    } else if event_name == ERROR_ALIAS {
        format!("error.{owning_state_id}")
    } else {
        event_name.to_string()
    }
}

/// Resolve a parsed [`MachineDto`] into a built, ready-to-run
/// [`hfsm_core::Machine`] by issuing `Builder` calls for every state,
/// transition and dataflow in the tree, in document order.
pub fn dto_to_builder(dto: &MachineDto) -> Result<hfsm_core::Machine, ImportError> {
    if !matches!(dto, NodeDto::Machine { .. }) {
        return Err(ImportError::RootNotMachine);
    }
    let mut builder = Builder::new();
    builder = add_node(builder, dto, None)?;
    builder.build().map_err(ImportError::Build)
}

fn add_node(mut builder: Builder, node: &NodeDto, parent_id: Option<String>) -> Result<Builder, ImportError> {
    let id = node.id().map(str::to_string).unwrap_or_else(|| synth_id("n"));

    let (kind, input, output, transitions, dataflows, childs, name) = match node {
        NodeDto::Machine { initial, name, input, output, transitions, dataflows, childs, .. } => (
            StateSpecKind::Machine { initial_child: initial.clone() },
            input,
            output,
            transitions.as_slice(),
            dataflows.as_slice(),
            childs.as_slice(),
            name,
        ),
        NodeDto::Composite { initial, name, input, output, transitions, dataflows, childs, .. } => (
            StateSpecKind::Composite { initial_child: initial.clone() },
            input,
            output,
            transitions.as_slice(),
            dataflows.as_slice(),
            childs.as_slice(),
            name,
        ),
        NodeDto::Parallel { name, input, output, transitions, dataflows, childs, .. } => (
            StateSpecKind::Parallel,
            input,
            output,
            transitions.as_slice(),
            dataflows.as_slice(),
            childs.as_slice(),
            name,
        ),
        NodeDto::Invoke { name, input, output, transitions, dataflows, endpoint, .. } => (
            endpoint_kind(endpoint)?,
            input,
            output,
            transitions.as_slice(),
            dataflows.as_slice(),
            &[][..],
            name,
        ),
        NodeDto::Final { name, input, output, dataflows, .. } => {
            (StateSpecKind::Final, input, output, &[][..], dataflows.as_slice(), &[][..], name)
        }
    };

    let input_value = hfsm_value::json::from_json(input);
    let output_value = hfsm_value::json::from_json(output);
    let mut spec = StateSpec::new(id.clone(), parent_id, kind).with_input(input_value).with_output(output_value);
    if let Some(name) = name {
        spec = spec.with_name(name.clone());
    }
    builder = builder.add_state(spec);

    for t in transitions {
        builder = builder.add_transition(transition_spec(&id, t));
    }
    for df in dataflows {
        builder = builder.add_dataflow(dataflow_spec(&id, df));
    }
    for child in childs {
        builder = add_node(builder, child, Some(id.clone()))?;
    }

    Ok(builder)
}

fn endpoint_kind(endpoint: &EndpointDto) -> Result<StateSpecKind, ImportError> {
    let endpoint_value: Value = hfsm_value::json::from_json(&endpoint.payload);
    Ok(StateSpecKind::Invoke { binding: endpoint.binding.clone(), endpoint: endpoint_value })
}

fn transition_spec(source_id: &str, t: &TransitionDto) -> TransitionSpec {
    let mut spec = TransitionSpec::new(source_id, t.target.clone());
    spec.id = t.id.clone();
    if let Some(event) = &t.event {
        spec = spec.on_event(rewrite_event(event, source_id));
    }
    if let Some(condition) = &t.condition {
        spec = spec.when(condition.clone());
    }
    spec
}

fn dataflow_spec(target_id: &str, df: &DataflowDto) -> DataflowSpec {
    DataflowSpec::new(df.source.clone(), df.from.clone(), target_id, df.to.clone())
}
