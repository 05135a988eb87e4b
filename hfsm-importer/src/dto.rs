use serde::{Deserialize, Serialize};

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// A `transitions` child of a state element. The enclosing state is always
/// the transition's source; only the target is named explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDto {
    #[serde(default)]
    pub id: Option<String>,
    pub target: String,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

/// A `dataflows` child of a state element. The enclosing state is always
/// the dataflow's target; `source` names the state the value is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataflowDto {
    pub source: String,
    pub from: String,
    pub to: String,
}

/// An `invoke` state's `endpoint` child: a binding name plus a
/// binding-specific payload tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDto {
    pub binding: String,
    /// Every other key on the endpoint element, flattened together: the
    /// binding-specific payload, shaped however that binding expects.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// A parsed state element, still carrying builder-facing external string
/// ids and nested `childs` rather than resolved arena ids.
///
/// Tagged by `kind`, matching the element names of the description format:
/// `statemachine`, `composite`, `parallel`, `invoke`, `final`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeDto {
    #[serde(rename = "statemachine")]
    Machine {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        initial: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "empty_object")]
        input: serde_json::Value,
        #[serde(default = "empty_object")]
        output: serde_json::Value,
        #[serde(default)]
        transitions: Vec<TransitionDto>,
        #[serde(default)]
        dataflows: Vec<DataflowDto>,
        #[serde(default)]
        childs: Vec<NodeDto>,
    },
    #[serde(rename = "composite")]
    Composite {
        id: String,
        #[serde(default)]
        initial: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "empty_object")]
        input: serde_json::Value,
        #[serde(default = "empty_object")]
        output: serde_json::Value,
        #[serde(default)]
        transitions: Vec<TransitionDto>,
        #[serde(default)]
        dataflows: Vec<DataflowDto>,
        #[serde(default)]
        childs: Vec<NodeDto>,
    },
    #[serde(rename = "parallel")]
    Parallel {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "empty_object")]
        input: serde_json::Value,
        #[serde(default = "empty_object")]
        output: serde_json::Value,
        #[serde(default)]
        transitions: Vec<TransitionDto>,
        #[serde(default)]
        dataflows: Vec<DataflowDto>,
        #[serde(default)]
        childs: Vec<NodeDto>,
    },
    #[serde(rename = "invoke")]
    Invoke {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "empty_object")]
        input: serde_json::Value,
        #[serde(default = "empty_object")]
        output: serde_json::Value,
        #[serde(default)]
        transitions: Vec<TransitionDto>,
        #[serde(default)]
        dataflows: Vec<DataflowDto>,
        endpoint: EndpointDto,
    },
    #[serde(rename = "final")]
    Final {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "empty_object")]
        input: serde_json::Value,
        #[serde(default = "empty_object")]
        output: serde_json::Value,
        #[serde(default)]
        dataflows: Vec<DataflowDto>,
    },
}

impl NodeDto {
    pub fn id(&self) -> Option<&str> {
        match self {
            NodeDto::Machine { id, .. } => id.as_deref(),
            NodeDto::Composite { id, .. } => Some(id),
            NodeDto::Parallel { id, .. } => Some(id),
            NodeDto::Invoke { id, .. } => Some(id),
            NodeDto::Final { id, .. } => Some(id),
        }
    }

    pub fn childs(&self) -> &[NodeDto] {
        match self {
            NodeDto::Machine { childs, .. } => childs,
            NodeDto::Composite { childs, .. } => childs,
            NodeDto::Parallel { childs, .. } => childs,
            NodeDto::Invoke { .. } | NodeDto::Final { .. } => &[],
        }
    }
}

/// A whole parsed description is just its root state element. `Machine` is
/// the only element kind valid at the root, but that is checked during
/// `dto_to_builder`, not here.
pub type MachineDto = NodeDto;
