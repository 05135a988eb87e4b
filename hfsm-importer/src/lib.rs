//! Description-format adapters: parse an XML/JSON/YAML state machine
//! description into a [`dto::MachineDto`], then resolve that into a built
//! [`hfsm_core::Machine`] by replaying it through [`hfsm_core::Builder`].

mod builder;
pub mod dto;
mod error;
mod json;
mod xml;
mod yaml;

pub use builder::dto_to_builder;
pub use dto::MachineDto;
pub use error::ImportError;
pub use json::parse_json;
pub use xml::parse_xml;
pub use yaml::parse_yaml;

/// Parse a JSON description and resolve it directly into a built machine.
pub fn load_json(json: &str) -> Result<hfsm_core::Machine, ImportError> {
    dto_to_builder(&parse_json(json)?)
}

/// Parse a YAML description and resolve it directly into a built machine.
pub fn load_yaml(yaml: &str) -> Result<hfsm_core::Machine, ImportError> {
    dto_to_builder(&parse_yaml(yaml)?)
}

/// Parse an XML description and resolve it directly into a built machine.
pub fn load_xml(xml: &str) -> Result<hfsm_core::Machine, ImportError> {
    dto_to_builder(&parse_xml(xml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_scenario_s1_shape_from_yaml() {
        let yaml = r#"
kind: statemachine
id: R
initial: A
childs:
  - kind: composite
    id: A
    transitions:
      - target: F
        event: go
  - kind: final
    id: F
"#;
        let machine = load_yaml(yaml).expect("should build");
        assert_eq!(machine.states().len(), 3);
    }

    #[test]
    fn finish_alias_rewritten_to_done_event() {
        let yaml = r#"
kind: statemachine
id: R
initial: A
childs:
  - kind: composite
    id: A
    initial: A1
    transitions:
      - target: F
        event: finish
    childs:
      - kind: final
        id: A1
  - kind: final
    id: F
"#;
        let machine = load_yaml(yaml).expect("should build");
        let transition = machine
            .states()
            .iter()
            .find(|s| s.external_id == "A")
            .and_then(|s| s.outgoing.first())
            .map(|&tid| machine.transition(tid));
        assert_eq!(transition.unwrap().event_name, "done.A");
    }
}
