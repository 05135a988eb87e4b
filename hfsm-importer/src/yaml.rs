use crate::dto::MachineDto;
use crate::error::ImportError;

/// Parse a YAML description into a [`MachineDto`].
pub fn parse_yaml(yaml: &str) -> Result<MachineDto, ImportError> {
    let dto: MachineDto = serde_yaml::from_str(yaml)?;
    Ok(dto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_composite_machine() {
        let yaml = r#"
kind: statemachine
id: root
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
        let dto = parse_yaml(yaml).unwrap();
        match dto {
            crate::dto::NodeDto::Machine { id, initial, childs, .. } => {
                assert_eq!(id.as_deref(), Some("root"));
                assert_eq!(initial.as_deref(), Some("A"));
                assert_eq!(childs.len(), 2);
            }
            other => panic!("expected Machine, got {other:?}"),
        }
    }
}
