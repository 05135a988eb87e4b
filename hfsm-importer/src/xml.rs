use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::dto::{DataflowDto, EndpointDto, MachineDto, NodeDto, TransitionDto};
use crate::error::ImportError;

/// Parse an XML description into a [`MachineDto`].
///
/// `input`/`output`/`endpoint` subtrees are handed off verbatim to
/// [`hfsm_value::xml::from_xml_str`], which already knows the declared-type
/// element grammar; this module only has to recognize the state/transition/
/// dataflow scaffolding around them.
pub fn parse_xml(xml: &str) -> Result<MachineDto, ImportError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match next_event(&mut reader)? {
            Event::Start(e) => {
                let tag = tag_name(&e);
                let attrs = read_attrs(&e);
                return parse_node(&mut reader, xml, tag, attrs, false);
            }
            Event::Empty(e) => {
                let tag = tag_name(&e);
                let attrs = read_attrs(&e);
                return parse_node(&mut reader, xml, tag, attrs, true);
            }
            Event::Eof => return Err(ImportError::Xml("empty document".into())),
            _ => {}
        }
    }
}

fn next_event<'a>(reader: &'a mut Reader<&[u8]>) -> Result<Event<'a>, ImportError> {
    reader.read_event().map_err(|e| ImportError::Xml(e.to_string()))
}

fn tag_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).to_string()
}

fn read_attrs(start: &BytesStart) -> HashMap<String, String> {
    start
        .attributes()
        .flatten()
        .filter_map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
            a.unescape_value().ok().map(|v| (key, v.into_owned()))
        })
        .collect()
}

fn skip_to_end(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<(), ImportError> {
    let mut depth = 0usize;
    loop {
        match next_event(reader)? {
            Event::Start(e) if e.name().as_ref() == tag => depth += 1,
            Event::End(e) if e.name().as_ref() == tag => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => return Err(ImportError::Xml("unexpected end of document".into())),
            _ => {}
        }
    }
}

/// Capture the raw XML text of one whole element (already seen as the next
/// event) so it can be re-parsed by a format-specific adapter that expects
/// to own a standalone document, such as `hfsm_value::xml::from_xml_str`.
fn capture_element<'a>(reader: &mut Reader<&[u8]>, xml: &'a str, start_pos: usize, tag: &[u8], self_closing: bool) -> Result<&'a str, ImportError> {
    if !self_closing {
        skip_to_end(reader, tag)?;
    }
    let end_pos = reader.buffer_position() as usize;
    Ok(&xml[start_pos..end_pos])
}

#[allow(clippy::too_many_arguments)]
fn parse_node(
    reader: &mut Reader<&[u8]>,
    xml: &str,
    tag: String,
    attrs: HashMap<String, String>,
    self_closing: bool,
) -> Result<NodeDto, ImportError> {
    let id = attrs.get("id").cloned();
    let initial = attrs.get("initial").cloned();
    let name = attrs.get("name").cloned();

    let mut input = serde_json::Value::Object(serde_json::Map::new());
    let mut output = serde_json::Value::Object(serde_json::Map::new());
    let mut transitions = Vec::new();
    let mut dataflows = Vec::new();
    let mut childs = Vec::new();
    let mut endpoint: Option<EndpointDto> = None;

    if !self_closing {
        let own_tag = tag.as_bytes().to_vec();
        loop {
            let child_start = reader.buffer_position() as usize;
            match next_event(reader)? {
                Event::End(e) if e.name().as_ref() == own_tag.as_slice() => break,
                Event::Start(e) => {
                    let child_tag = tag_name(&e);
                    let child_attrs = read_attrs(&e);
                    match child_tag.as_str() {
                        "input" => {
                            let raw = capture_element(reader, xml, child_start, child_tag.as_bytes(), false)?;
                            input = to_json(raw)?;
                        }
                        "output" => {
                            let raw = capture_element(reader, xml, child_start, child_tag.as_bytes(), false)?;
                            output = to_json(raw)?;
                        }
                        "endpoint" => {
                            let binding = child_attrs
                                .get("binding")
                                .cloned()
                                .ok_or_else(|| ImportError::Xml("endpoint missing binding attribute".into()))?;
                            let raw = capture_element(reader, xml, child_start, child_tag.as_bytes(), false)?;
                            let payload = to_json(raw)?;
                            endpoint = Some(EndpointDto { binding, payload });
                        }
                        "transitions" => {
                            transitions = parse_transitions(reader)?;
                        }
                        "dataflows" => {
                            dataflows = parse_dataflows(reader)?;
                        }
                        "childs" => {
                            childs = parse_childs(reader, xml)?;
                        }
                        _ => skip_to_end(reader, child_tag.as_bytes())?,
                    }
                }
                Event::Empty(e) => {
                    let child_tag = tag_name(&e);
                    if child_tag == "input" || child_tag == "output" {
                        let raw = capture_element(reader, xml, child_start, child_tag.as_bytes(), true)?;
                        let v = to_json(raw)?;
                        if child_tag == "input" {
                            input = v;
                        } else {
                            output = v;
                        }
                    }
                }
                Event::Eof => return Err(ImportError::Xml("unexpected end of document".into())),
                _ => {}
            }
        }
    }

    build_node(tag, id, initial, name, input, output, transitions, dataflows, childs, endpoint)
}

fn to_json(raw: &str) -> Result<serde_json::Value, ImportError> {
    let value = hfsm_value::xml::from_xml_str(raw)?;
    Ok(hfsm_value::json::to_json(&value)?)
}

fn parse_transitions(reader: &mut Reader<&[u8]>) -> Result<Vec<TransitionDto>, ImportError> {
    let mut out = Vec::new();
    loop {
        match next_event(reader)? {
            Event::End(e) if e.name().as_ref() == b"transitions" => break,
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"transition" => {
                let attrs = read_attrs(&e);
                out.push(TransitionDto {
                    id: attrs.get("id").cloned(),
                    target: attrs
                        .get("target")
                        .cloned()
                        .ok_or_else(|| ImportError::Xml("transition missing target attribute".into()))?,
                    event: attrs.get("event").cloned(),
                    condition: attrs.get("condition").cloned(),
                });
            }
            Event::Eof => return Err(ImportError::Xml("unexpected end of document".into())),
            _ => {}
        }
    }
    Ok(out)
}

fn parse_dataflows(reader: &mut Reader<&[u8]>) -> Result<Vec<DataflowDto>, ImportError> {
    let mut out = Vec::new();
    loop {
        match next_event(reader)? {
            Event::End(e) if e.name().as_ref() == b"dataflows" => break,
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"dataflow" => {
                let attrs = read_attrs(&e);
                out.push(DataflowDto {
                    source: attrs
                        .get("source")
                        .cloned()
                        .ok_or_else(|| ImportError::Xml("dataflow missing source attribute".into()))?,
                    from: attrs
                        .get("from")
                        .cloned()
                        .ok_or_else(|| ImportError::Xml("dataflow missing from attribute".into()))?,
                    to: attrs
                        .get("to")
                        .cloned()
                        .ok_or_else(|| ImportError::Xml("dataflow missing to attribute".into()))?,
                });
            }
            Event::Eof => return Err(ImportError::Xml("unexpected end of document".into())),
            _ => {}
        }
    }
    Ok(out)
}

fn parse_childs(reader: &mut Reader<&[u8]>, xml: &str) -> Result<Vec<NodeDto>, ImportError> {
    let mut out = Vec::new();
    loop {
        match next_event(reader)? {
            Event::End(e) if e.name().as_ref() == b"childs" => break,
            Event::Start(e) => {
                let tag = tag_name(&e);
                let attrs = read_attrs(&e);
                out.push(parse_node(reader, xml, tag, attrs, false)?);
            }
            Event::Empty(e) => {
                let tag = tag_name(&e);
                let attrs = read_attrs(&e);
                out.push(parse_node(reader, xml, tag, attrs, true)?);
            }
            Event::Eof => return Err(ImportError::Xml("unexpected end of document".into())),
            _ => {}
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn build_node(
    tag: String,
    id: Option<String>,
    initial: Option<String>,
    name: Option<String>,
    input: serde_json::Value,
    output: serde_json::Value,
    transitions: Vec<TransitionDto>,
    dataflows: Vec<DataflowDto>,
    childs: Vec<NodeDto>,
    endpoint: Option<EndpointDto>,
) -> Result<NodeDto, ImportError> {
    let require_id = |id: Option<String>, tag: &str| {
        id.ok_or_else(|| ImportError::Xml(format!("<{tag}> is missing a required id attribute")))
    };
    match tag.as_str() {
        "statemachine" => Ok(NodeDto::Machine { id, initial, name, input, output, transitions, dataflows, childs }),
        "composite" => Ok(NodeDto::Composite {
            id: require_id(id, "composite")?,
            initial,
            name,
            input,
            output,
            transitions,
            dataflows,
            childs,
        }),
        "parallel" => Ok(NodeDto::Parallel {
            id: require_id(id, "parallel")?,
            name,
            input,
            output,
            transitions,
            dataflows,
            childs,
        }),
        "invoke" => Ok(NodeDto::Invoke {
            id: require_id(id, "invoke")?,
            name,
            input,
            output,
            transitions,
            dataflows,
            endpoint: endpoint.ok_or_else(|| ImportError::Xml("<invoke> is missing its endpoint child".into()))?,
        }),
        "final" => Ok(NodeDto::Final {
            id: require_id(id, "final")?,
            name,
            input,
            output,
            dataflows,
        }),
        other => Err(ImportError::Xml(format!("unknown state element <{other}>"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_composite_machine() {
        let xml = r#"
<statemachine id="root" initial="A">
  <childs>
    <composite id="A">
      <transitions>
        <transition target="F" event="go"/>
      </transitions>
    </composite>
    <final id="F"/>
  </childs>
</statemachine>
"#;
        let dto = parse_xml(xml).unwrap();
        match dto {
            NodeDto::Machine { id, initial, childs, .. } => {
                assert_eq!(id.as_deref(), Some("root"));
                assert_eq!(initial.as_deref(), Some("A"));
                assert_eq!(childs.len(), 2);
            }
            other => panic!("expected Machine, got {other:?}"),
        }
    }

    #[test]
    fn parses_invoke_endpoint_and_input() {
        let xml = r#"
<statemachine id="root" initial="I">
  <childs>
    <invoke id="I">
      <input type="object"><x type="integer">7</x></input>
      <endpoint binding="HTTP">
        <url type="string">https://example.test</url>
      </endpoint>
    </invoke>
    <final id="F"/>
  </childs>
</statemachine>
"#;
        let dto = parse_xml(xml).unwrap();
        let NodeDto::Machine { childs, .. } = dto else { panic!("expected Machine") };
        let NodeDto::Invoke { input, endpoint, .. } = &childs[0] else { panic!("expected Invoke") };
        assert_eq!(input["x"], serde_json::json!(7));
        assert_eq!(endpoint.binding, "HTTP");
        assert_eq!(endpoint.payload["url"], serde_json::json!("https://example.test"));
    }
}
