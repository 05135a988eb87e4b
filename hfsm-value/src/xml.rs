use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ValueError, ValueResult};
use crate::value::{Contents, Value};

/// XML has no native type tags, so every element carries a `type`
/// attribute naming its `Value` variant. Objects and
/// Arrays nest their members as child elements; Array members are all
/// named `item`.
fn write_value(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    value: &Value,
) -> ValueResult<()> {
    match value.snapshot() {
        Contents::Undefined => Err(ValueError::UndefinedNotSerializable),
        Contents::Null => {
            let mut start = BytesStart::new(tag);
            start.push_attribute(("type", "null"));
            writer.write_event(Event::Empty(start))?;
            Ok(())
        }
        Contents::Boolean(b) => write_scalar(writer, tag, "boolean", &b.to_string()),
        Contents::Integer(i) => write_scalar(writer, tag, "integer", &i.to_string()),
        Contents::Float(f) => write_scalar(writer, tag, "float", &f.to_string()),
        Contents::String(s) => write_scalar(writer, tag, "string", &s),
        Contents::Array(items) => {
            let mut start = BytesStart::new(tag);
            start.push_attribute(("type", "array"));
            writer.write_event(Event::Start(start))?;
            for item in &items {
                write_value(writer, "item", item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
            Ok(())
        }
        Contents::Object(obj) => {
            let mut start = BytesStart::new(tag);
            start.push_attribute(("type", "object"));
            writer.write_event(Event::Start(start))?;
            for (k, v) in obj.iter() {
                write_value(writer, k, v)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
            Ok(())
        }
    }
}

fn write_scalar(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    type_attr: &str,
    text: &str,
) -> ValueResult<()> {
    let mut start = BytesStart::new(tag);
    start.push_attribute(("type", type_attr));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

pub fn to_xml_string(value: &Value, root_name: &str) -> ValueResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_value(&mut writer, root_name, value)?;
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes).expect("writer only emits escaped utf8"))
}

/// A scratch tree mirroring the XML element structure, built before it is
/// interpreted against the `type` attribute. Needed because an Array's
/// `item` children and an Object's keyed children are read identically at
/// the XML level and only diverge once we know the parent's declared type.
struct Node {
    type_attr: String,
    text: String,
    children: Vec<(String, Node)>,
}

fn attr_type(start: &BytesStart, default: &str) -> String {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"type")
        .and_then(|a| a.unescape_value().ok())
        .map(|c| c.into_owned())
        .unwrap_or_else(|| default.to_string())
}

fn read_children(reader: &mut Reader<&[u8]>) -> ValueResult<Node> {
    let mut node = Node {
        type_attr: "object".to_string(),
        text: String::new(),
        children: Vec::new(),
    };
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let type_attr = attr_type(&e, "object");
                let mut child = read_children(reader)?;
                child.type_attr = type_attr;
                node.children.push((name, child));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let type_attr = attr_type(&e, "null");
                node.children.push((
                    name,
                    Node {
                        type_attr,
                        text: String::new(),
                        children: Vec::new(),
                    },
                ));
            }
            Event::Text(t) => node.text.push_str(&t.unescape()?),
            Event::End(_) => break,
            Event::Eof => {
                return Err(ValueError::XmlStructure("unexpected end of document".into()))
            }
            _ => {}
        }
    }
    Ok(node)
}

fn node_to_value(node: Node) -> ValueResult<Value> {
    match node.type_attr.as_str() {
        "null" => Ok(Value::null()),
        "boolean" => node
            .text
            .trim()
            .parse()
            .map(Value::boolean)
            .map_err(|_| ValueError::XmlStructure(format!("invalid boolean '{}'", node.text))),
        "integer" => node
            .text
            .trim()
            .parse()
            .map(Value::integer)
            .map_err(|_| ValueError::XmlStructure(format!("invalid integer '{}'", node.text))),
        "float" => node
            .text
            .trim()
            .parse()
            .map(Value::float)
            .map_err(|_| ValueError::XmlStructure(format!("invalid float '{}'", node.text))),
        "string" => Ok(Value::string(node.text)),
        "array" => {
            let v = Value::array();
            for (_, child) in node.children {
                v.push(node_to_value(child)?)?;
            }
            Ok(v)
        }
        "object" => {
            let v = Value::object();
            for (name, child) in node.children {
                v.insert_field(name, node_to_value(child)?)?;
            }
            Ok(v)
        }
        other => Err(ValueError::XmlStructure(format!(
            "unknown type attribute '{other}'"
        ))),
    }
}

pub fn from_xml_str(xml: &str) -> ValueResult<Value> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let type_attr = attr_type(&e, "object");
                let mut node = read_children(&mut reader)?;
                node.type_attr = type_attr;
                return node_to_value(node);
            }
            Event::Empty(e) => {
                let type_attr = attr_type(&e, "null");
                return node_to_value(Node {
                    type_attr,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            Event::Eof => return Err(ValueError::XmlStructure("empty document".into())),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_declared_types() {
        let root = Value::object();
        root.insert_field("name", Value::string("idle")).unwrap();
        root.insert_field("retries", Value::integer(3)).unwrap();
        root.insert_field("armed", Value::boolean(true)).unwrap();
        let tags = Value::array();
        tags.push(Value::string("a")).unwrap();
        tags.push(Value::string("b")).unwrap();
        root.insert_field("tags", tags).unwrap();

        let xml = to_xml_string(&root, "state").unwrap();
        let back = from_xml_str(&xml).unwrap();
        assert_eq!(root, back);
    }

    #[test]
    fn undefined_rejected() {
        let v = Value::undefined();
        assert!(matches!(
            to_xml_string(&v, "root"),
            Err(ValueError::UndefinedNotSerializable)
        ));
    }
}
