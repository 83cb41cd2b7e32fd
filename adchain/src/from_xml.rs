//! Decoding GraphML page graph recordings into the typed graph model.
//!
//! An undecodable document is a [`GraphError::ParseFailure`]; node and edge
//! kinds this tool never consumes decode into the `Unknown` variants rather
//! than failing the whole graph.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use xml::reader::{EventReader, XmlEvent};

use crate::error::GraphError;
use crate::graph::{Edge, EdgeId, FrameId, GraphMeta, Node, NodeId, PageGraph};
use crate::types::{EdgeType, NodeType, RequestType, ScriptType};

/// Reads a page graph from a GraphML-formatted file.
pub fn read_from_file(path: &Path) -> Result<PageGraph, GraphError> {
    let file = File::open(path)
        .map_err(|e| GraphError::Unavailable(format!("{}: {}", path.display(), e)))?;
    parse_document(EventReader::new(BufReader::new(file)))
}

/// Reads a page graph from GraphML text, e.g. as returned by a
/// [`GraphSource`](crate::sources::GraphSource).
pub fn read_from_string(document: &str) -> Result<PageGraph, GraphError> {
    parse_document(EventReader::new(document.as_bytes()))
}

fn next_event<R: std::io::Read>(parser: &mut EventReader<R>) -> Result<XmlEvent, GraphError> {
    parser.next().map_err(|e| GraphError::parse(e.to_string()))
}

fn parse_document<R: std::io::Read>(mut parser: EventReader<R>) -> Result<PageGraph, GraphError> {
    match next_event(&mut parser)? {
        XmlEvent::StartDocument { .. } => parse_xml_document(&mut parser),
        other => Err(GraphError::parse(format!("expected start of document, found {:?}", other))),
    }
}

fn parse_xml_document<R: std::io::Read>(parser: &mut EventReader<R>) -> Result<PageGraph, GraphError> {
    match next_event(parser)? {
        XmlEvent::StartElement { name, .. } if name.local_name == "graphml" => parse_graphml(parser),
        other => Err(GraphError::parse(format!("expected graphml element, found {:?}", other))),
    }
}

fn build_scalar_tag_datum<R: std::io::Read>(
    parser: &mut EventReader<R>,
    tag_name: &str,
) -> Result<Option<String>, GraphError> {
    let mut contents = None;
    loop {
        match next_event(parser)? {
            XmlEvent::EndElement { name } if name.local_name == tag_name => break,
            XmlEvent::Characters(c) => contents = Some(c),
            XmlEvent::Whitespace(_) => {}
            other => {
                return Err(GraphError::parse(format!("unexpected {:?} in `{}`", other, tag_name)))
            }
        }
    }
    Ok(contents)
}

impl GraphMeta {
    fn build_meta<R: std::io::Read>(parser: &mut EventReader<R>) -> Result<Self, GraphError> {
        let mut version = None;
        let mut url = None;
        let mut is_root = None;
        loop {
            match next_event(parser)? {
                XmlEvent::StartElement { name, .. } => match &name.local_name[..] {
                    "version" => version = build_scalar_tag_datum(parser, "version")?,
                    "url" => url = build_scalar_tag_datum(parser, "url")?,
                    "is_root" => is_root = build_scalar_tag_datum(parser, "is_root")?,
                    _ => (),
                },
                XmlEvent::EndElement { name } if name.local_name == "desc" => break,
                XmlEvent::EndDocument => {
                    return Err(GraphError::parse("document ended inside `desc`".to_string()))
                }
                _ => {}
            }
        }
        Ok(Self {
            version,
            url,
            is_root: is_root.map(|v| v == "true"),
        })
    }
}

fn parse_graphml<R: std::io::Read>(parser: &mut EventReader<R>) -> Result<PageGraph, GraphError> {
    let mut node_items = HashMap::new();
    let mut edge_items = HashMap::new();
    let mut meta = None;
    loop {
        match next_event(parser)? {
            XmlEvent::StartElement { name, attributes, .. } => match &name.local_name[..] {
                "key" => {
                    let (for_type, id, key) = build_key(parser, attributes)?;
                    match for_type {
                        KeyItemFor::Node => node_items.insert(id, key),
                        KeyItemFor::Edge => edge_items.insert(id, key),
                    };
                }
                "desc" => {
                    meta = Some(GraphMeta::build_meta(parser)?);
                }
                "graph" => break,
                _ => {}
            },
            XmlEvent::EndElement { name } => {
                return Err(GraphError::parse(format!(
                    "unexpected end of element {} before graph definition",
                    name
                )));
            }
            XmlEvent::EndDocument => {
                return Err(GraphError::parse("graphml ended without graph definition".to_string()))
            }
            _ => {}
        }
    }

    let key = KeyModel { node_items, edge_items };
    build_graph(parser, &key, meta.unwrap_or_default())
}

struct KeyModel {
    node_items: HashMap<String, KeyItem>,
    edge_items: HashMap<String, KeyItem>,
}

/// One GraphML `<key>` declaration: maps an intelligible attribute name to
/// the opaque id that `<data>` items reference.
struct KeyItem {
    id: String,
}

enum KeyItemFor {
    Node,
    Edge,
}

impl TryFrom<&str> for KeyItemFor {
    type Error = ();

    fn try_from(v: &str) -> Result<Self, ()> {
        match v {
            "node" => Ok(Self::Node),
            "edge" => Ok(Self::Edge),
            _ => Err(()),
        }
    }
}

fn build_key<R: std::io::Read>(
    parser: &mut EventReader<R>,
    attributes: Vec<xml::attribute::OwnedAttribute>,
) -> Result<(KeyItemFor, String, KeyItem), GraphError> {
    let mut id = None;
    let mut for_type = None;
    let mut attr_name = None;
    for attribute in attributes {
        match &attribute.name.local_name[..] {
            "id" => id = Some(attribute.value),
            "for" => for_type = Some(attribute.value),
            "attr.name" => attr_name = Some(attribute.value),
            _ => (),
        }
    }
    let key_item = KeyItem {
        id: id.ok_or_else(|| GraphError::parse("couldn't find `id` value on key".to_string()))?,
    };

    match next_event(parser)? {
        XmlEvent::EndElement { name } if name.local_name == "key" => {}
        other => {
            return Err(GraphError::parse(format!("expected end of key element, found {:?}", other)))
        }
    }

    let for_type = for_type
        .ok_or_else(|| GraphError::parse("couldn't find `for` value on key".to_string()))?;
    let for_type = KeyItemFor::try_from(&for_type[..])
        .map_err(|_| GraphError::parse(format!("unexpected `for` value `{}` on key", for_type)))?;
    let attr_name = attr_name
        .ok_or_else(|| GraphError::parse("couldn't find `attr.name` value on key".to_string()))?;

    Ok((for_type, attr_name, key_item))
}

fn build_graph<R: std::io::Read>(
    parser: &mut EventReader<R>,
    key: &KeyModel,
    meta: GraphMeta,
) -> Result<PageGraph, GraphError> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    loop {
        match next_event(parser)? {
            XmlEvent::StartElement { name, attributes, .. } => match &name.local_name[..] {
                "node" => nodes.push(build_node(parser, attributes, &key.node_items)?),
                "edge" => edges.push(build_edge(parser, attributes, &key.edge_items)?),
                other => {
                    return Err(GraphError::parse(format!("unexpected `{}` in graph", other)))
                }
            },
            XmlEvent::EndElement { name } if name.local_name == "graph" => break,
            XmlEvent::EndDocument => {
                return Err(GraphError::parse("document ended inside `graph`".to_string()))
            }
            _ => {}
        }
    }

    PageGraph::from_parts(meta, nodes, edges)
}

/// Remove and return an attribute from an attribute map according to the key, if present
macro_rules! drain_opt_string_from {
    ( $attrs:ident, $key:ident, $attr:expr ) => {
        match $key.get($attr) {
            Some(item) => $attrs.remove(&item.id),
            None => None,
        }
    };
}
/// Error if the attribute string does not exist in the map
macro_rules! drain_string_from {
    ( $attrs:ident, $key:ident, $attr:expr ) => {
        drain_opt_string_from!($attrs, $key, $attr)
            .ok_or_else(|| GraphError::parse(format!("attribute `{}` was not present", $attr)))?
    };
}
/// Error if the attribute string cannot be parsed as a boolean value
macro_rules! drain_bool_from {
    ( $attrs:ident, $key:ident, $attr:expr ) => {
        drain_string_from!($attrs, $key, $attr)
            .to_ascii_lowercase()
            .parse::<bool>()
            .map_err(|_| GraphError::parse(format!("could not parse attribute `{}` as bool", $attr)))?
    };
}
/// Error if the optional attribute string cannot be parsed as an unsigned numeric value
macro_rules! drain_opt_usize_from {
    ( $attrs:ident, $key:ident, $attr:expr ) => {
        match drain_opt_string_from!($attrs, $key, $attr) {
            Some(inner_data) => Some(inner_data.parse::<usize>().map_err(|_| {
                GraphError::parse(format!("could not parse attribute `{}` as usize", $attr))
            })?),
            None => None,
        }
    };
}
/// Error if the attribute string cannot be parsed as an unsigned numeric value
macro_rules! drain_usize_from {
    ( $attrs:ident, $key:ident, $attr:expr ) => {
        drain_string_from!($attrs, $key, $attr).parse::<usize>().map_err(|_| {
            GraphError::parse(format!("could not parse attribute `{}` as usize", $attr))
        })?
    };
}

fn build_edge<R: std::io::Read>(
    parser: &mut EventReader<R>,
    attributes: Vec<xml::attribute::OwnedAttribute>,
    key: &HashMap<String, KeyItem>,
) -> Result<Edge, GraphError> {
    let mut id_value = None;
    let mut source_value = None;
    let mut target_value = None;
    let mut edge_type = None;
    let mut edge_timestamp = None;
    let mut data = HashMap::new();
    for attribute in attributes {
        let name = attribute.name.local_name;
        let value = &attribute.value[..];
        match &name[..] {
            "id" => {
                id_value = Some(EdgeId::try_from(value).map_err(|_| {
                    GraphError::parse(format!("could not parse edge id `{}`", value))
                })?)
            }
            "source" => {
                source_value = Some(NodeId::try_from(value).map_err(|_| {
                    GraphError::parse(format!("could not parse edge source `{}`", value))
                })?)
            }
            "target" => {
                target_value = Some(NodeId::try_from(value).map_err(|_| {
                    GraphError::parse(format!("could not parse edge target `{}`", value))
                })?)
            }
            _ => return Err(GraphError::parse(format!("unexpected attribute in edge: {}", name))),
        }
    }

    let type_key = key.get("edge type").map(|item| item.id.as_str());
    let timestamp_key = key.get("timestamp").map(|item| item.id.as_str());
    loop {
        match next_event(parser)? {
            XmlEvent::StartElement { name, attributes, .. } if name.local_name == DataItem::STR_REP => {
                let data_item = DataItem::build_data(parser, attributes)?;
                let contained = data_item.contained;
                if Some(data_item.key.as_str()) == type_key {
                    edge_type = Some(contained);
                } else if Some(data_item.key.as_str()) == timestamp_key {
                    edge_timestamp = Some(
                        contained.trim_end_matches(".0").parse::<isize>().map_err(|_| {
                            GraphError::parse(format!("could not parse edge timestamp `{}`", contained))
                        })?,
                    );
                } else {
                    data.insert(data_item.key, contained);
                }
            }
            XmlEvent::EndElement { name } if name.local_name == "edge" => break,
            XmlEvent::EndDocument => {
                return Err(GraphError::parse("document ended inside `edge`".to_string()))
            }
            _ => {}
        }
    }

    let edge_type_attr = edge_type
        .ok_or_else(|| GraphError::parse("couldn't find `edge type` attr on edge".to_string()))?;
    let edge_type = EdgeType::construct(&edge_type_attr, &mut data, key)?;

    Ok(Edge {
        id: id_value.ok_or_else(|| GraphError::parse("couldn't find `id` value on edge".to_string()))?,
        edge_timestamp,
        edge_type,
        source: source_value
            .ok_or_else(|| GraphError::parse("couldn't find `source` value on edge".to_string()))?,
        target: target_value
            .ok_or_else(|| GraphError::parse("couldn't find `target` value on edge".to_string()))?,
    })
}

fn build_node<R: std::io::Read>(
    parser: &mut EventReader<R>,
    attributes: Vec<xml::attribute::OwnedAttribute>,
    key: &HashMap<String, KeyItem>,
) -> Result<Node, GraphError> {
    let mut id_value = None;
    let mut node_type = None;
    let mut node_timestamp = None;
    let mut data = HashMap::new();
    for attribute in attributes {
        let name = attribute.name.local_name;
        let value = &attribute.value[..];
        match &name[..] {
            "id" => {
                id_value = Some(NodeId::try_from(value).map_err(|_| {
                    GraphError::parse(format!("could not parse node id `{}`", value))
                })?)
            }
            _ => return Err(GraphError::parse(format!("unexpected attribute in node: {}", name))),
        }
    }

    let type_key = key.get("node type").map(|item| item.id.as_str());
    let timestamp_key = key.get("timestamp").map(|item| item.id.as_str());
    loop {
        match next_event(parser)? {
            XmlEvent::StartElement { name, attributes, .. } if name.local_name == DataItem::STR_REP => {
                let data_item = DataItem::build_data(parser, attributes)?;
                let contained = data_item.contained;
                if Some(data_item.key.as_str()) == type_key {
                    node_type = Some(contained);
                } else if Some(data_item.key.as_str()) == timestamp_key {
                    node_timestamp = Some(
                        contained.trim_end_matches(".0").parse::<isize>().map_err(|_| {
                            GraphError::parse(format!("could not parse node timestamp `{}`", contained))
                        })?,
                    );
                } else {
                    data.insert(data_item.key, contained);
                }
            }
            XmlEvent::EndElement { name } if name.local_name == "node" => break,
            XmlEvent::EndDocument => {
                return Err(GraphError::parse("document ended inside `node`".to_string()))
            }
            _ => {}
        }
    }

    let node_type_attr = node_type
        .ok_or_else(|| GraphError::parse("couldn't find `node type` attr on node".to_string()))?;
    let node_type = NodeType::construct(&node_type_attr, &mut data, key)?;

    Ok(Node {
        id: id_value.ok_or_else(|| GraphError::parse("couldn't find `id` value on node".to_string()))?,
        node_timestamp: node_timestamp.unwrap_or_default(),
        node_type,
    })
}

/// Represents a `data` GraphML node, which provides attributes associated
/// with a particular node or edge.
#[derive(Debug, PartialEq)]
struct DataItem {
    key: String,
    contained: String,
}

impl DataItem {
    const STR_REP: &'static str = "data";

    fn build_data<R: std::io::Read>(
        parser: &mut EventReader<R>,
        attributes: Vec<xml::attribute::OwnedAttribute>,
    ) -> Result<Self, GraphError> {
        let mut key_value = None;
        let mut contained_value: Option<String> = None;

        for attribute in attributes {
            if attribute.name.local_name == "key" {
                key_value = Some(attribute.value);
            }
        }

        loop {
            match next_event(parser)? {
                XmlEvent::EndElement { name } if name.local_name == Self::STR_REP => break,
                XmlEvent::Characters(c) => match contained_value {
                    // Entity references split characters into multiple events.
                    Some(ref mut contained) => contained.push_str(&c),
                    None => contained_value = Some(c),
                },
                XmlEvent::Whitespace(_) => (),
                XmlEvent::EndDocument => {
                    return Err(GraphError::parse("document ended inside `data`".to_string()))
                }
                other => {
                    return Err(GraphError::parse(format!(
                        "unexpected {:?} in `{}`",
                        other,
                        Self::STR_REP
                    )))
                }
            }
        }

        Ok(Self {
            key: key_value
                .ok_or_else(|| GraphError::parse("couldn't find `key` value on data".to_string()))?,
            contained: contained_value.unwrap_or_default(),
        })
    }
}

/// Allows building this type from a type string and a set of associated
/// attributes, each of which correspond to intelligible string
/// representations through a key.
///
/// Any attributes used will be drained from `attrs`.
trait KeyedAttrs: Sized {
    fn construct(
        type_str: &str,
        attrs: &mut HashMap<String, String>,
        key: &HashMap<String, KeyItem>,
    ) -> Result<Self, GraphError>;
}

impl KeyedAttrs for NodeType {
    fn construct(
        type_str: &str,
        attrs: &mut HashMap<String, String>,
        key: &HashMap<String, KeyItem>,
    ) -> Result<Self, GraphError> {
        macro_rules! drain_opt_string {
            ( $attr:expr ) => {
                drain_opt_string_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_string {
            ( $attr:expr ) => {
                drain_string_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_bool {
            ( $attr:expr ) => {
                drain_bool_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_usize {
            ( $attr:expr ) => {
                drain_usize_from!(attrs, key, $attr)
            };
        }

        Ok(match type_str {
            "resource" => Self::Resource {
                url: drain_string!("url"),
            },
            "HTML element" => Self::HtmlElement {
                tag_name: drain_string!("tag name"),
                is_deleted: drain_bool!("is deleted"),
                node_id: drain_usize!("node id"),
            },
            "text node" => Self::TextNode {
                text: drain_opt_string!("text"),
                is_deleted: drain_bool!("is deleted"),
                node_id: drain_usize!("node id"),
            },
            "DOM root" => Self::DomRoot {
                url: drain_opt_string!("url"),
                tag_name: drain_string!("tag name"),
                is_deleted: drain_bool!("is deleted"),
                node_id: drain_usize!("node id"),
            },
            "frame owner" => Self::FrameOwner {
                tag_name: drain_string!("tag name"),
                is_deleted: drain_bool!("is deleted"),
                node_id: drain_usize!("node id"),
            },
            "remote frame" => Self::RemoteFrame {
                frame_id: {
                    let raw = drain_string!("frame id");
                    FrameId::try_from(&raw[..]).map_err(|_| {
                        GraphError::parse(format!("could not parse frame id `{}`", raw))
                    })?
                },
                url: drain_opt_string!("url"),
            },
            "script" => Self::Script {
                url: drain_opt_string!("url"),
                script_type: ScriptType::from(&drain_string!("script type")[..]),
                script_id: drain_usize!("script id"),
            },
            "parser" => Self::Parser {},
            "extensions" => Self::Extensions {},
            "local storage" => Self::LocalStorage {},
            "session storage" => Self::SessionStorage {},
            "cookie jar" => Self::CookieJar {},
            "storage" => Self::Storage {},
            _ => Self::Unknown {
                type_name: type_str.to_string(),
            },
        })
    }
}

impl KeyedAttrs for EdgeType {
    fn construct(
        type_str: &str,
        attrs: &mut HashMap<String, String>,
        key: &HashMap<String, KeyItem>,
    ) -> Result<Self, GraphError> {
        macro_rules! drain_opt_string {
            ( $attr:expr ) => {
                drain_opt_string_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_string {
            ( $attr:expr ) => {
                drain_string_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_bool {
            ( $attr:expr ) => {
                drain_bool_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_opt_usize {
            ( $attr:expr ) => {
                drain_opt_usize_from!(attrs, key, $attr)
            };
        }
        macro_rules! drain_usize {
            ( $attr:expr ) => {
                drain_usize_from!(attrs, key, $attr)
            };
        }

        Ok(match type_str {
            "structure" => Self::Structure {},
            "cross DOM" => Self::CrossDom {},
            "text change" => Self::TextChange {},
            "remove node" => Self::RemoveNode {},
            "delete node" => Self::DeleteNode {},
            "insert node" => Self::InsertNode {
                parent: drain_usize!("parent"),
                before: drain_opt_usize!("before"),
            },
            "create node" => Self::CreateNode {},
            "js result" => Self::JsResult {
                value: drain_opt_string!("value"),
            },
            "js call" => Self::JsCall {
                args: drain_opt_string!("args"),
                script_position: drain_opt_usize!("script position"),
            },
            "request complete" => Self::RequestComplete {
                resource_type: drain_string!("resource type"),
                status: drain_string!("status"),
                value: drain_opt_string!("value"),
                response_hash: drain_opt_string!("response hash"),
                request_id: drain_usize!("request id"),
                headers: drain_string!("headers"),
                size: drain_string!("size"),
            },
            "request error" => Self::RequestError {
                status: drain_string!("status"),
                request_id: drain_usize!("request id"),
                value: drain_opt_string!("value"),
                headers: drain_string!("headers"),
                size: drain_string!("size"),
            },
            "request start" => Self::RequestStart {
                request_type: RequestType::from(&drain_string!("request type")[..]),
                status: drain_string!("status"),
                request_id: drain_usize!("request id"),
            },
            "add event listener" => Self::AddEventListener {
                key: drain_string!("key"),
                event_listener_id: drain_usize!("event listener id"),
                script_id: drain_usize!("script id"),
            },
            "remove event listener" => Self::RemoveEventListener {
                key: drain_string!("key"),
                event_listener_id: drain_usize!("event listener id"),
                script_id: drain_usize!("script id"),
            },
            "event listener" => Self::EventListener {
                key: drain_string!("key"),
                event_listener_id: drain_usize!("event listener id"),
            },
            "storage set" => Self::StorageSet {
                key: drain_string!("key"),
                value: drain_opt_string!("value"),
            },
            "storage read result" => Self::StorageReadResult {
                key: drain_string!("key"),
                value: drain_opt_string!("value"),
            },
            "delete storage" => Self::DeleteStorage {
                key: drain_string!("key"),
            },
            "read storage call" => Self::ReadStorageCall {
                key: drain_string!("key"),
            },
            "clear storage" => Self::ClearStorage {
                key: drain_opt_string!("key"),
            },
            "storage bucket" => Self::StorageBucket {},
            "execute from attribute" => Self::ExecuteFromAttribute {
                attr_name: drain_string!("attr name"),
            },
            "execute" => Self::Execute {},
            "set attribute" => Self::SetAttribute {
                key: drain_string!("key"),
                value: drain_opt_string!("value"),
                is_style: drain_bool!("is style"),
            },
            "delete attribute" => Self::DeleteAttribute {
                key: drain_string!("key"),
                is_style: drain_bool!("is style"),
            },
            _ => Self::Unknown {
                type_name: type_str.to_string(),
            },
        })
    }
}
