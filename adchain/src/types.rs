use crate::graph::FrameId;

/// DomNodeId represents the int identifier that Blink uses internally for
/// each DOM node created during the execution of a Web page. This set of
/// values is shared across HTML elements (e.g., `<a>`, `<img>`), text nodes,
/// white space nodes, and document roots, and is distinct from the graph's
/// own [`NodeId`](crate::graph::NodeId) space. Actions that reference other
/// DOM nodes by id (e.g. [`InsertNode`](EdgeType::InsertNode)'s `parent`)
/// use these values.
pub type DomNodeId = usize;

/// Represents the type of any node in a page graph, along with any
/// associated type-specific data. Nodes (mostly) represent either Actors
/// (things that do things) or Actees (things that have things done to them).
///
/// For example, if JavaScript code creates an HTML element and injects it
/// into a document, that is recorded with three nodes:
///
/// 1. a node representing the JavaScript code unit,
/// 2. a node representing the HTML element that was created, and
/// 3. a third node representing the existing HTML element the just created
///    HTML element is inserted below in the DOM.
#[derive(Clone, PartialEq, Debug, serde::Serialize)]
pub enum NodeType {
    /// Resource nodes record URLs that are requested from the network. Each
    /// URL requested is represented with its own Resource node. Each request
    /// is denoted with a [`RequestStart`](EdgeType::RequestStart) edge, and
    /// each response with either a [`RequestComplete`](EdgeType::RequestComplete)
    /// or [`RequestError`](EdgeType::RequestError) edge.
    ///
    /// These are the nodes an image attribution query resolves against.
    Resource {
        /// The URL represented by this node, as recorded (possibly still
        /// entity- or percent-escaped).
        url: String,
    },
    /// HtmlElement nodes represent the elements that make up the structure
    /// of a Web page: `<a>`, `<img>`, `<div>`, etc. One exists for each HTML
    /// element alive at any point during the lifetime of the page, even
    /// those never inserted into the DOM.
    HtmlElement {
        tag_name: String,
        /// Whether the node had been garbage collected by the time the
        /// graph was serialized.
        is_deleted: bool,
        node_id: DomNodeId,
    },
    TextNode {
        text: Option<String>,
        is_deleted: bool,
        node_id: DomNodeId,
    },
    DomRoot {
        url: Option<String>,
        tag_name: String,
        is_deleted: bool,
        node_id: DomNodeId,
    },
    FrameOwner {
        tag_name: String,
        is_deleted: bool,
        node_id: DomNodeId,
    },
    /// RemoteFrame nodes stand in for a frame rendered out of process. The
    /// recording for the frame's own contents, if any, lives in a separate
    /// graph; within this graph the node carries the frame token and the URL
    /// the frame was navigated to.
    ///
    /// These are the nodes an iframe attribution query resolves against.
    RemoteFrame {
        frame_id: FrameId,
        url: Option<String>,
    },
    /// A JavaScript code unit. External scripts additionally record the URL
    /// they were fetched from; inline scripts record none, and their chain
    /// contribution is attributed through their creating element instead.
    Script {
        url: Option<String>,
        script_type: ScriptType,
        script_id: usize,
    },
    Parser {},
    Extensions {},
    LocalStorage {},
    SessionStorage {},
    CookieJar {},
    Storage {},
    /// Node kinds the attribution traversals never read. Kept so a graph
    /// containing them still decodes as a whole.
    Unknown {
        type_name: String,
    },
}

impl NodeType {
    /// The URL recorded directly on this node, for the node kinds that
    /// carry one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Resource { url } => Some(url),
            Self::DomRoot { url, .. } => url.as_deref(),
            Self::RemoteFrame { url, .. } => url.as_deref(),
            Self::Script { url, .. } => url.as_deref(),
            _ => None,
        }
    }

    /// The Blink DOM node id, for the node kinds that represent DOM nodes.
    pub fn dom_node_id(&self) -> Option<DomNodeId> {
        match self {
            Self::HtmlElement { node_id, .. }
            | Self::TextNode { node_id, .. }
            | Self::DomRoot { node_id, .. }
            | Self::FrameOwner { node_id, .. } => Some(*node_id),
            _ => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script { .. })
    }
}

/// How a script's source text reached the page.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub enum ScriptType {
    /// Fetched from a URL via a `src` attribute or an import; the only kind
    /// that projects into an attribution chain.
    ExternalFile,
    Inline,
    InlineInsideDocumentWrite,
    InlineInsideGeneratedElement,
    Module,
    Unknown,
}

impl From<&str> for ScriptType {
    fn from(v: &str) -> Self {
        match v {
            "external file" => Self::ExternalFile,
            "inline" => Self::Inline,
            "inline inside document write" => Self::InlineInsideDocumentWrite,
            "inline inside generated element" => Self::InlineInsideGeneratedElement,
            "module" => Self::Module,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, PartialEq, Debug, serde::Serialize)]
pub enum RequestType {
    Image,
    Script,
    CSS,
    AJAX,
    Unknown,
}

impl From<&str> for RequestType {
    fn from(v: &str) -> Self {
        match v {
            "Image" => Self::Image,
            "Script" => Self::Script,
            "CSS" => Self::CSS,
            "AJAX" => Self::AJAX,
            _ => Self::Unknown,
        }
    }
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Script => "script",
            Self::CSS => "stylesheet",
            Self::AJAX => "xhr",
            Self::Unknown => "unknown",
        }
    }
}

/// The two resource kinds an attribution query can name.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Iframe,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Iframe => "iframe",
        }
    }
}

/// Represents the type of any page graph edge, along with any associated
/// type-specific data. Edge direction records causality: the source acted
/// on the target.
#[derive(Clone, PartialEq, Debug, serde::Serialize)]
pub enum EdgeType {
    Structure {},
    /// Connects a frame-owning element or remote frame placeholder to the
    /// document context it hosts. Walking one of these backward from a
    /// remote frame node finds the element that brought the frame in.
    CrossDom {},
    TextChange {},
    RemoveNode {},
    DeleteNode {},
    /// Records a DOM node being inserted below a parent. `parent` and
    /// `before` are Blink DOM node ids, not graph node ids.
    InsertNode {
        parent: DomNodeId,
        before: Option<DomNodeId>,
    },
    /// Records a DOM node or script being brought into existence by the
    /// source actor. Together with [`Execute`](EdgeType::Execute), these are
    /// the creation-provenance edges the chain builder walks.
    CreateNode {},
    JsResult {
        value: Option<String>,
    },
    JsCall {
        args: Option<String>,
        script_position: Option<usize>,
    },
    RequestComplete {
        resource_type: String,
        status: String,
        value: Option<String>,
        response_hash: Option<String>,
        request_id: usize,
        headers: String,
        size: String,
    },
    RequestError {
        status: String,
        request_id: usize,
        value: Option<String>,
        headers: String,
        size: String,
    },
    RequestStart {
        request_type: RequestType,
        status: String,
        request_id: usize,
    },
    AddEventListener {
        key: String,
        event_listener_id: usize,
        script_id: usize,
    },
    RemoveEventListener {
        key: String,
        event_listener_id: usize,
        script_id: usize,
    },
    EventListener {
        key: String,
        event_listener_id: usize,
    },
    StorageSet {
        key: String,
        value: Option<String>,
    },
    StorageReadResult {
        key: String,
        value: Option<String>,
    },
    DeleteStorage {
        key: String,
    },
    ReadStorageCall {
        key: String,
    },
    ClearStorage {
        key: Option<String>,
    },
    StorageBucket {},
    ExecuteFromAttribute {
        attr_name: String,
    },
    Execute {},
    SetAttribute {
        key: String,
        value: Option<String>,
        is_style: bool,
    },
    DeleteAttribute {
        key: String,
        is_style: bool,
    },
    /// Edge kinds the attribution traversals never read.
    Unknown {
        type_name: String,
    },
}

impl EdgeType {
    /// The URL-like `value` attribute, for the edge kinds that carry one.
    /// An edge without it is simply not a candidate for value-based lookup.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::JsResult { value }
            | Self::RequestComplete { value, .. }
            | Self::RequestError { value, .. }
            | Self::StorageSet { value, .. }
            | Self::StorageReadResult { value, .. }
            | Self::SetAttribute { value, .. } => value.as_deref(),
            _ => None,
        }
    }
}
