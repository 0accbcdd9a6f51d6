//! Introspection XML parser.
//!
//! Walks a `roxmltree` document top-down and builds the [`Node`] tree,
//! validating names, types and structure along the way. Problems that leave
//! the element usable are recorded as [`Diagnostic`]s and the element is
//! kept; problems that make the tree untrustworthy are recorded as
//! [`Severity::Fatal`](crate::Severity::Fatal) and turn the whole parse into
//! [`ParseError::Structural`] once the document has been walked completely.

use crate::ast::{
    Access, Annotation, Annotations, Argument, Callable, CallableKind, DeclaredType, Direction,
    DocSource, Documentation, Interface, Location, Node, Property,
};
use crate::log::{Diagnostic, DiagnosticLog, IssueCode};
use crate::names;

/// Telepathy extensions namespace (`tp:spec`, `tp:docstring`).
pub const TP_NAMESPACE: &str = "http://telepathy.freedesktop.org/wiki/DbusSpec#extensions-v0";
/// freedesktop.org documentation namespace (`doc:doc`).
pub const DOC_NAMESPACE: &str = "http://www.freedesktop.org/dbus/1.0/doc.dtd";

/// Annotation carrying documentation, preferred over every other source.
pub const DOCSTRING_ANNOTATION: &str = "org.gtk.GDBus.DocString";

/// Element nesting allowed by [`Parser::parse`] unless configured otherwise.
pub const DEFAULT_MAX_NESTING: usize = 128;

/// Reserved namespace for standard annotations.
const STANDARD_ANNOTATION_PREFIX: &str = "org.freedesktop.DBus.";

const STANDARD_ANNOTATIONS: &[&str] = &[
    "org.freedesktop.DBus.Deprecated",
    "org.freedesktop.DBus.GLib.CSymbol",
    "org.freedesktop.DBus.GLib.Async",
    "org.freedesktop.DBus.GLib.Const",
    "org.freedesktop.DBus.GLib.ClientCSymbol",
    "org.freedesktop.DBus.GLib.NoReply",
    "org.freedesktop.DBus.GLib.ReturnVal",
    "org.freedesktop.DBus.Method.NoReply",
    "org.freedesktop.DBus.Property.EmitsChangedSignal",
];

/// Input that could not be turned into an AST.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Not well-formed XML, or not UTF-8.
    #[error("Malformed XML at {location}: {message}")]
    MalformedInput { location: Location, message: String },

    /// Elements nested deeper than the parser allows.
    #[error("Element nesting at {location} exceeds the limit of {limit} levels")]
    TooDeep { location: Location, limit: usize },

    /// Well-formed XML whose structure is too broken to trust.
    #[error("Invalid introspection data ({} fatal problem(s))", fatal_count(.diagnostics))]
    Structural { diagnostics: Vec<Diagnostic> },
}

fn fatal_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_fatal()).count()
}

/// A successfully parsed document.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub root: Node,
    /// Non-fatal problems, in document order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct Parser {
    filename: Option<String>,
    max_nesting: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            filename: None,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject documents whose elements nest deeper than `max_nesting`.
    ///
    /// Both tree building and comparison recurse once per level.
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Name reported in every diagnostic, usually the file's basename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<Parsed, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ParseError::MalformedInput {
            location: location_after(&bytes[..e.valid_up_to()]),
            message: format!("invalid UTF-8: {}", e),
        })?;
        self.parse_str(text)
    }

    pub fn parse_str(&self, text: &str) -> Result<Parsed, ParseError> {
        if let Some(offset) = too_deep_at(text, self.max_nesting) {
            return Err(ParseError::TooDeep {
                location: location_after(&text.as_bytes()[..offset]),
                limit: self.max_nesting,
            });
        }
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options).map_err(|e| {
            let pos = e.pos();
            ParseError::MalformedInput {
                location: Location {
                    line: pos.row,
                    column: pos.col,
                },
                message: e.to_string(),
            }
        })?;

        // Entity expansion can nest deeper than the source text shows.
        let limit = self.max_nesting;
        let too_deep = |n: &XmlNode<'_, '_>| {
            n.is_element() && n.ancestors().skip(1).take(limit + 1).count() > limit
        };
        if let Some(elem) = doc.descendants().find(too_deep) {
            let pos = doc.text_pos_at(elem.range().start);
            return Err(ParseError::TooDeep {
                location: Location {
                    line: pos.row,
                    column: pos.col,
                },
                limit,
            });
        }

        let mut builder = Builder {
            doc: &doc,
            log: DiagnosticLog::new(self.filename.clone()),
        };
        let root = builder.root();

        if builder.log.has_fatal() {
            return Err(ParseError::Structural {
                diagnostics: builder.log.into_entries(),
            });
        }
        match root {
            Some(root) => Ok(Parsed {
                root,
                diagnostics: builder.log.into_entries(),
            }),
            None => Err(ParseError::Structural {
                diagnostics: builder.log.into_entries(),
            }),
        }
    }
}

/// Parse introspection XML bytes with the default configuration.
pub fn parse(bytes: &[u8]) -> Result<Parsed, ParseError> {
    Parser::new().parse(bytes)
}

/// Parse introspection XML text with the default configuration.
pub fn parse_str(text: &str) -> Result<Parsed, ParseError> {
    Parser::new().parse_str(text)
}

// ── Nesting pre-scan ────────────────────────────────────────────────

/// Position just past `prefix`, counted in lines and bytes.
fn location_after(prefix: &[u8]) -> Location {
    let line = prefix.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = prefix.iter().rev().take_while(|&&b| b != b'\n').count() + 1;
    Location {
        line: line as u32,
        column: column as u32,
    }
}

/// Length of the markup starting at `markup[0] == '<'`, up to and including
/// its closing `>`. Quoted values and a DOCTYPE internal subset are skipped.
fn markup_len(markup: &str) -> Option<usize> {
    let mut quote = None;
    let mut subset = 0usize;
    for (i, b) in markup.bytes().enumerate() {
        match (quote, b) {
            (Some(q), _) => {
                if b == q {
                    quote = None;
                }
            }
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'[') => subset += 1,
            (None, b']') => subset = subset.saturating_sub(1),
            (None, b'>') if subset == 0 => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Byte offset of the first start tag nested deeper than `limit`.
///
/// Counts tags only and never recurses. Malformed markup ends the scan and
/// is left for the XML parser to report.
fn too_deep_at(text: &str, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        let rest = &text[start..];
        let len = if rest.starts_with("<!--") {
            rest.find("-->").map(|i| i + 3)
        } else if rest.starts_with("<![CDATA[") {
            rest.find("]]>").map(|i| i + 3)
        } else if rest.starts_with("<?") {
            rest.find("?>").map(|i| i + 2)
        } else {
            let len = markup_len(rest)?;
            if rest.starts_with("</") {
                depth = depth.saturating_sub(1);
            } else if !rest.starts_with("<!") && !rest[..len].ends_with("/>") {
                depth += 1;
                if depth > limit {
                    return Some(start);
                }
            }
            Some(len)
        };
        pos = start + len?;
    }
    None
}

// ── Tree building ────────────────────────────────────────────────────

type XmlNode<'a, 'input> = roxmltree::Node<'a, 'input>;

/// Child elements of one XML element that the caller still has to build.
struct Children<'a, 'input> {
    /// Accepted elements, each with the comment directly before it.
    elements: Vec<(XmlNode<'a, 'input>, Option<Documentation>)>,
    /// The last `tp:docstring` / `doc:doc` child.
    doc: Option<Documentation>,
}

struct Builder<'a, 'input> {
    doc: &'a roxmltree::Document<'input>,
    log: DiagnosticLog,
}

fn is_unqualified(elem: XmlNode<'_, '_>, name: &str) -> bool {
    elem.is_element() && elem.tag_name().namespace().is_none() && elem.tag_name().name() == name
}

fn is_doc_element(elem: XmlNode<'_, '_>) -> bool {
    let tag = elem.tag_name();
    matches!(
        (tag.namespace(), tag.name()),
        (Some(TP_NAMESPACE), "docstring") | (Some(DOC_NAMESPACE), "doc")
    )
}

/// `prefix:name` as written, or the local name when unqualified.
fn display_tag(elem: XmlNode<'_, '_>) -> String {
    let tag = elem.tag_name();
    match tag.namespace().and_then(|ns| elem.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, tag.name()),
        _ => tag.name().to_string(),
    }
}

/// Whitespace-only text, which never separates a comment from its element.
fn is_blank(node: XmlNode<'_, '_>) -> bool {
    node.is_text() && node.text().is_none_or(|t| t.trim().is_empty())
}

fn element_text(elem: XmlNode<'_, '_>) -> String {
    elem.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

impl<'a, 'input> Builder<'a, 'input> {
    fn location(&self, node: XmlNode<'a, 'input>) -> Location {
        let pos = self.doc.text_pos_at(node.range().start);
        Location {
            line: pos.row,
            column: pos.col,
        }
    }

    fn comment_doc(&self, node: XmlNode<'a, 'input>) -> Documentation {
        Documentation {
            text: node.text().unwrap_or_default().to_string(),
            source: DocSource::Comment,
            location: self.location(node),
        }
    }

    /// The comment directly preceding `elem`, if nothing but whitespace
    /// separates them.
    fn preceding_comment(&self, elem: XmlNode<'a, 'input>) -> Option<Documentation> {
        let mut sibling = elem.prev_sibling();
        while let Some(node) = sibling {
            if node.is_comment() {
                return Some(self.comment_doc(node));
            }
            if !is_blank(node) {
                return None;
            }
            sibling = node.prev_sibling();
        }
        None
    }

    fn root(&mut self) -> Option<Node> {
        let mut root = self.doc.root_element();
        let tag = root.tag_name();
        let is_tp_spec = tag.namespace() == Some(TP_NAMESPACE) && tag.name() == "spec";

        if !is_unqualified(root, "node") {
            if !is_tp_spec {
                let loc = self.location(root);
                self.log.error(
                    IssueCode::UnknownNode,
                    loc,
                    format!("Unknown root node ‘{}’.", display_tag(root)),
                );
            }
            match root.descendants().find(|n| is_unqualified(*n, "node")) {
                Some(node) => root = node,
                None => {
                    let loc = self.location(root);
                    self.log.fatal(
                        IssueCode::EmptyRoot,
                        loc,
                        "No root node found in the document.",
                    );
                    return None;
                }
            }
        }

        let comment = self.preceding_comment(root);
        let node = self.node(root, None, comment);
        if let Some(name) = &node.name
            && !names::is_valid_absolute_path(name)
        {
            self.log.error(
                IssueCode::NodeName,
                node.location,
                format!("Root node name is not an absolute object path ‘{}’.", name),
            );
        }
        Some(node)
    }

    /// Sort the children of `elem` into elements to build, documentation and
    /// diagnostics.
    ///
    /// `context` names the parent in diagnostics, e.g. `interface ‘I.I’`.
    fn children(
        &mut self,
        elem: XmlNode<'a, 'input>,
        accepted: &[&str],
        context: &str,
    ) -> Children<'a, 'input> {
        let mut out = Children {
            elements: Vec::new(),
            doc: None,
        };
        let mut comment = None;

        for child in elem.children() {
            if child.is_comment() {
                comment = Some(self.comment_doc(child));
                continue;
            }
            if !child.is_element() {
                if !is_blank(child) {
                    comment = None;
                }
                continue;
            }

            let pending = comment.take();
            if is_doc_element(child) {
                let text = element_text(child);
                let loc = self.location(child);
                if text.trim().is_empty() {
                    self.log.warning(
                        IssueCode::EmptyDocumentation,
                        loc,
                        format!("Empty documentation element in {}.", context),
                    );
                } else {
                    out.doc = Some(Documentation {
                        text,
                        source: DocSource::Element,
                        location: loc,
                    });
                }
            } else if child.tag_name().namespace().is_some() {
                // Extension elements from other vocabularies.
            } else if accepted.contains(&child.tag_name().name()) {
                out.elements.push((child, pending));
            } else {
                let loc = self.location(child);
                self.log.error(
                    IssueCode::UnknownNode,
                    loc,
                    format!("Unknown node ‘{}’ in {}.", child.tag_name().name(), context),
                );
            }
        }
        out
    }

    fn required_attr(
        &mut self,
        elem: XmlNode<'a, 'input>,
        attr: &str,
    ) -> Option<&'a str> {
        let value = elem.attribute(attr);
        if value.is_none() {
            let loc = self.location(elem);
            self.log.fatal(
                IssueCode::MissingAttribute,
                loc,
                format!(
                    "Missing required attribute ‘{}’ in {}.",
                    attr,
                    elem.tag_name().name()
                ),
            );
        }
        value
    }

    fn annotation(&mut self, elem: XmlNode<'a, 'input>, annotations: &mut Annotations, owner: &str) {
        let location = self.location(elem);
        let name = self.required_attr(elem, "name");
        let context = match name {
            Some(name) => format!("annotation ‘{}’", name),
            None => "annotation".to_string(),
        };
        // Annotations have no children of their own; this only reports stray ones.
        self.children(elem, &[], &context);
        let Some(name) = name else {
            return;
        };

        let value = elem.attribute("value").unwrap_or_default();
        if name.starts_with(STANDARD_ANNOTATION_PREFIX) && !STANDARD_ANNOTATIONS.contains(&name) {
            self.log.warning(
                IssueCode::UnknownAnnotation,
                location,
                format!("Unknown standard annotation ‘{}’ on {}.", name, owner),
            );
        }
        if name == DOCSTRING_ANNOTATION && value.trim().is_empty() {
            self.log.warning(
                IssueCode::EmptyDocumentation,
                location,
                format!("Empty ‘{}’ annotation on {}.", DOCSTRING_ANNOTATION, owner),
            );
        }

        let replaced = annotations.insert(Annotation {
            name: name.to_string(),
            value: value.to_string(),
            location,
        });
        if replaced.is_some() {
            self.log.warning(
                IssueCode::DuplicateAnnotation,
                location,
                format!("Duplicate annotation definition ‘{}’ on {}.", name, owner),
            );
        }
    }

    fn node(
        &mut self,
        elem: XmlNode<'a, 'input>,
        parent_path: Option<&str>,
        comment: Option<Documentation>,
    ) -> Node {
        let name = elem.attribute("name").map(str::to_string);
        let context = match (&name, parent_path) {
            (None, None) => "root".to_string(),
            (Some(name), _) => format!("node ‘{}’", name),
            (None, Some(_)) => "node".to_string(),
        };
        let mut node = Node {
            name,
            location: self.location(elem),
            ..Default::default()
        };

        let children = self.children(elem, &["interface", "node", "annotation"], &context);
        for (child, child_comment) in children.elements {
            match child.tag_name().name() {
                "interface" => {
                    if let Some(iface) = self.interface(child, child_comment) {
                        if node.interface(&iface.name).is_some() {
                            self.log.error(
                                IssueCode::DuplicateInterface,
                                iface.location,
                                format!("Duplicate interface definition ‘{}’.", iface.name),
                            );
                        } else {
                            node.interfaces.push(iface);
                        }
                    }
                }
                "node" => {
                    let loc = self.location(child);
                    let Some(child_name) = child.attribute("name") else {
                        self.log.error(
                            IssueCode::MissingAttribute,
                            loc,
                            "Missing required attribute ‘name’ in non-root node.",
                        );
                        continue;
                    };
                    if !names::is_valid_relative_path(child_name) {
                        self.log.error(
                            IssueCode::NodeName,
                            loc,
                            format!(
                                "Non-root node name is not a relative object path ‘{}’.",
                                child_name
                            ),
                        );
                    }
                    let path = match parent_path {
                        Some(parent) => format!("{}/{}", parent, child_name),
                        None => child_name.to_string(),
                    };
                    let child_node = self.node(child, Some(&path), child_comment);
                    if node.node(child_name).is_some() {
                        self.log.error(
                            IssueCode::DuplicateNode,
                            loc,
                            format!("Duplicate node definition ‘{}’.", path),
                        );
                    } else {
                        node.nodes.push(child_node);
                    }
                }
                _ => self.annotation(child, &mut node.annotations, &context),
            }
        }

        node.doc = resolve_doc(&node.annotations, children.doc, comment);
        node
    }

    fn interface(
        &mut self,
        elem: XmlNode<'a, 'input>,
        comment: Option<Documentation>,
    ) -> Option<Interface> {
        let name = self.required_attr(elem, "name")?;
        let mut iface = Interface::new(name);
        iface.location = self.location(elem);
        if !names::is_valid_interface_name(name) {
            self.log.error(
                IssueCode::InterfaceName,
                iface.location,
                format!("Invalid interface name ‘{}’.", name),
            );
        }

        let context = format!("interface ‘{}’", name);
        let children = self.children(elem, &["method", "signal", "property", "annotation"], &context);
        for (child, child_comment) in children.elements {
            match child.tag_name().name() {
                "method" => {
                    if let Some(method) = self.callable(child, CallableKind::Method, name, child_comment) {
                        if iface.method(&method.name).is_some() {
                            self.log.error(
                                IssueCode::DuplicateMethod,
                                method.location,
                                format!("Duplicate method definition ‘{}.{}’.", name, method.name),
                            );
                        } else {
                            iface.methods.push(method);
                        }
                    }
                }
                "signal" => {
                    if let Some(signal) = self.callable(child, CallableKind::Signal, name, child_comment) {
                        if iface.signal(&signal.name).is_some() {
                            self.log.error(
                                IssueCode::DuplicateSignal,
                                signal.location,
                                format!("Duplicate signal definition ‘{}.{}’.", name, signal.name),
                            );
                        } else {
                            iface.signals.push(signal);
                        }
                    }
                }
                "property" => {
                    if let Some(property) = self.property(child, name, child_comment) {
                        if iface.property(&property.name).is_some() {
                            self.log.error(
                                IssueCode::DuplicateProperty,
                                property.location,
                                format!(
                                    "Duplicate property definition ‘{}.{}’.",
                                    name, property.name
                                ),
                            );
                        } else {
                            iface.properties.push(property);
                        }
                    }
                }
                _ => self.annotation(child, &mut iface.annotations, &context),
            }
        }

        iface.doc = resolve_doc(&iface.annotations, children.doc, comment);
        Some(iface)
    }

    fn callable(
        &mut self,
        elem: XmlNode<'a, 'input>,
        kind: CallableKind,
        iface: &str,
        comment: Option<Documentation>,
    ) -> Option<Callable> {
        let name = self.required_attr(elem, "name")?;
        let mut callable = Callable::new(kind, name);
        callable.location = self.location(elem);
        if !names::is_valid_member_name(name) {
            let code = match kind {
                CallableKind::Method => IssueCode::MethodName,
                CallableKind::Signal => IssueCode::SignalName,
            };
            self.log.error(
                code,
                callable.location,
                format!("Invalid {} name ‘{}’.", kind, name),
            );
        }

        let context = format!("{} ‘{}.{}’", kind, iface, name);
        let children = self.children(elem, &["arg", "annotation"], &context);
        for (child, child_comment) in children.elements {
            if child.tag_name().name() == "arg" {
                let index = callable.args.len();
                if let Some(arg) = self.argument(child, kind, &context, index, child_comment) {
                    callable.args.push(arg);
                }
            } else {
                self.annotation(child, &mut callable.annotations, &context);
            }
        }

        callable.doc = resolve_doc(&callable.annotations, children.doc, comment);
        Some(callable)
    }

    fn argument(
        &mut self,
        elem: XmlNode<'a, 'input>,
        kind: CallableKind,
        owner: &str,
        index: usize,
        comment: Option<Documentation>,
    ) -> Option<Argument> {
        let location = self.location(elem);
        let name = elem.attribute("name");
        let label = match name {
            Some(name) => format!("‘{}’", name),
            None => format!("{}", index),
        };
        let ty = self.required_attr(elem, "type");

        let direction = match (kind, elem.attribute("direction")) {
            (CallableKind::Method, None) => Some(Direction::In),
            (CallableKind::Method, Some(value)) => {
                Some(Direction::from_attr(value).unwrap_or_else(|| {
                    self.log.error(
                        IssueCode::ArgumentDirection,
                        location,
                        format!(
                            "Invalid direction ‘{}’ for argument {} of {}.",
                            value, label, owner
                        ),
                    );
                    Direction::In
                }))
            }
            (CallableKind::Signal, None | Some("out")) => None,
            (CallableKind::Signal, Some("in")) => {
                self.log.warning(
                    IssueCode::SignalArgumentDirection,
                    location,
                    format!(
                        "Direction ‘in’ is meaningless for argument {} of {}.",
                        label, owner
                    ),
                );
                None
            }
            (CallableKind::Signal, Some(value)) => {
                self.log.error(
                    IssueCode::ArgumentDirection,
                    location,
                    format!(
                        "Invalid direction ‘{}’ for argument {} of {}.",
                        value, label, owner
                    ),
                );
                None
            }
        };

        let context = format!("argument {} of {}", label, owner);
        let children = self.children(elem, &["annotation"], &context);
        let mut annotations = Annotations::default();
        for (child, _) in children.elements {
            self.annotation(child, &mut annotations, &context);
        }

        let ty = DeclaredType::new(ty?);
        if let Err(e) = &ty.parsed {
            self.log.error(
                IssueCode::ArgumentType,
                location,
                format!(
                    "Error when parsing type ‘{}’ for argument {}: {}",
                    ty.text, label, e
                ),
            );
        }

        let doc = resolve_doc(&annotations, children.doc, comment);
        Some(Argument {
            name: name.map(str::to_string),
            ty,
            direction,
            annotations,
            doc,
            location,
        })
    }

    fn property(
        &mut self,
        elem: XmlNode<'a, 'input>,
        iface: &str,
        comment: Option<Documentation>,
    ) -> Option<Property> {
        let location = self.location(elem);
        let name = self.required_attr(elem, "name");
        let ty = self.required_attr(elem, "type");
        let access = self.required_attr(elem, "access");
        let name = name?;

        if !names::is_valid_member_name(name) {
            self.log.error(
                IssueCode::PropertyName,
                location,
                format!("Invalid property name ‘{}’.", name),
            );
        }
        let access = access.and_then(|value| {
            let parsed = Access::from_attr(value);
            if parsed.is_none() {
                self.log.fatal(
                    IssueCode::PropertyAccess,
                    location,
                    format!(
                        "Invalid access type ‘{}’ for property ‘{}.{}’.",
                        value, iface, name
                    ),
                );
            }
            parsed
        });

        let context = format!("property ‘{}.{}’", iface, name);
        let children = self.children(elem, &["annotation"], &context);
        let mut annotations = Annotations::default();
        for (child, _) in children.elements {
            self.annotation(child, &mut annotations, &context);
        }

        let ty = DeclaredType::new(ty?);
        if let Err(e) = &ty.parsed {
            self.log.error(
                IssueCode::PropertyType,
                location,
                format!(
                    "Error when parsing type ‘{}’ for property ‘{}’: {}",
                    ty.text, name, e
                ),
            );
        }

        let doc = resolve_doc(&annotations, children.doc, comment);
        Some(Property {
            name: name.to_string(),
            ty,
            access: access?,
            annotations,
            doc,
            location,
        })
    }
}

/// DocString annotation, then doc element, then preceding comment.
fn resolve_doc(
    annotations: &Annotations,
    element: Option<Documentation>,
    comment: Option<Documentation>,
) -> Option<Documentation> {
    let from_annotation = annotations
        .get(DOCSTRING_ANNOTATION)
        .filter(|a| !a.value.trim().is_empty())
        .map(|a| Documentation {
            text: a.value.clone(),
            source: DocSource::Annotation,
            location: a.location,
        });
    from_annotation.or(element).or(comment)
}
