//! The introspection AST.
//!
//! Built by [`crate::parser`] and never mutated afterwards. Every element
//! remembers where it was declared so diagnostics and change reports can
//! point back into the XML.

use crate::signature::{SignatureError, TypeSignature};
use serde::{Serialize, Serializer};
use std::fmt;

// ── Shared pieces ────────────────────────────────────────────────────

/// 1-based line and column of an element's start tag.
///
/// Manually constructed elements use `Location::default()`, i.e. `0:0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
    pub location: Location,
}

/// Annotations keyed by name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    /// Insert an annotation. A repeated name replaces the earlier value in
    /// place and returns the replaced annotation.
    pub fn insert(&mut self, annotation: Annotation) -> Option<Annotation> {
        match self.0.iter_mut().find(|a| a.name == annotation.name) {
            Some(existing) => Some(std::mem::replace(existing, annotation)),
            None => {
                self.0.push(annotation);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.0.iter().find(|a| a.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where a piece of documentation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocSource {
    /// An `org.gtk.GDBus.DocString` annotation.
    Annotation,
    /// A `tp:docstring` or `doc:doc` child element.
    Element,
    /// An XML comment directly before the element.
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Documentation {
    pub text: String,
    pub source: DocSource,
    pub location: Location,
}

/// A type attribute as written, plus the result of parsing it.
///
/// Invalid types keep their text so the owning element can stay in the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    pub text: String,
    pub parsed: Result<TypeSignature, SignatureError>,
}

impl DeclaredType {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let parsed = TypeSignature::parse(&text);
        Self { text, parsed }
    }

    pub fn signature(&self) -> Option<&TypeSignature> {
        self.parsed.as_ref().ok()
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_ok()
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for DeclaredType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<String>,
        }
        Repr {
            text: &self.text,
            error: self.parsed.as_ref().err().map(|e| e.to_string()),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
    #[serde(rename = "readwrite")]
    ReadWrite,
}

impl Access {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Access::Read),
            "write" => Some(Access::Write),
            "readwrite" => Some(Access::ReadWrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::ReadWrite => "readwrite",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Elements ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: DeclaredType,
    /// Always set for method arguments; always `None` for signal arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Documentation>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableKind {
    Method,
    Signal,
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableKind::Method => write!(f, "method"),
            CallableKind::Signal => write!(f, "signal"),
        }
    }
}

/// A method or a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Callable {
    pub kind: CallableKind,
    pub name: String,
    pub args: Vec<Argument>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Documentation>,
    pub location: Location,
}

impl Callable {
    pub fn new(kind: CallableKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            args: Vec::new(),
            annotations: Annotations::default(),
            doc: None,
            location: Location::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DeclaredType,
    pub access: Access,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Documentation>,
    pub location: Location,
}

/// A member of an interface, borrowed from it.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Method(&'a Callable),
    Signal(&'a Callable),
    Property(&'a Property),
}

impl Member<'_> {
    pub fn name(&self) -> &str {
        match self {
            Member::Method(c) | Member::Signal(c) => &c.name,
            Member::Property(p) => &p.name,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            Member::Method(c) | Member::Signal(c) => c.location,
            Member::Property(p) => p.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    pub methods: Vec<Callable>,
    pub signals: Vec<Callable>,
    pub properties: Vec<Property>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Documentation>,
    pub location: Location,
}

impl Interface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            methods: Vec::new(),
            signals: Vec::new(),
            properties: Vec::new(),
            annotations: Annotations::default(),
            doc: None,
            location: Location::default(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&Callable> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn signal(&self, name: &str) -> Option<&Callable> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Methods, signals and properties merged in document order.
    ///
    /// Members of manually built interfaces all sit at `0:0`; the stable sort
    /// then leaves them as methods, signals, properties.
    pub fn members(&self) -> Vec<Member<'_>> {
        let mut members: Vec<Member<'_>> = self
            .methods
            .iter()
            .map(Member::Method)
            .chain(self.signals.iter().map(Member::Signal))
            .chain(self.properties.iter().map(Member::Property))
            .collect();
        members.sort_by_key(Member::location);
        members
    }
}

/// An object in the introspected tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Absolute path for the root (optional), relative path for children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub interfaces: Vec<Interface>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Documentation>,
    pub location: Location,
}

impl Node {
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: u32) -> Location {
        Location { line, column: 1 }
    }

    fn property(name: &str, ty: &str, access: Access) -> Property {
        Property {
            name: name.into(),
            ty: DeclaredType::new(ty),
            access,
            annotations: Annotations::default(),
            doc: None,
            location: Location::default(),
        }
    }

    #[test]
    fn test_annotations_last_wins_in_place() {
        let mut annotations = Annotations::default();
        for (name, value) in [("a", "1"), ("b", "2"), ("a", "3")] {
            annotations.insert(Annotation {
                name: name.into(),
                value: value.into(),
                location: Location::default(),
            });
        }
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations.value("a"), Some("3"));
        let names: Vec<&str> = annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_declared_type_keeps_invalid_text() {
        let ty = DeclaredType::new("a?");
        assert!(!ty.is_valid());
        assert_eq!(ty.to_string(), "a?");
        assert!(DeclaredType::new("a{sv}").signature().is_some());
    }

    #[test]
    fn test_members_in_document_order() {
        let mut iface = Interface::new("org.example.Foo");
        let mut m = Callable::new(CallableKind::Method, "M");
        m.location = at(5);
        let mut s = Callable::new(CallableKind::Signal, "S");
        s.location = at(3);
        let mut p = property("P", "s", Access::Read);
        p.location = at(4);
        iface.methods.push(m);
        iface.signals.push(s);
        iface.properties.push(p);

        let members = iface.members();
        let names: Vec<&str> = members.iter().map(Member::name).collect();
        assert_eq!(names, vec!["S", "P", "M"]);
    }

    #[test]
    fn test_access_from_attr() {
        assert_eq!(Access::from_attr("readwrite"), Some(Access::ReadWrite));
        assert_eq!(Access::from_attr("rw"), None);
    }

    #[test]
    fn test_serialize_property() {
        let p = property("Name", "s", Access::ReadWrite);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"]["text"], "s");
        assert_eq!(json["access"], "readwrite");
        assert!(json.get("annotations").is_none());
    }
}
