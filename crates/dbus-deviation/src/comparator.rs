//! Structural diff of two introspection ASTs.
//!
//! Nodes, interfaces, members and properties are aligned by name; arguments
//! by position. A rename is therefore always a removal plus an addition.
//!
//! The result is ordered in two passes: first every addition and
//! modification found while walking the new tree in document order (an
//! element's own changes before its children's), then every removal found
//! while walking the old tree in document order.

use dbus_api::{
    Access, Annotations, Argument, Callable, CallableKind, Direction, Documentation, Interface,
    Location, Member, Node, Property,
};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const DEPRECATED_ANNOTATION: &str = "org.freedesktop.DBus.Deprecated";
pub const C_SYMBOL_ANNOTATION: &str = "org.freedesktop.DBus.GLib.CSymbol";
pub const NO_REPLY_ANNOTATION: &str = "org.freedesktop.DBus.Method.NoReply";
pub const EMITS_CHANGED_ANNOTATION: &str = "org.freedesktop.DBus.Property.EmitsChangedSignal";
pub const DOCSTRING_ANNOTATION: &str = dbus_api::parser::DOCSTRING_ANNOTATION;

/// `EmitsChangedSignal` values a property can end up with.
const EMITS_CHANGED_VALUES: &[&str] = &["true", "invalidates", "const", "false"];

// ── Change model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Modified => write!(f, "modified"),
        }
    }
}

/// Who a change can break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Breaks nobody.
    Info,
    /// Code written against the new API may not work with the old one.
    ForwardsCompatibility,
    /// Code written against the old API may not work with the new one.
    BackwardsCompatibility,
}

impl Severity {
    pub const ALL: [Severity; 3] = [
        Severity::Info,
        Severity::ForwardsCompatibility,
        Severity::BackwardsCompatibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::ForwardsCompatibility => "forwards-compatibility",
            Severity::BackwardsCompatibility => "backwards-compatibility",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Stable identifier for each kind of change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeCode {
    NodeAdded,
    NodeRemoved,
    InterfaceAdded,
    InterfaceRemoved,
    MethodAdded,
    MethodRemoved,
    SignalAdded,
    SignalRemoved,
    PropertyAdded,
    PropertyRemoved,
    ArgumentAdded,
    ArgumentRemoved,
    ArgumentNameChanged,
    ArgumentTypeChanged,
    ArgumentDirectionChanged { old: Direction, new: Direction },
    PropertyTypeChanged,
    PropertyAccessChanged { old: Access, new: Access },
    Deprecated,
    Undeprecated,
    CSymbolChanged,
    ReplyAdded,
    ReplyRemoved,
    EmitsChangedSignalChanged { old: String, new: String },
    AnnotationAdded,
    AnnotationRemoved,
    AnnotationChanged,
    DocumentationChanged,
}

impl ChangeCode {
    /// Codes without parameters.
    const SIMPLE: &'static [(&'static str, ChangeCode)] = &[
        ("node-added", ChangeCode::NodeAdded),
        ("node-removed", ChangeCode::NodeRemoved),
        ("interface-added", ChangeCode::InterfaceAdded),
        ("interface-removed", ChangeCode::InterfaceRemoved),
        ("method-added", ChangeCode::MethodAdded),
        ("method-removed", ChangeCode::MethodRemoved),
        ("signal-added", ChangeCode::SignalAdded),
        ("signal-removed", ChangeCode::SignalRemoved),
        ("property-added", ChangeCode::PropertyAdded),
        ("property-removed", ChangeCode::PropertyRemoved),
        ("argument-added", ChangeCode::ArgumentAdded),
        ("argument-removed", ChangeCode::ArgumentRemoved),
        ("argument-name-changed", ChangeCode::ArgumentNameChanged),
        ("argument-type-changed", ChangeCode::ArgumentTypeChanged),
        ("property-type-changed", ChangeCode::PropertyTypeChanged),
        ("deprecated", ChangeCode::Deprecated),
        ("undeprecated", ChangeCode::Undeprecated),
        ("c-symbol-changed", ChangeCode::CSymbolChanged),
        ("reply-added", ChangeCode::ReplyAdded),
        ("reply-removed", ChangeCode::ReplyRemoved),
        ("annotation-added", ChangeCode::AnnotationAdded),
        ("annotation-removed", ChangeCode::AnnotationRemoved),
        ("annotation-changed", ChangeCode::AnnotationChanged),
        ("documentation-changed", ChangeCode::DocumentationChanged),
    ];

    /// Every code the comparator can emit, as strings.
    pub fn all() -> Vec<String> {
        let mut codes: Vec<String> = Self::SIMPLE.iter().map(|(s, _)| s.to_string()).collect();
        for (old, new) in pairs(&[Direction::In, Direction::Out]) {
            codes.push(ChangeCode::ArgumentDirectionChanged { old, new }.to_string());
        }
        for (old, new) in pairs(&[Access::Read, Access::Write, Access::ReadWrite]) {
            codes.push(ChangeCode::PropertyAccessChanged { old, new }.to_string());
        }
        for (old, new) in pairs(EMITS_CHANGED_VALUES) {
            codes.push(
                ChangeCode::EmitsChangedSignalChanged {
                    old: old.to_string(),
                    new: new.to_string(),
                }
                .to_string(),
            );
        }
        codes
    }

    /// False for parameterised codes whose old and new values coincide.
    fn is_transition(&self) -> bool {
        match self {
            ChangeCode::ArgumentDirectionChanged { old, new } => old != new,
            ChangeCode::PropertyAccessChanged { old, new } => old != new,
            ChangeCode::EmitsChangedSignalChanged { old, new } => old != new,
            _ => true,
        }
    }
}

/// Every ordered pair of distinct values.
fn pairs<T: Copy + PartialEq>(values: &[T]) -> Vec<(T, T)> {
    values
        .iter()
        .flat_map(|&a| values.iter().filter(move |&&b| b != a).map(move |&b| (a, b)))
        .collect()
}

impl fmt::Display for ChangeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCode::ArgumentDirectionChanged { old, new } => {
                write!(f, "argument-direction-changed-{}-{}", old, new)
            }
            ChangeCode::PropertyAccessChanged { old, new } => {
                write!(f, "property-access-changed-{}-{}", old, new)
            }
            ChangeCode::EmitsChangedSignalChanged { old, new } => {
                write!(f, "ecs-changed-{}-{}", old, new)
            }
            simple => {
                let name = ChangeCode::SIMPLE
                    .iter()
                    .find(|(_, code)| code == simple)
                    .map(|(s, _)| *s)
                    .unwrap_or_default();
                f.write_str(name)
            }
        }
    }
}

impl FromStr for ChangeCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, code)) = ChangeCode::SIMPLE.iter().find(|(name, _)| *name == s) {
            return Ok(code.clone());
        }
        let split = |rest: &str| -> Option<(String, String)> {
            let (old, new) = rest.split_once('-')?;
            Some((old.to_string(), new.to_string()))
        };
        let parsed = if let Some(rest) = s.strip_prefix("argument-direction-changed-") {
            split(rest).and_then(|(old, new)| {
                Some(ChangeCode::ArgumentDirectionChanged {
                    old: Direction::from_attr(&old)?,
                    new: Direction::from_attr(&new)?,
                })
            })
        } else if let Some(rest) = s.strip_prefix("property-access-changed-") {
            split(rest).and_then(|(old, new)| {
                Some(ChangeCode::PropertyAccessChanged {
                    old: Access::from_attr(&old)?,
                    new: Access::from_attr(&new)?,
                })
            })
        } else if let Some(rest) = s.strip_prefix("ecs-changed-") {
            split(rest).filter(|(old, new)| {
                EMITS_CHANGED_VALUES.contains(&old.as_str())
                    && EMITS_CHANGED_VALUES.contains(&new.as_str())
            })
            .map(|(old, new)| ChangeCode::EmitsChangedSignalChanged { old, new })
        } else {
            None
        };
        parsed
            .filter(ChangeCode::is_transition)
            .ok_or_else(|| format!("unknown change code: {}", s))
    }
}

impl Serialize for ChangeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One difference between the old and the new API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    #[serde(rename = "category")]
    pub severity: Severity,
    pub code: ChangeCode,
    /// `I.A.M.arg`, prefixed with `child/grandchild:` inside nested nodes.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    pub message: String,
    /// In the new document, or in the old one for removals.
    pub location: Location,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.severity, self.code, self.message)
    }
}

// ── Comparison ───────────────────────────────────────────────────────

/// Compare two ASTs. Neither side is modified.
///
/// Recurses once per node level; trees from [`dbus_api::Parser`] are bounded
/// by its nesting ceiling.
pub fn compare(old: &Node, new: &Node) -> Vec<Change> {
    let mut cmp = Comparator::default();
    cmp.node(old, new, None);
    cmp.node_removals(old, new, None);
    cmp.changes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Node,
    Interface,
    Method,
    Signal,
    Property,
    Argument,
}

impl ElementKind {
    fn noun(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Interface => "interface",
            ElementKind::Method => "method",
            ElementKind::Signal => "signal",
            ElementKind::Property => "property",
            ElementKind::Argument => "argument",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ElementKind::Node => "Node",
            ElementKind::Interface => "Interface",
            ElementKind::Method => "Method",
            ElementKind::Signal => "Signal",
            ElementKind::Property => "Property",
            ElementKind::Argument => "Argument",
        }
    }

    fn of_callable(kind: CallableKind) -> Self {
        match kind {
            CallableKind::Method => ElementKind::Method,
            CallableKind::Signal => ElementKind::Signal,
        }
    }
}

/// The element whose own attributes are being compared.
struct Subject<'p> {
    kind: ElementKind,
    path: &'p str,
    location: Location,
}

#[derive(Default)]
struct Comparator {
    changes: Vec<Change>,
}

fn node_prefix(scope: Option<&str>) -> String {
    scope.map(|s| format!("{}:", s)).unwrap_or_default()
}

fn child_scope(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(parent) => format!("{}/{}", parent, name),
        None => name.to_string(),
    }
}

fn arg_label(arg: &Argument, index: usize) -> String {
    arg.name.clone().unwrap_or_else(|| index.to_string())
}

fn doc_text(doc: &Option<Documentation>) -> Option<&str> {
    doc.as_ref().map(|d| d.text.as_str())
}

fn presence_kind(old: Option<&str>, new: Option<&str>) -> ChangeKind {
    match (old, new) {
        (None, Some(_)) => ChangeKind::Added,
        (Some(_), None) => ChangeKind::Removed,
        _ => ChangeKind::Modified,
    }
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("(none)")
}

/// The element's own `EmitsChangedSignal`, else the interface's, else `true`.
fn effective_emits_changed<'a>(iface: Option<&'a Annotations>, own: &'a Annotations) -> &'a str {
    own.value(EMITS_CHANGED_ANNOTATION)
        .or_else(|| iface.and_then(|a| a.value(EMITS_CHANGED_ANNOTATION)))
        .unwrap_or("true")
}

impl Comparator {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        kind: ChangeKind,
        severity: Severity,
        code: ChangeCode,
        path: &str,
        old: Option<&str>,
        new: Option<&str>,
        location: Location,
        message: String,
    ) {
        self.changes.push(Change {
            kind,
            severity,
            code,
            path: path.to_string(),
            old: old.map(str::to_string),
            new: new.map(str::to_string),
            message,
            location,
        });
    }

    fn added(&mut self, kind: ElementKind, severity: Severity, code: ChangeCode, path: &str, location: Location) {
        let message = format!("{} ‘{}’ has been added.", kind.title(), path);
        self.push(ChangeKind::Added, severity, code, path, None, Some(path), location, message);
    }

    fn removed(&mut self, kind: ElementKind, code: ChangeCode, path: &str, location: Location) {
        let message = format!("{} ‘{}’ has been removed.", kind.title(), path);
        self.push(
            ChangeKind::Removed,
            Severity::BackwardsCompatibility,
            code,
            path,
            Some(path),
            None,
            location,
            message,
        );
    }

    // ── pass 1: additions and modifications ──────────────────────────

    fn node(&mut self, old: &Node, new: &Node, scope: Option<&str>) {
        let path = scope.or(new.name.as_deref()).unwrap_or("/");
        let subject = Subject {
            kind: ElementKind::Node,
            path,
            location: new.location,
        };
        self.annotations(&old.annotations, &new.annotations, &subject);
        self.documentation(&old.doc, &new.doc, &subject);

        let prefix = node_prefix(scope);
        for iface in &new.interfaces {
            let iface_path = format!("{}{}", prefix, iface.name);
            match old.interface(&iface.name) {
                Some(old_iface) => self.interface(old_iface, iface, &iface_path),
                None => self.added(
                    ElementKind::Interface,
                    Severity::Info,
                    ChangeCode::InterfaceAdded,
                    &iface_path,
                    iface.location,
                ),
            }
        }

        for child in &new.nodes {
            let Some(name) = child.name.as_deref() else {
                continue;
            };
            let child_path = child_scope(scope, name);
            match old.node(name) {
                Some(old_child) => self.node(old_child, child, Some(&child_path)),
                None => self.added(
                    ElementKind::Node,
                    Severity::Info,
                    ChangeCode::NodeAdded,
                    &child_path,
                    child.location,
                ),
            }
        }
    }

    fn interface(&mut self, old: &Interface, new: &Interface, path: &str) {
        let subject = Subject {
            kind: ElementKind::Interface,
            path,
            location: new.location,
        };
        self.emits_changed(
            effective_emits_changed(None, &old.annotations),
            effective_emits_changed(None, &new.annotations),
            &subject,
        );
        self.annotations(&old.annotations, &new.annotations, &subject);
        self.documentation(&old.doc, &new.doc, &subject);

        for member in new.members() {
            let member_path = format!("{}.{}", path, member.name());
            match member {
                Member::Method(m) => match old.method(&m.name) {
                    Some(o) => self.callable(o, m, &member_path),
                    None => self.added(
                        ElementKind::Method,
                        Severity::Info,
                        ChangeCode::MethodAdded,
                        &member_path,
                        m.location,
                    ),
                },
                Member::Signal(s) => match old.signal(&s.name) {
                    Some(o) => self.callable(o, s, &member_path),
                    None => self.added(
                        ElementKind::Signal,
                        Severity::Info,
                        ChangeCode::SignalAdded,
                        &member_path,
                        s.location,
                    ),
                },
                Member::Property(p) => match old.property(&p.name) {
                    Some(o) => self.property(old, new, o, p, &member_path),
                    None => self.added(
                        ElementKind::Property,
                        Severity::Info,
                        ChangeCode::PropertyAdded,
                        &member_path,
                        p.location,
                    ),
                },
            }
        }
    }

    fn callable(&mut self, old: &Callable, new: &Callable, path: &str) {
        let subject = Subject {
            kind: ElementKind::of_callable(new.kind),
            path,
            location: new.location,
        };
        self.annotations(&old.annotations, &new.annotations, &subject);
        self.documentation(&old.doc, &new.doc, &subject);

        for (index, arg) in new.args.iter().enumerate() {
            let arg_path = format!("{}.{}", path, arg_label(arg, index));
            match old.args.get(index) {
                Some(old_arg) => self.argument(old_arg, arg, &arg_path),
                None => {
                    // Existing callers never send a new trailing `in` argument,
                    // but every caller unpacking a reply sees a new `out` one.
                    let severity = match (new.kind, arg.direction) {
                        (CallableKind::Method, Some(Direction::Out)) => {
                            Severity::BackwardsCompatibility
                        }
                        _ => Severity::ForwardsCompatibility,
                    };
                    let message = format!("Argument ‘{}’ has been added.", arg_path);
                    self.push(
                        ChangeKind::Added,
                        severity,
                        ChangeCode::ArgumentAdded,
                        &arg_path,
                        None,
                        Some(&arg.ty.text),
                        arg.location,
                        message,
                    );
                }
            }
        }
    }

    fn argument(&mut self, old: &Argument, new: &Argument, path: &str) {
        if old.name != new.name {
            let (o, n) = (old.name.as_deref(), new.name.as_deref());
            let message = format!(
                "Argument ‘{}’ has changed name from ‘{}’ to ‘{}’.",
                path,
                or_none(o),
                or_none(n)
            );
            self.push(
                ChangeKind::Modified,
                Severity::Info,
                ChangeCode::ArgumentNameChanged,
                path,
                o,
                n,
                new.location,
                message,
            );
        }

        if old.ty.text != new.ty.text {
            let message = format!(
                "Argument ‘{}’ has changed type from ‘{}’ to ‘{}’.",
                path, old.ty, new.ty
            );
            self.push(
                ChangeKind::Modified,
                Severity::BackwardsCompatibility,
                ChangeCode::ArgumentTypeChanged,
                path,
                Some(&old.ty.text),
                Some(&new.ty.text),
                new.location,
                message,
            );
        }

        if let (Some(o), Some(n)) = (old.direction, new.direction)
            && o != n
        {
            let message = format!(
                "Argument ‘{}’ has changed direction from ‘{}’ to ‘{}’.",
                path, o, n
            );
            self.push(
                ChangeKind::Modified,
                Severity::BackwardsCompatibility,
                ChangeCode::ArgumentDirectionChanged { old: o, new: n },
                path,
                Some(o.as_str()),
                Some(n.as_str()),
                new.location,
                message,
            );
        }

        let subject = Subject {
            kind: ElementKind::Argument,
            path,
            location: new.location,
        };
        self.annotations(&old.annotations, &new.annotations, &subject);
        self.documentation(&old.doc, &new.doc, &subject);
    }

    fn property(
        &mut self,
        old_iface: &Interface,
        new_iface: &Interface,
        old: &Property,
        new: &Property,
        path: &str,
    ) {
        if old.ty.text != new.ty.text {
            let message = format!(
                "Property ‘{}’ has changed type from ‘{}’ to ‘{}’.",
                path, old.ty, new.ty
            );
            self.push(
                ChangeKind::Modified,
                Severity::BackwardsCompatibility,
                ChangeCode::PropertyTypeChanged,
                path,
                Some(&old.ty.text),
                Some(&new.ty.text),
                new.location,
                message,
            );
        }

        if old.access != new.access {
            let widened = new.access == Access::ReadWrite;
            let (severity, message) = if widened {
                (
                    Severity::Info,
                    format!(
                        "Property ‘{}’ has changed access from ‘{}’ to ‘{}’, becoming less restrictive.",
                        path, old.access, new.access
                    ),
                )
            } else {
                (
                    Severity::BackwardsCompatibility,
                    format!(
                        "Property ‘{}’ has changed access from ‘{}’ to ‘{}’.",
                        path, old.access, new.access
                    ),
                )
            };
            self.push(
                ChangeKind::Modified,
                severity,
                ChangeCode::PropertyAccessChanged {
                    old: old.access,
                    new: new.access,
                },
                path,
                Some(old.access.as_str()),
                Some(new.access.as_str()),
                new.location,
                message,
            );
        }

        let subject = Subject {
            kind: ElementKind::Property,
            path,
            location: new.location,
        };
        self.emits_changed(
            effective_emits_changed(Some(&old_iface.annotations), &old.annotations),
            effective_emits_changed(Some(&new_iface.annotations), &new.annotations),
            &subject,
        );
        self.annotations(&old.annotations, &new.annotations, &subject);
        self.documentation(&old.doc, &new.doc, &subject);
    }

    fn emits_changed(&mut self, old: &str, new: &str, subject: &Subject<'_>) {
        if old == new {
            return;
        }
        let message = format!(
            "{} ‘{}’ has changed {} from ‘{}’ to ‘{}’.",
            subject.kind.title(),
            subject.path,
            EMITS_CHANGED_ANNOTATION,
            old,
            new
        );
        self.push(
            ChangeKind::Modified,
            Severity::Info,
            ChangeCode::EmitsChangedSignalChanged {
                old: old.to_string(),
                new: new.to_string(),
            },
            subject.path,
            Some(old),
            Some(new),
            subject.location,
            message,
        );
    }

    fn annotations(&mut self, old: &Annotations, new: &Annotations, subject: &Subject<'_>) {
        let path = subject.path;
        let title = subject.kind.title();

        let (o, n) = (old.value(DEPRECATED_ANNOTATION), new.value(DEPRECATED_ANNOTATION));
        let (was, is) = (o == Some("true"), n == Some("true"));
        if was != is {
            let (code, message) = if is {
                (ChangeCode::Deprecated, format!("{} ‘{}’ has been deprecated.", title, path))
            } else {
                (ChangeCode::Undeprecated, format!("{} ‘{}’ has been un-deprecated.", title, path))
            };
            self.push(presence_kind(o, n), Severity::Info, code, path, o, n, subject.location, message);
        }

        let (o, n) = (old.value(C_SYMBOL_ANNOTATION), new.value(C_SYMBOL_ANNOTATION));
        if o != n {
            let message = format!(
                "{} ‘{}’ has changed its C symbol from ‘{}’ to ‘{}’.",
                title,
                path,
                or_none(o),
                or_none(n)
            );
            self.push(
                presence_kind(o, n),
                Severity::Info,
                ChangeCode::CSymbolChanged,
                path,
                o,
                n,
                subject.location,
                message,
            );
        }

        let (o, n) = (old.value(NO_REPLY_ANNOTATION), new.value(NO_REPLY_ANNOTATION));
        let (was, is) = (o == Some("true"), n == Some("true"));
        if was != is {
            let (code, message) = if is {
                (
                    ChangeCode::ReplyRemoved,
                    format!("{} ‘{}’ has been marked as not returning a reply.", title, path),
                )
            } else {
                (
                    ChangeCode::ReplyAdded,
                    format!("{} ‘{}’ has been marked as returning a reply.", title, path),
                )
            };
            self.push(presence_kind(o, n), Severity::Info, code, path, o, n, subject.location, message);
        }

        let is_generic = |name: &str| {
            ![
                DEPRECATED_ANNOTATION,
                C_SYMBOL_ANNOTATION,
                NO_REPLY_ANNOTATION,
                EMITS_CHANGED_ANNOTATION,
                DOCSTRING_ANNOTATION,
            ]
            .contains(&name)
        };
        let noun = subject.kind.noun();

        for annotation in new.iter().filter(|a| is_generic(&a.name)) {
            match old.value(&annotation.name) {
                None => {
                    let message = format!(
                        "Annotation ‘{}’ has been added to {} ‘{}’.",
                        annotation.name, noun, path
                    );
                    self.push(
                        ChangeKind::Added,
                        Severity::Info,
                        ChangeCode::AnnotationAdded,
                        path,
                        None,
                        Some(&annotation.value),
                        annotation.location,
                        message,
                    );
                }
                Some(old_value) if old_value != annotation.value => {
                    let message = format!(
                        "Annotation ‘{}’ on {} ‘{}’ has changed value from ‘{}’ to ‘{}’.",
                        annotation.name, noun, path, old_value, annotation.value
                    );
                    self.push(
                        ChangeKind::Modified,
                        Severity::Info,
                        ChangeCode::AnnotationChanged,
                        path,
                        Some(old_value),
                        Some(&annotation.value),
                        annotation.location,
                        message,
                    );
                }
                Some(_) => {}
            }
        }

        for annotation in old.iter().filter(|a| is_generic(&a.name)) {
            if new.get(&annotation.name).is_none() {
                let message = format!(
                    "Annotation ‘{}’ has been removed from {} ‘{}’.",
                    annotation.name, noun, path
                );
                self.push(
                    ChangeKind::Removed,
                    Severity::Info,
                    ChangeCode::AnnotationRemoved,
                    path,
                    Some(&annotation.value),
                    None,
                    subject.location,
                    message,
                );
            }
        }
    }

    fn documentation(&mut self, old: &Option<Documentation>, new: &Option<Documentation>, subject: &Subject<'_>) {
        let (o, n) = (doc_text(old), doc_text(new));
        if o != n {
            let message = format!(
                "Documentation for {} ‘{}’ has changed.",
                subject.kind.noun(),
                subject.path
            );
            let location = new.as_ref().map_or(subject.location, |d| d.location);
            self.push(
                ChangeKind::Modified,
                Severity::Info,
                ChangeCode::DocumentationChanged,
                subject.path,
                o,
                n,
                location,
                message,
            );
        }
    }

    // ── pass 2: removals ─────────────────────────────────────────────

    fn node_removals(&mut self, old: &Node, new: &Node, scope: Option<&str>) {
        let prefix = node_prefix(scope);
        for iface in &old.interfaces {
            let iface_path = format!("{}{}", prefix, iface.name);
            match new.interface(&iface.name) {
                Some(new_iface) => self.interface_removals(iface, new_iface, &iface_path),
                None => self.removed(
                    ElementKind::Interface,
                    ChangeCode::InterfaceRemoved,
                    &iface_path,
                    iface.location,
                ),
            }
        }

        for child in &old.nodes {
            let Some(name) = child.name.as_deref() else {
                continue;
            };
            let child_path = child_scope(scope, name);
            match new.node(name) {
                Some(new_child) => self.node_removals(child, new_child, Some(&child_path)),
                None => self.removed(
                    ElementKind::Node,
                    ChangeCode::NodeRemoved,
                    &child_path,
                    child.location,
                ),
            }
        }
    }

    fn interface_removals(&mut self, old: &Interface, new: &Interface, path: &str) {
        for member in old.members() {
            let member_path = format!("{}.{}", path, member.name());
            match member {
                Member::Method(m) => match new.method(&m.name) {
                    Some(n) => self.argument_removals(m, n, &member_path),
                    None => self.removed(
                        ElementKind::Method,
                        ChangeCode::MethodRemoved,
                        &member_path,
                        m.location,
                    ),
                },
                Member::Signal(s) => match new.signal(&s.name) {
                    Some(n) => self.argument_removals(s, n, &member_path),
                    None => self.removed(
                        ElementKind::Signal,
                        ChangeCode::SignalRemoved,
                        &member_path,
                        s.location,
                    ),
                },
                Member::Property(p) => {
                    if new.property(&p.name).is_none() {
                        self.removed(
                            ElementKind::Property,
                            ChangeCode::PropertyRemoved,
                            &member_path,
                            p.location,
                        );
                    }
                }
            }
        }
    }

    fn argument_removals(&mut self, old: &Callable, new: &Callable, path: &str) {
        for (index, arg) in old.args.iter().enumerate().skip(new.args.len()) {
            let arg_path = format!("{}.{}", path, arg_label(arg, index));
            let message = format!("Argument ‘{}’ has been removed.", arg_path);
            self.push(
                ChangeKind::Removed,
                Severity::BackwardsCompatibility,
                ChangeCode::ArgumentRemoved,
                &arg_path,
                Some(&arg.ty.text),
                None,
                arg.location,
                message,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ast(xml: &str) -> Node {
        dbus_api::parse_str(xml).unwrap().root
    }

    fn iface(body: &str) -> Node {
        ast(&format!("<node><interface name='org.example.Foo'>{}</interface></node>", body))
    }

    fn summary(changes: &[Change]) -> Vec<(ChangeKind, Severity, String, String)> {
        changes
            .iter()
            .map(|c| (c.kind, c.severity, c.code.to_string(), c.path.clone()))
            .collect()
    }

    const SAMPLE: &str = r#"
<node name="/com/example/sample_object">
  <interface name="com.example.SampleInterface">
    <method name="Frobate">
      <arg name="foo" type="i" direction="in"/>
      <arg name="bar" type="s" direction="out"/>
      <annotation name="org.freedesktop.DBus.Deprecated" value="true"/>
    </method>
    <signal name="Changed">
      <arg name="new_value" type="b"/>
    </signal>
    <property name="Bar" type="y" access="readwrite"/>
  </interface>
  <node name="child_of_sample_object">
    <interface name="com.example.Child"><method name="Poke"/></interface>
  </node>
</node>"#;

    // ── identity and symmetry ──────────────────────────────────────────

    #[test]
    fn test_compare_identical_is_empty() {
        let a = ast(SAMPLE);
        assert!(compare(&a, &a).is_empty());
        assert!(compare(&Node::default(), &Node::default()).is_empty());
    }

    #[test]
    fn test_added_and_removed_are_mirrored() {
        let fixtures = [
            iface("<method name='Bar'><arg name='name' type='s'/></method>"),
            iface("<method name='Bar'><arg name='name' type='s'/><arg name='extra' type='s'/></method>"),
            iface("<signal name='S'/><property name='P' type='s' access='read'/>"),
            ast("<node><interface name='org.example.Other'/><node name='child'/></node>"),
            ast(SAMPLE),
            Node::default(),
        ];
        for a in &fixtures {
            for b in &fixtures {
                let forward = compare(a, b);
                let backward = compare(b, a);
                for change in forward.iter().filter(|c| c.kind == ChangeKind::Added) {
                    assert!(
                        backward
                            .iter()
                            .any(|r| r.kind == ChangeKind::Removed && r.path == change.path),
                        "no removal mirroring {:?}",
                        change
                    );
                }
            }
        }
    }

    // ── elements ───────────────────────────────────────────────────────

    #[test]
    fn test_method_removed() {
        let old = iface("<method name='A'/><method name='B'/><signal name='S'/>");
        let new = iface("<method name='A'/><signal name='S'/>");
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![(
                ChangeKind::Removed,
                Severity::BackwardsCompatibility,
                "method-removed".to_string(),
                "org.example.Foo.B".to_string()
            )]
        );
        assert_eq!(changes[0].message, "Method ‘org.example.Foo.B’ has been removed.");
    }

    #[test]
    fn test_interface_added_and_removed() {
        let old = ast("<node><interface name='org.example.Old'/></node>");
        let new = ast("<node><interface name='org.example.New'/></node>");
        assert_eq!(
            summary(&compare(&old, &new)),
            vec![
                (
                    ChangeKind::Added,
                    Severity::Info,
                    "interface-added".to_string(),
                    "org.example.New".to_string()
                ),
                (
                    ChangeKind::Removed,
                    Severity::BackwardsCompatibility,
                    "interface-removed".to_string(),
                    "org.example.Old".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_member_additions_are_info() {
        let old = iface("");
        let new = iface("<method name='M'/><signal name='S'/><property name='P' type='s' access='read'/>");
        let changes = compare(&old, &new);
        let codes: Vec<String> = changes.iter().map(|c| c.code.to_string()).collect();
        assert_eq!(codes, vec!["method-added", "signal-added", "property-added"]);
        assert!(changes.iter().all(|c| c.severity == Severity::Info));
    }

    // ── arguments ──────────────────────────────────────────────────────

    #[test]
    fn test_trailing_in_argument_is_forwards_incompatible() {
        let old = iface("<method name='Bar'><arg name='name' type='s' direction='in'/></method>");
        let new = iface(
            "<method name='Bar'><arg name='name' type='s' direction='in'/>\
             <arg name='extra' type='s' direction='in'/></method>",
        );
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![(
                ChangeKind::Added,
                Severity::ForwardsCompatibility,
                "argument-added".to_string(),
                "org.example.Foo.Bar.extra".to_string()
            )]
        );
    }

    #[test]
    fn test_trailing_out_argument_is_backwards_incompatible() {
        let old = iface("<method name='Bar'/>");
        let new = iface("<method name='Bar'><arg type='s' direction='out'/></method>");
        let changes = compare(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].severity, Severity::BackwardsCompatibility);
        assert_eq!(changes[0].path, "org.example.Foo.Bar.0");
    }

    #[test]
    fn test_trailing_signal_argument_is_forwards_incompatible() {
        let old = iface("<signal name='S'/>");
        let new = iface("<signal name='S'><arg name='v' type='u'/></signal>");
        let changes = compare(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].severity, Severity::ForwardsCompatibility);
    }

    #[test]
    fn test_argument_removed() {
        let old = iface("<method name='Bar'><arg name='a' type='s'/><arg name='b' type='u'/></method>");
        let new = iface("<method name='Bar'><arg name='a' type='s'/></method>");
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![(
                ChangeKind::Removed,
                Severity::BackwardsCompatibility,
                "argument-removed".to_string(),
                "org.example.Foo.Bar.b".to_string()
            )]
        );
        assert_eq!(changes[0].old.as_deref(), Some("u"));
    }

    #[test]
    fn test_argument_modifications() {
        let old = iface("<method name='Bar'><arg name='a' type='s' direction='in'/></method>");
        let new = iface("<method name='Bar'><arg name='b' type='u' direction='out'/></method>");
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![
                (
                    ChangeKind::Modified,
                    Severity::Info,
                    "argument-name-changed".to_string(),
                    "org.example.Foo.Bar.b".to_string()
                ),
                (
                    ChangeKind::Modified,
                    Severity::BackwardsCompatibility,
                    "argument-type-changed".to_string(),
                    "org.example.Foo.Bar.b".to_string()
                ),
                (
                    ChangeKind::Modified,
                    Severity::BackwardsCompatibility,
                    "argument-direction-changed-in-out".to_string(),
                    "org.example.Foo.Bar.b".to_string()
                ),
            ]
        );
        assert_eq!(
            changes[1].message,
            "Argument ‘org.example.Foo.Bar.b’ has changed type from ‘s’ to ‘u’."
        );
    }

    // ── properties ─────────────────────────────────────────────────────

    fn access_change(old: &str, new: &str) -> Vec<Change> {
        compare(
            &iface(&format!("<property name='P' type='s' access='{}'/>", old)),
            &iface(&format!("<property name='P' type='s' access='{}'/>", new)),
        )
    }

    #[test]
    fn test_property_access_matrix() {
        let cases = [
            ("read", "readwrite", Severity::Info),
            ("write", "readwrite", Severity::Info),
            ("readwrite", "read", Severity::BackwardsCompatibility),
            ("readwrite", "write", Severity::BackwardsCompatibility),
            ("read", "write", Severity::BackwardsCompatibility),
            ("write", "read", Severity::BackwardsCompatibility),
        ];
        for (old, new, severity) in cases {
            let changes = access_change(old, new);
            assert_eq!(changes.len(), 1, "{} -> {}", old, new);
            assert_eq!(changes[0].severity, severity, "{} -> {}", old, new);
            assert_eq!(
                changes[0].code.to_string(),
                format!("property-access-changed-{}-{}", old, new)
            );
        }
    }

    #[test]
    fn test_property_type_changed() {
        let changes = compare(
            &iface("<property name='P' type='s' access='read'/>"),
            &iface("<property name='P' type='as' access='read'/>"),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].code, ChangeCode::PropertyTypeChanged);
        assert_eq!(changes[0].severity, Severity::BackwardsCompatibility);
        assert_eq!(changes[0].old.as_deref(), Some("s"));
        assert_eq!(changes[0].new.as_deref(), Some("as"));
    }

    #[test]
    fn test_emits_changed_inherits_from_interface() {
        let old = ast(
            "<node><interface name='org.example.Foo'>\
             <property name='P' type='s' access='read'/>\
             <property name='Q' type='s' access='read'>\
             <annotation name='org.freedesktop.DBus.Property.EmitsChangedSignal' value='const'/>\
             </property></interface></node>",
        );
        let new = ast(
            "<node><interface name='org.example.Foo'>\
             <annotation name='org.freedesktop.DBus.Property.EmitsChangedSignal' value='invalidates'/>\
             <property name='P' type='s' access='read'/>\
             <property name='Q' type='s' access='read'>\
             <annotation name='org.freedesktop.DBus.Property.EmitsChangedSignal' value='const'/>\
             </property></interface></node>",
        );
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![
                (
                    ChangeKind::Modified,
                    Severity::Info,
                    "ecs-changed-true-invalidates".to_string(),
                    "org.example.Foo".to_string()
                ),
                (
                    ChangeKind::Modified,
                    Severity::Info,
                    "ecs-changed-true-invalidates".to_string(),
                    "org.example.Foo.P".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_emits_changed_on_interface_without_properties() {
        let old = iface("<method name='M'/>");
        let new = iface(
            "<annotation name='org.freedesktop.DBus.Property.EmitsChangedSignal' value='false'/>\
             <method name='M'/>",
        );
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![(
                ChangeKind::Modified,
                Severity::Info,
                "ecs-changed-true-false".to_string(),
                "org.example.Foo".to_string()
            )]
        );
        assert_eq!(
            changes[0].message,
            "Interface ‘org.example.Foo’ has changed \
             org.freedesktop.DBus.Property.EmitsChangedSignal from ‘true’ to ‘false’."
        );
        assert!(compare(&new, &new).is_empty());
    }

    // ── annotations and documentation ──────────────────────────────────

    #[test]
    fn test_deprecation() {
        let plain = iface("<method name='M'/>");
        let deprecated = iface(
            "<method name='M'><annotation name='org.freedesktop.DBus.Deprecated' value='true'/></method>",
        );
        let changes = compare(&plain, &deprecated);
        assert_eq!(
            summary(&changes),
            vec![(
                ChangeKind::Added,
                Severity::Info,
                "deprecated".to_string(),
                "org.example.Foo.M".to_string()
            )]
        );
        assert_eq!(changes[0].message, "Method ‘org.example.Foo.M’ has been deprecated.");

        let changes = compare(&deprecated, &plain);
        assert_eq!(changes[0].code, ChangeCode::Undeprecated);
        assert_eq!(changes[0].kind, ChangeKind::Removed);
    }

    #[test]
    fn test_well_known_annotations() {
        let old = iface(
            "<method name='M'><annotation name='org.freedesktop.DBus.GLib.CSymbol' value='foo_m'/></method>",
        );
        let new = iface(
            "<method name='M'><annotation name='org.freedesktop.DBus.GLib.CSymbol' value='foo_m2'/>\
             <annotation name='org.freedesktop.DBus.Method.NoReply' value='true'/></method>",
        );
        let codes: Vec<String> = compare(&old, &new).iter().map(|c| c.code.to_string()).collect();
        assert_eq!(codes, vec!["c-symbol-changed", "reply-removed"]);
        let codes: Vec<String> = compare(&new, &old).iter().map(|c| c.code.to_string()).collect();
        assert_eq!(codes, vec!["c-symbol-changed", "reply-added"]);
    }

    #[test]
    fn test_generic_annotations() {
        let old = iface(
            "<annotation name='com.example.Keep' value='1'/><annotation name='com.example.Gone' value='x'/>",
        );
        let new = iface(
            "<annotation name='com.example.Keep' value='2'/><annotation name='com.example.New' value='y'/>",
        );
        let changes = compare(&old, &new);
        assert_eq!(
            summary(&changes),
            vec![
                (
                    ChangeKind::Modified,
                    Severity::Info,
                    "annotation-changed".to_string(),
                    "org.example.Foo".to_string()
                ),
                (
                    ChangeKind::Added,
                    Severity::Info,
                    "annotation-added".to_string(),
                    "org.example.Foo".to_string()
                ),
                (
                    ChangeKind::Removed,
                    Severity::Info,
                    "annotation-removed".to_string(),
                    "org.example.Foo".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_documentation_changes() {
        let old = ast("<node><!--Old words.--><interface name='org.example.Foo'/></node>");
        let same = ast(
            "<node><interface name='org.example.Foo'>\
             <annotation name='org.gtk.GDBus.DocString' value='Old words.'/></interface></node>",
        );
        let new = ast("<node><!--New words.--><interface name='org.example.Foo'/></node>");

        assert!(compare(&old, &same).is_empty());
        let changes = compare(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].code, ChangeCode::DocumentationChanged);
        assert_eq!(changes[0].severity, Severity::Info);
        assert_eq!(changes[0].new.as_deref(), Some("New words."));
    }

    // ── nesting and ordering ───────────────────────────────────────────

    #[test]
    fn test_deepest_parsable_tree_compares() {
        let depth = dbus_api::DEFAULT_MAX_NESTING;
        let nested = |leaf: &str| {
            format!(
                "<node>{}{}{}</node>",
                "<node name='a'>".repeat(depth - 2),
                leaf,
                "</node>".repeat(depth - 2)
            )
        };
        let old = ast(&nested(""));
        let new = ast(&nested("<annotation name='com.example.Leaf' value='1'/>"));
        let changes = compare(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].code, ChangeCode::AnnotationAdded);
        assert_eq!(changes[0].path.matches('/').count(), depth - 3);
        assert!(compare(&new, &old).iter().all(|c| c.kind == ChangeKind::Removed));
    }

    #[test]
    fn test_nested_node_paths() {
        let old = ast(
            "<node><node name='child'><node name='grand'>\
             <interface name='org.example.Foo'><method name='M'/></interface>\
             </node></node><node name='gone'/></node>",
        );
        let new = ast(
            "<node><node name='child'><node name='grand'>\
             <interface name='org.example.Foo'/></node></node><node name='fresh'/></node>",
        );
        assert_eq!(
            summary(&compare(&old, &new)),
            vec![
                (
                    ChangeKind::Added,
                    Severity::Info,
                    "node-added".to_string(),
                    "fresh".to_string()
                ),
                (
                    ChangeKind::Removed,
                    Severity::BackwardsCompatibility,
                    "method-removed".to_string(),
                    "child/grand:org.example.Foo.M".to_string()
                ),
                (
                    ChangeKind::Removed,
                    Severity::BackwardsCompatibility,
                    "node-removed".to_string(),
                    "gone".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_order_follows_documents() {
        let old = iface(
            "<method name='Gone1'/><method name='Kept'><arg name='a' type='s'/></method>\
             <property name='Gone2' type='s' access='read'/>",
        );
        let new = iface(
            "<property name='Fresh' type='s' access='read'/>\
             <method name='Kept'><arg name='a' type='u'/></method>",
        );
        let paths: Vec<String> = compare(&old, &new).into_iter().map(|c| c.path).collect();
        assert_eq!(
            paths,
            vec![
                "org.example.Foo.Fresh",
                "org.example.Foo.Kept.a",
                "org.example.Foo.Gone1",
                "org.example.Foo.Gone2",
            ]
        );
    }

    #[test]
    fn test_removal_location_is_old_side() {
        let old = ast("<node>\n\n<interface name='org.example.Foo'/></node>");
        let new = ast("<node/>");
        let changes = compare(&old, &new);
        assert_eq!(changes[0].location.line, 3);
    }

    // ── codes ──────────────────────────────────────────────────────────

    #[test]
    fn test_change_codes_parse() {
        for code in ChangeCode::all() {
            let parsed: ChangeCode = code.parse().unwrap();
            assert_eq!(parsed.to_string(), code);
        }
        assert!("ecs-changed-true-true".parse::<ChangeCode>().is_err());
        assert!("ecs-changed-true-maybe".parse::<ChangeCode>().is_err());
        assert!("property-access-changed-read-read".parse::<ChangeCode>().is_err());
        assert!("method-renamed".parse::<ChangeCode>().is_err());
    }

    #[test]
    fn test_change_serializes_category_and_code() {
        let changes = access_change("readwrite", "read");
        let json = serde_json::to_value(&changes[0]).unwrap();
        assert_eq!(json["category"], "backwards-compatibility");
        assert_eq!(json["code"], "property-access-changed-readwrite-read");
        assert_eq!(json["kind"], "modified");
    }
}
