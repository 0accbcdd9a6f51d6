//! Parser diagnostics.

use crate::ast::Location;
use serde::Serialize;
use std::fmt;

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    /// Parsing cannot produce a trustworthy AST.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// Stable identifier for each kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    UnknownNode,
    EmptyRoot,
    MissingAttribute,
    DuplicateNode,
    DuplicateInterface,
    DuplicateMethod,
    DuplicateSignal,
    DuplicateProperty,
    DuplicateAnnotation,
    NodeName,
    InterfaceName,
    MethodName,
    SignalName,
    PropertyName,
    PropertyType,
    PropertyAccess,
    ArgumentType,
    ArgumentDirection,
    SignalArgumentDirection,
    UnknownAnnotation,
    EmptyDocumentation,
}

impl IssueCode {
    pub fn all() -> &'static [IssueCode] {
        use IssueCode::*;
        &[
            UnknownNode,
            EmptyRoot,
            MissingAttribute,
            DuplicateNode,
            DuplicateInterface,
            DuplicateMethod,
            DuplicateSignal,
            DuplicateProperty,
            DuplicateAnnotation,
            NodeName,
            InterfaceName,
            MethodName,
            SignalName,
            PropertyName,
            PropertyType,
            PropertyAccess,
            ArgumentType,
            ArgumentDirection,
            SignalArgumentDirection,
            UnknownAnnotation,
            EmptyDocumentation,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::UnknownNode => "unknown-node",
            IssueCode::EmptyRoot => "empty-root",
            IssueCode::MissingAttribute => "missing-attribute",
            IssueCode::DuplicateNode => "duplicate-node",
            IssueCode::DuplicateInterface => "duplicate-interface",
            IssueCode::DuplicateMethod => "duplicate-method",
            IssueCode::DuplicateSignal => "duplicate-signal",
            IssueCode::DuplicateProperty => "duplicate-property",
            IssueCode::DuplicateAnnotation => "duplicate-annotation",
            IssueCode::NodeName => "node-name",
            IssueCode::InterfaceName => "interface-name",
            IssueCode::MethodName => "method-name",
            IssueCode::SignalName => "signal-name",
            IssueCode::PropertyName => "property-name",
            IssueCode::PropertyType => "property-type",
            IssueCode::PropertyAccess => "property-access",
            IssueCode::ArgumentType => "argument-type",
            IssueCode::ArgumentDirection => "argument-direction",
            IssueCode::SignalArgumentDirection => "signal-argument-direction",
            IssueCode::UnknownAnnotation => "unknown-annotation",
            IssueCode::EmptyDocumentation => "empty-documentation",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueCode::all()
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown issue code: {}", s))
    }
}

/// A problem found while parsing introspection XML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Display name of the file being parsed, if one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Renders as `file:line:column: severity (code): message`.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("<stdin>");
        match self.location {
            Some(loc) => write!(f, "{}:{}:{}: ", file, loc.line, loc.column)?,
            None => write!(f, "{}: ", file)?,
        }
        write!(f, "{} ({}): {}", self.severity, self.code, self.message)
    }
}

/// Accumulates diagnostics in the order they were found.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticLog {
    file: Option<String>,
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub(crate) fn new(file: Option<String>) -> Self {
        Self {
            file,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(
        &mut self,
        severity: Severity,
        code: IssueCode,
        location: Location,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            file: self.file.clone(),
            severity,
            code,
            message: message.into(),
            location: Some(location),
        });
    }

    pub(crate) fn warning(&mut self, code: IssueCode, location: Location, message: impl Into<String>) {
        self.push(Severity::Warning, code, location, message);
    }

    pub(crate) fn error(&mut self, code: IssueCode, location: Location, message: impl Into<String>) {
        self.push(Severity::Error, code, location, message);
    }

    pub(crate) fn fatal(&mut self, code: IssueCode, location: Location, message: impl Into<String>) {
        self.push(Severity::Fatal, code, location, message);
    }

    pub(crate) fn has_fatal(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_fatal)
    }

    pub(crate) fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_code_strings_roundtrip() {
        for code in IssueCode::all() {
            let parsed: IssueCode = code.as_str().parse().unwrap();
            assert_eq!(&parsed, code);
        }
        assert!("not-a-code".parse::<IssueCode>().is_err());
    }

    #[test]
    fn test_issue_code_serializes_kebab_case() {
        let json = serde_json::to_string(&IssueCode::SignalArgumentDirection).unwrap();
        assert_eq!(json, "\"signal-argument-direction\"");
    }

    #[test]
    fn test_diagnostic_display() {
        let mut log = DiagnosticLog::new(Some("api.xml".into()));
        log.error(
            IssueCode::DuplicateMethod,
            Location { line: 4, column: 5 },
            "Duplicate method definition ‘I.I.M’.",
        );
        assert!(!log.has_fatal());
        let entries = log.into_entries();
        assert_eq!(
            entries[0].to_string(),
            "api.xml:4:5: error (duplicate-method): Duplicate method definition ‘I.I.M’."
        );
    }

    #[test]
    fn test_has_fatal() {
        let mut log = DiagnosticLog::new(None);
        log.warning(IssueCode::UnknownAnnotation, Location::default(), "w");
        assert!(!log.has_fatal());
        log.fatal(IssueCode::EmptyRoot, Location::default(), "f");
        assert!(log.has_fatal());
    }
}
