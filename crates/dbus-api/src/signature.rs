//! D-Bus type signatures.
//!
//! A signature is a sequence of complete types written in the compact
//! one-character-per-basic-type grammar from the D-Bus specification, for
//! example `a{sv}` or `(iiav)`. [`TypeSignature::parse`] builds the type tree
//! and [`Display`](std::fmt::Display) writes it back out; the two are exact
//! inverses, so `TypeSignature::parse(s)?.to_string() == s` for every valid
//! `s`.
//!
//! ```
//! use dbus_api::{Type, TypeSignature};
//!
//! let sig = TypeSignature::parse("a{sv}i").unwrap();
//! assert_eq!(sig.types().len(), 2);
//! assert_eq!(sig.to_string(), "a{sv}i");
//! assert_eq!(sig.describe(), "Dict of {String: Variant}, Int32");
//! assert_eq!(sig.types()[1], Type::Int32);
//! ```

use serde::{Serialize, Serializer};
use std::fmt::{self, Write};
use std::str::FromStr;

/// Container nesting allowed by [`TypeSignature::parse`].
///
/// The D-Bus specification caps arrays and structs at 32 levels each.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Type codes the D-Bus specification reserves for bindings and internal use.
const RESERVED_CODES: &[char] = &['r', 'e', 'm', '*', '?', '@', '&', '^'];

/// Why a type signature could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Unknown type ‘{0}’.")]
    UnknownType(char),

    #[error("Reserved type ‘{0}’ must not be used in signatures on D-Bus.")]
    ReservedType(char),

    #[error("Incomplete array declaration.")]
    IncompleteArray,

    #[error("Incomplete structure declaration.")]
    IncompleteStruct,

    #[error("Incomplete dictionary declaration.")]
    IncompleteDict,

    #[error("Invalid dictionary declaration.")]
    InvalidDict,

    #[error("Unbalanced ‘{0}’ without a matching opening delimiter.")]
    UnbalancedClose(char),

    #[error("Type nesting exceeds the limit of {limit} containers.")]
    TooDeep { limit: usize },
}

/// A single complete D-Bus type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
    ObjectPath,
    Signature,
    Variant,
    UnixFd,
    Array(Box<Type>),
    Struct(Vec<Type>),
    DictEntry(Box<Type>, Box<Type>),
}

impl Type {
    /// Map a basic type code to its type. Container codes return `None`.
    pub fn from_code(code: char) -> Option<Type> {
        let ty = match code {
            'y' => Type::Byte,
            'b' => Type::Boolean,
            'n' => Type::Int16,
            'q' => Type::UInt16,
            'i' => Type::Int32,
            'u' => Type::UInt32,
            'x' => Type::Int64,
            't' => Type::UInt64,
            'd' => Type::Double,
            's' => Type::String,
            'o' => Type::ObjectPath,
            'g' => Type::Signature,
            'v' => Type::Variant,
            'h' => Type::UnixFd,
            _ => return None,
        };
        Some(ty)
    }

    /// The leading signature character of this type.
    pub fn code(&self) -> char {
        match self {
            Type::Byte => 'y',
            Type::Boolean => 'b',
            Type::Int16 => 'n',
            Type::UInt16 => 'q',
            Type::Int32 => 'i',
            Type::UInt32 => 'u',
            Type::Int64 => 'x',
            Type::UInt64 => 't',
            Type::Double => 'd',
            Type::String => 's',
            Type::ObjectPath => 'o',
            Type::Signature => 'g',
            Type::Variant => 'v',
            Type::UnixFd => 'h',
            Type::Array(_) => 'a',
            Type::Struct(_) => '(',
            Type::DictEntry(..) => '{',
        }
    }

    /// Human-readable description, e.g. `Array of [Object Path]`.
    pub fn describe(&self) -> String {
        match self {
            Type::Byte => "Byte".into(),
            Type::Boolean => "Boolean".into(),
            Type::Int16 => "Int16".into(),
            Type::UInt16 => "UInt16".into(),
            Type::Int32 => "Int32".into(),
            Type::UInt32 => "UInt32".into(),
            Type::Int64 => "Int64".into(),
            Type::UInt64 => "UInt64".into(),
            Type::Double => "Double".into(),
            Type::String => "String".into(),
            Type::ObjectPath => "Object Path".into(),
            Type::Signature => "Signature".into(),
            Type::Variant => "Variant".into(),
            Type::UnixFd => "Unix FD".into(),
            Type::Array(member) => match member.as_ref() {
                Type::DictEntry(key, value) => {
                    format!("Dict of {{{}: {}}}", key.describe(), value.describe())
                }
                other => format!("Array of [{}]", other.describe()),
            },
            Type::Struct(members) => format!("Struct of ({})", describe_all(members)),
            Type::DictEntry(key, value) => {
                format!("Dict Entry of {{{}: {}}}", key.describe(), value.describe())
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Array(member) => write!(f, "a{}", member),
            Type::Struct(members) => {
                f.write_char('(')?;
                for member in members {
                    write!(f, "{}", member)?;
                }
                f.write_char(')')
            }
            Type::DictEntry(key, value) => write!(f, "{{{}{}}}", key, value),
            basic => f.write_char(basic.code()),
        }
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An ordered sequence of zero or more complete types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSignature {
    types: Vec<Type>,
}

impl TypeSignature {
    pub fn new(types: Vec<Type>) -> Self {
        Self { types }
    }

    /// Parse a signature, allowing up to [`DEFAULT_MAX_DEPTH`] nested containers.
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        Self::parse_with_max_depth(text, DEFAULT_MAX_DEPTH)
    }

    /// Parse a signature with a custom container nesting ceiling.
    ///
    /// Nesting deeper than `max_depth` fails with [`SignatureError::TooDeep`]
    /// before the recursion can grow any further.
    pub fn parse_with_max_depth(text: &str, max_depth: usize) -> Result<Self, SignatureError> {
        let mut parser = SignatureParser {
            chars: text.chars(),
            max_depth,
        };
        let mut types = Vec::new();
        while let Some(c) = parser.chars.next() {
            types.push(parser.parse_one(c, 0)?);
        }
        Ok(Self { types })
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Human-readable description of every type, joined with `, `.
    pub fn describe(&self) -> String {
        describe_all(&self.types)
    }
}

impl FromStr for TypeSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ty in &self.types {
            write!(f, "{}", ty)?;
        }
        Ok(())
    }
}

impl Serialize for TypeSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn describe_all(types: &[Type]) -> String {
    types
        .iter()
        .map(Type::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

struct SignatureParser<'a> {
    chars: std::str::Chars<'a>,
    max_depth: usize,
}

impl SignatureParser<'_> {
    /// Parse one complete type starting at `c`, nested inside `depth` containers.
    fn parse_one(&mut self, c: char, depth: usize) -> Result<Type, SignatureError> {
        if let Some(basic) = Type::from_code(c) {
            return Ok(basic);
        }

        match c {
            'a' | '(' | '{' if depth >= self.max_depth => Err(SignatureError::TooDeep {
                limit: self.max_depth,
            }),
            'a' => {
                let next = self.chars.next().ok_or(SignatureError::IncompleteArray)?;
                Ok(Type::Array(Box::new(self.parse_one(next, depth + 1)?)))
            }
            '(' => {
                let mut members = Vec::new();
                loop {
                    match self.chars.next() {
                        None => return Err(SignatureError::IncompleteStruct),
                        Some(')') => break,
                        Some(next) => members.push(self.parse_one(next, depth + 1)?),
                    }
                }
                Ok(Type::Struct(members))
            }
            '{' => {
                let mut members = Vec::new();
                loop {
                    match self.chars.next() {
                        None => return Err(SignatureError::IncompleteDict),
                        Some('}') => break,
                        Some(next) => members.push(self.parse_one(next, depth + 1)?),
                    }
                }
                let mut members = members.into_iter();
                match (members.next(), members.next(), members.next()) {
                    (Some(key), Some(value), None) => {
                        Ok(Type::DictEntry(Box::new(key), Box::new(value)))
                    }
                    _ => Err(SignatureError::InvalidDict),
                }
            }
            ')' | '}' => Err(SignatureError::UnbalancedClose(c)),
            c if RESERVED_CODES.contains(&c) => Err(SignatureError::ReservedType(c)),
            c => Err(SignatureError::UnknownType(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(s: &str) -> Result<TypeSignature, SignatureError> {
        TypeSignature::parse(s)
    }

    // ── parsing ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_basic_types() {
        let sig = parse("ybnqiuxtdsogvh").unwrap();
        assert_eq!(sig.types().len(), 14);
        assert_eq!(sig.types()[0], Type::Byte);
        assert_eq!(sig.types()[13], Type::UnixFd);
    }

    #[test]
    fn test_parse_empty() {
        let sig = parse("").unwrap();
        assert!(sig.is_empty());
        assert_eq!(sig.to_string(), "");
    }

    #[test]
    fn test_parse_array_of_dict() {
        let sig = parse("a{sv}").unwrap();
        assert_eq!(
            sig.types(),
            &[Type::Array(Box::new(Type::DictEntry(
                Box::new(Type::String),
                Box::new(Type::Variant)
            )))]
        );
    }

    #[test]
    fn test_parse_nested_struct() {
        let sig = parse("(i(sa(ob)))").unwrap();
        match &sig.types()[0] {
            Type::Struct(members) => {
                assert_eq!(members.len(), 2);
                assert!(matches!(members[1], Type::Struct(_)));
            }
            other => panic!("Expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_struct_accepted() {
        assert_eq!(parse("()").unwrap().types(), &[Type::Struct(vec![])]);
    }

    // ── errors ─────────────────────────────────────────────────────────

    #[test]
    fn test_unknown_type() {
        assert_eq!(parse("iZ"), Err(SignatureError::UnknownType('Z')));
    }

    #[test]
    fn test_reserved_type() {
        let err = parse("a?").unwrap_err();
        assert_eq!(err, SignatureError::ReservedType('?'));
        assert_eq!(
            err.to_string(),
            "Reserved type ‘?’ must not be used in signatures on D-Bus."
        );
    }

    #[test]
    fn test_incomplete_containers() {
        assert_eq!(parse("a"), Err(SignatureError::IncompleteArray));
        assert_eq!(parse("(ii"), Err(SignatureError::IncompleteStruct));
        assert_eq!(parse("a{sv"), Err(SignatureError::IncompleteDict));
    }

    #[test]
    fn test_unbalanced_close() {
        assert_eq!(parse("i)"), Err(SignatureError::UnbalancedClose(')')));
        assert_eq!(parse("(i}"), Err(SignatureError::UnbalancedClose('}')));
        assert_eq!(parse("a)"), Err(SignatureError::UnbalancedClose(')')));
    }

    #[test]
    fn test_dict_needs_two_members() {
        assert_eq!(parse("a{s}"), Err(SignatureError::InvalidDict));
        assert_eq!(parse("a{sii}"), Err(SignatureError::InvalidDict));
        assert_eq!(parse("a{}"), Err(SignatureError::InvalidDict));
    }

    #[test]
    fn test_depth_limit() {
        assert!(TypeSignature::parse_with_max_depth("aai", 2).is_ok());
        assert_eq!(
            TypeSignature::parse_with_max_depth("aaai", 2),
            Err(SignatureError::TooDeep { limit: 2 })
        );
        assert_eq!(
            TypeSignature::parse_with_max_depth("(i)", 0),
            Err(SignatureError::TooDeep { limit: 0 })
        );
    }

    #[test]
    fn test_pathological_nesting_does_not_overflow() {
        let deep = format!("{}i", "a".repeat(100_000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(
            err,
            SignatureError::TooDeep {
                limit: DEFAULT_MAX_DEPTH
            }
        );
    }

    // ── formatting ─────────────────────────────────────────────────────

    #[test]
    fn test_roundtrip_examples() {
        for s in ["s", "a{us}", "(iiu)", "(iiav)", "aa{sa{sv}}", "a(oa{sa{sv}})", "hvg"] {
            assert_eq!(parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_from_str() {
        let sig: TypeSignature = "ao".parse().unwrap();
        assert_eq!(sig.types(), &[Type::Array(Box::new(Type::ObjectPath))]);
    }

    #[test]
    fn test_describe() {
        assert_eq!(parse("o").unwrap().describe(), "Object Path");
        assert_eq!(parse("ah").unwrap().describe(), "Array of [Unix FD]");
        assert_eq!(
            parse("a{sa{sv}}").unwrap().describe(),
            "Dict of {String: Dict of {String: Variant}}"
        );
        assert_eq!(
            parse("(ib)s").unwrap().describe(),
            "Struct of (Int32, Boolean), String"
        );
    }

    #[test]
    fn test_serialize_as_string() {
        let sig = parse("a{sv}").unwrap();
        assert_eq!(serde_json::to_string(&sig).unwrap(), "\"a{sv}\"");
    }

    // ── properties ─────────────────────────────────────────────────────

    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = prop_oneof![
            Just(Type::Byte),
            Just(Type::Boolean),
            Just(Type::Int16),
            Just(Type::UInt16),
            Just(Type::Int32),
            Just(Type::UInt32),
            Just(Type::Int64),
            Just(Type::UInt64),
            Just(Type::Double),
            Just(Type::String),
            Just(Type::ObjectPath),
            Just(Type::Signature),
            Just(Type::Variant),
            Just(Type::UnixFd),
        ];
        leaf.prop_recursive(6, 48, 4, |inner| {
            prop_oneof![
                inner.clone().prop_map(|t| Type::Array(Box::new(t))),
                prop::collection::vec(inner.clone(), 0..4).prop_map(Type::Struct),
                (inner.clone(), inner).prop_map(|(k, v)| Type::DictEntry(Box::new(k), Box::new(v))),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_format_parse_format_is_identity(types in prop::collection::vec(arb_type(), 0..5)) {
            let text = TypeSignature::new(types.clone()).to_string();
            let parsed = TypeSignature::parse(&text).unwrap();
            prop_assert_eq!(parsed.types(), types.as_slice());
            prop_assert_eq!(parsed.to_string(), text);
        }

        #[test]
        fn prop_parse_never_panics(text in "[ybnqiuxtdsogvha(){}?Z]{0,24}") {
            let _ = TypeSignature::parse(&text);
        }
    }
}
