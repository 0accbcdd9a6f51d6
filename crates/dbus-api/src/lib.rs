#![doc = include_str!("../README.md")]

pub mod ast;
pub mod log;
pub mod names;
pub mod parser;
pub mod signature;

pub use ast::{
    Access, Annotation, Annotations, Argument, Callable, CallableKind, DeclaredType, Direction,
    DocSource, Documentation, Interface, Location, Member, Node, Property,
};
pub use log::{Diagnostic, IssueCode, Severity};
pub use parser::{DEFAULT_MAX_NESTING, ParseError, Parsed, Parser, parse, parse_str};
pub use signature::{DEFAULT_MAX_DEPTH, SignatureError, Type, TypeSignature};
