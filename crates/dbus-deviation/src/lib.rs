#![doc = include_str!("../README.md")]

pub mod check;
pub mod comparator;

pub use check::{CheckOutcome, CheckPolicy, FilterError, WarningFilter, check, parse_list};
pub use comparator::{Change, ChangeCode, ChangeKind, Severity, compare};
