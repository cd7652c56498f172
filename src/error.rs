use std::fmt;

/// Errors surfaced while compiling an expression or scheduling a job.
#[derive(Debug)]
pub enum ScheduleError {
    /// A field atom could not be parsed.
    InvalidField { field: &'static str, value: String },
    /// A character outside the field's accepted alphabet.
    IllegalCharacter { field: &'static str, ch: char },
    /// Expressions carry exactly six whitespace-separated fields.
    WrongFieldCount { found: usize },
    /// A numeric value outside the field's domain.
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    /// A range whose start exceeds its end, or with non-numeric endpoints.
    InvalidRange { field: &'static str, atom: String },
    /// A step of zero, larger than the field's domain, or non-numeric.
    InvalidStep { field: &'static str, step: String },
    /// Field constraints the compiler cannot reconcile with each other.
    IncompatibleFields { reason: String },
    /// An `@name` shorthand that is not one of the known aliases.
    UnknownAlias { alias: String },
    /// A fixed-instant expression that is not a valid ISO-8601 datetime.
    InvalidIsoLiteral { literal: String },
    /// The reference instant handed to an occurrence query is unusable.
    InvalidReference { reason: String },
    /// Another live job already owns this name.
    DuplicateName { name: String },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidField { field, value } => {
                write!(f, "invalid {field} field: '{value}'")
            }
            Self::IllegalCharacter { field, ch } => {
                write!(f, "illegal character '{ch}' in {field} field")
            }
            Self::WrongFieldCount { found } => {
                write!(f, "expected 6 fields, found {found}")
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{field} value {value} out of range {min}-{max}")
            }
            Self::InvalidRange { field, atom } => {
                write!(f, "invalid range '{atom}' in {field} field")
            }
            Self::InvalidStep { field, step } => {
                write!(f, "invalid step '{step}' in {field} field")
            }
            Self::IncompatibleFields { reason } => {
                write!(f, "incompatible fields: {reason}")
            }
            Self::UnknownAlias { alias } => write!(f, "unknown alias '{alias}'"),
            Self::InvalidIsoLiteral { literal } => {
                write!(f, "invalid ISO-8601 literal '{literal}'")
            }
            Self::InvalidReference { reason } => {
                write!(f, "invalid reference instant: {reason}")
            }
            Self::DuplicateName { name } => {
                write!(f, "a job named '{name}' already exists")
            }
        }
    }
}

impl std::error::Error for ScheduleError {}
