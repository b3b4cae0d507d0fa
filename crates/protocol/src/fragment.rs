use std::fmt;

use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;

/// Renderable form of one syscall argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fragment {
    /// Plain scalar, already truncated for display.
    Text(String),
    /// A set of enumeration flags, common prefix stripped.
    Flags(Vec<String>),
    /// A `{sec, nsec}` pair (timeval / timespec).
    Timestamp { sec: i64, nsec: i64 },
    /// A nested structure shown collapsed behind `header`.
    Struct {
        header: String,
        fields: Vec<StructField>,
    },
    /// Binary payload sentinel (e.g. an ELF image passed to `write`).
    Binary,
    Nil,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub value: Fragment,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Flags(flags) if flags.is_empty() => f.write_str("0"),
            Self::Flags(flags) => f.write_str(&flags.join("|")),
            Self::Timestamp { sec, nsec } => write!(f, "{sec}.{nsec:09}s"),
            Self::Struct { header, .. } => f.write_str(header),
            Self::Binary => f.write_str("<binary>"),
            Self::Nil => f.write_str("nil"),
        }
    }
}

/// Renderable form of one event: the content node of a lane cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFragment {
    pub syscall: String,
    pub failed: bool,
    pub args: Vec<Fragment>,
    pub result: Option<Fragment>,
}

impl EventFragment {
    /// One-line `name(arg, arg) = result` summary.
    pub fn summary(&self) -> String {
        let args = self
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match &self.result {
            Some(result) => format!("{}({args}) = {result}", self.syscall),
            None => format!("{}({args})", self.syscall),
        }
    }

    pub fn theme_token(&self) -> ThemeToken {
        if self.failed {
            ThemeToken::SyscallFailed
        } else {
            ThemeToken::SyscallName
        }
    }
}
