use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Operating-system process identifier. Each distinct pid gets its own lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

/// One traced system call as emitted by the tracer.
///
/// The envelope follows the Chrome trace-event shape (`name`, `cat`, `ph`,
/// `pid`, `tid`, `ts`, `dur`) with the decoded syscall in `args`.
/// Timestamps and durations are in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    #[serde(default)]
    pub name: String,
    /// `"successful"` or `"failed"` for completed calls.
    #[serde(default)]
    pub cat: String,
    #[serde(default)]
    pub ph: String,
    pub pid: ProcessId,
    #[serde(default)]
    pub tid: u32,
    pub ts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<u64>,
    #[serde(default)]
    pub args: SyscallRecord,
}

impl TraceEvent {
    pub fn failed(&self) -> bool {
        self.cat == "failed"
    }
}

/// The decoded system call: its name, arguments and return value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyscallRecord {
    #[serde(rename = "Syscall", default)]
    pub syscall: String,
    #[serde(rename = "SyscallArgs", default, deserialize_with = "null_as_empty")]
    pub args: Vec<Arg>,
    #[serde(rename = "Result", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Arg>,
}

/// A syscall argument.
///
/// The tracer sends either a bare JSON value, or a typed wrapper carrying a
/// type tag plus optional pre-formatted fields (e.g. the octal mode of a
/// `stat` result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Typed(TypedArg),
    Plain(serde_json::Value),
}

impl Arg {
    pub fn plain(value: impl Into<serde_json::Value>) -> Self {
        Self::Plain(value.into())
    }

    /// Whether the argument carries nothing worth showing (empty string,
    /// null). Results like this are omitted by the renderers.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Plain(serde_json::Value::Null) => true,
            Self::Plain(serde_json::Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedArg {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Value")]
    pub value: serde_json::Value,
    /// Pre-formatted field values keyed by field name. The wire spelling
    /// is the tracer's.
    #[serde(rename = "Formated", default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The tracer serialises empty argument lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
