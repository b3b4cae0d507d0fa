use serde_json::{Map, Value};
use stracy_protocol::{Arg, EventFragment, Fragment, StructField};

use crate::model::Event;

/// Turns one structured syscall argument into a visual fragment.
///
/// Called once per argument per event, and only when a bucket is
/// materialized, never at ingestion time.
pub trait ArgumentRenderer {
    fn render_argument(&self, arg: &Arg) -> Fragment;
}

impl<F> ArgumentRenderer for F
where
    F: Fn(&Arg) -> Fragment,
{
    fn render_argument(&self, arg: &Arg) -> Fragment {
        self(arg)
    }
}

/// Build the content node of one event. Blank results are omitted.
pub fn render_event<R: ArgumentRenderer + ?Sized>(renderer: &R, event: &Event) -> EventFragment {
    EventFragment {
        syscall: event.args.syscall.clone(),
        failed: event.failed,
        args: event
            .args
            .args
            .iter()
            .map(|arg| renderer.render_argument(arg))
            .collect(),
        result: event
            .args
            .result
            .as_ref()
            .filter(|result| !result.is_blank())
            .map(|result| renderer.render_argument(result)),
    }
}

const ELF_MAGIC: &str = "\x7fELF";

/// Renderer for the argument shapes the tracer emits.
///
/// * bare scalars and `string` → text, truncated, ELF images as [`Fragment::Binary`]
/// * `flags` → flag set with the shared `PREFIX_` stripped
/// * `{Sec, Nsec}` objects → timestamp pair
/// * `stat` → struct with a `{mode=…, size=…, ...}` header
/// * other objects, `stack_t`, `msghdr` → collapsed struct
#[derive(Debug, Clone)]
pub struct DefaultArgumentRenderer {
    max_len: usize,
}

impl DefaultArgumentRenderer {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    fn render_typed(&self, kind: &str, value: &Value, formatted: Option<&Map<String, Value>>) -> Fragment {
        match kind {
            "string" => self.render_string(value),
            "flags" => render_flags(value),
            "stat" => {
                let field = |name: &str| {
                    formatted
                        .and_then(|f| f.get(name))
                        .map_or_else(|| "?".to_string(), scalar_text)
                };
                let header = format!("{{mode={}, size={}, ...}}", field("Mode"), field("Size"));
                self.render_struct(value, formatted, Some(header))
            }
            "stack_t" | "msghdr" => self.render_struct(value, formatted, None),
            _ => self.render_value(value, formatted),
        }
    }

    fn render_value(&self, value: &Value, formatted: Option<&Map<String, Value>>) -> Fragment {
        match value {
            Value::Null => Fragment::Nil,
            Value::Array(items) => {
                let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join("|");
                Fragment::Text(self.truncate(joined))
            }
            Value::Object(obj) => {
                if let (Some(kind), Some(inner)) =
                    (obj.get("Type").and_then(Value::as_str), obj.get("Value"))
                {
                    let inner_formatted = obj.get("Formated").and_then(Value::as_object);
                    return self.render_typed(kind, inner, inner_formatted);
                }
                if let (Some(sec), Some(nsec)) = (
                    obj.get("Sec").and_then(Value::as_i64),
                    obj.get("Nsec").and_then(Value::as_i64),
                ) {
                    return Fragment::Timestamp { sec, nsec };
                }
                self.render_struct(value, formatted, None)
            }
            scalar => self.render_string(scalar),
        }
    }

    fn render_string(&self, value: &Value) -> Fragment {
        let text = match value {
            Value::Null => return Fragment::Nil,
            other => scalar_text(other),
        };
        if text.starts_with(ELF_MAGIC) {
            return Fragment::Binary;
        }
        Fragment::Text(self.truncate(text))
    }

    fn render_struct(
        &self,
        value: &Value,
        formatted: Option<&Map<String, Value>>,
        header: Option<String>,
    ) -> Fragment {
        let obj = match value {
            Value::Null => {
                return Fragment::Struct {
                    header: header.unwrap_or_else(|| "null".into()),
                    fields: Vec::new(),
                };
            }
            Value::Object(obj) => obj,
            other => return self.render_value(other, formatted),
        };
        if obj.is_empty() {
            return Fragment::Struct {
                header: header.unwrap_or_else(|| "{}".into()),
                fields: Vec::new(),
            };
        }
        let fields = obj
            .iter()
            .map(|(name, raw)| {
                let shown = formatted.and_then(|f| f.get(name)).unwrap_or(raw);
                StructField {
                    name: name.clone(),
                    value: self.render_field(shown),
                }
            })
            .collect();
        Fragment::Struct {
            header: header.unwrap_or_else(|| "{...}".into()),
            fields,
        }
    }

    /// Nested scalars keep their JSON form so strings stay quoted.
    fn render_field(&self, value: &Value) -> Fragment {
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) => self.render_value(value, None),
            scalar => Fragment::Text(scalar.to_string()),
        }
    }

    fn truncate(&self, text: String) -> String {
        match text.char_indices().nth(self.max_len) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        }
    }
}

impl Default for DefaultArgumentRenderer {
    fn default() -> Self {
        Self::new(40)
    }
}

impl ArgumentRenderer for DefaultArgumentRenderer {
    fn render_argument(&self, arg: &Arg) -> Fragment {
        match arg {
            Arg::Typed(typed) => {
                self.render_typed(&typed.kind, &typed.value, typed.formatted.as_ref())
            }
            Arg::Plain(value) => self.render_value(value, None),
        }
    }
}

fn render_flags(value: &Value) -> Fragment {
    let mut flags: Vec<String> = match value {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_text(other)],
    };
    let prefix = flags
        .first()
        .and_then(|first| first.split_once('_'))
        .map(|(head, _)| format!("{head}_"));
    if let Some(prefix) = prefix {
        for flag in &mut flags {
            *flag = flag.replacen(&prefix, "", 1);
        }
    }
    Fragment::Flags(flags)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
