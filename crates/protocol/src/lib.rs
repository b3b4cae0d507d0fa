pub mod commands;
pub mod event;
pub mod fragment;
pub mod stream;
pub mod theme;
pub mod types;

pub use commands::RenderCommand;
pub use event::{Arg, ProcessId, SyscallRecord, TraceEvent, TypedArg};
pub use fragment::{EventFragment, Fragment, StructField};
pub use stream::{SseDecoder, StreamMessage};
pub use theme::ThemeToken;
pub use types::{Point, Rect, Viewport};
