use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// The timeline view emits a `Vec<RenderCommand>` per frame. Renderers
/// consume the list sequentially; each command carries all the data it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Draw a filled rectangle, optionally labelled and tagged with the
    /// bucket index it belongs to (for hit-testing).
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        border_color: Option<ThemeToken>,
        label: Option<String>,
        bucket: Option<u64>,
    },

    /// Draw a left-aligned text string at a position.
    DrawText {
        position: Point,
        text: String,
        color: ThemeToken,
    },

    /// Begin a logical group (a bucket row, the header). Renderers may use
    /// this for batching or accessibility.
    BeginGroup { id: String, label: Option<String> },

    /// End the current group.
    EndGroup,
}
