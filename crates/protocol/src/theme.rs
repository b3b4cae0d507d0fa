use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,

    LaneHeaderBackground,
    LaneHeaderText,
    LaneBorder,

    BucketBackground,
    BucketBorder,
    TimeLabel,

    /// Label of a bucket that is on screen but not yet reported visible.
    TimeLabelPending,

    SyscallName,
    SyscallFailed,
}
