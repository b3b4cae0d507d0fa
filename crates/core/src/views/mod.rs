pub mod time_axis;
pub mod timeline;

pub use timeline::{TimelineStyle, render_timeline};
