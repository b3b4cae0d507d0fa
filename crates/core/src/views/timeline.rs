use stracy_protocol::{Point, Rect, RenderCommand, ThemeToken, Viewport};

use crate::config::TimelineConfig;
use crate::render::ArgumentRenderer;
use crate::session::IngestionSession;
use crate::views::time_axis::bucket_label;
use crate::virtualize::VisibilitySource;

/// Screen geometry of the timeline: a fixed header row of lane cells, a
/// fixed gutter of time labels, and one column per lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineStyle {
    pub gutter_width: f64,
    pub column_width: f64,
    pub header_height: f64,
    /// Height of one event line; matches the layout's row height.
    pub line_height: f64,
}

impl TimelineStyle {
    /// Character-cell geometry.
    pub fn terminal(config: &TimelineConfig) -> Self {
        Self {
            gutter_width: 10.0,
            column_width: 48.0,
            header_height: 1.0,
            line_height: f64::from(config.row_height),
        }
    }

    fn lane_x(&self, column: usize, viewport: &Viewport) -> f64 {
        self.gutter_width + column as f64 * self.column_width - viewport.x
    }
}

impl Default for TimelineStyle {
    fn default() -> Self {
        Self {
            gutter_width: 80.0,
            column_width: 320.0,
            header_height: 24.0,
            line_height: 24.0,
        }
    }
}

/// Render the part of the timeline that intersects `viewport`.
///
/// `viewport.y` is the scroll offset into the layout; the header stays
/// pinned at the top. Hidden (empty) buckets emit nothing, unmaterialized
/// ones only their placeholder rectangle. Time labels of buckets the
/// visibility source has not reported yet are drawn as pending.
pub fn render_timeline<V, R>(
    session: &IngestionSession<V, R>,
    viewport: &Viewport,
    style: &TimelineStyle,
) -> Vec<RenderCommand>
where
    V: VisibilitySource,
    R: ArgumentRenderer,
{
    let lanes = session.lanes();
    let layout = session.layout();
    let controller = session.controller();
    let mut commands = Vec::with_capacity(lanes.len() * 2 + 16);

    let on_screen = |x: f64| x + style.column_width > style.gutter_width && x < viewport.width;

    commands.push(RenderCommand::BeginGroup {
        id: "header".to_string(),
        label: Some("Processes".to_string()),
    });
    for lane in lanes.lanes() {
        let x = style.lane_x(lane.column, viewport);
        if !on_screen(x) {
            continue;
        }
        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(x, 0.0, style.column_width, style.header_height),
            color: ThemeToken::LaneHeaderBackground,
            border_color: Some(ThemeToken::LaneBorder),
            label: Some(format!("pid {}", lane.pid)),
            bucket: None,
        });
    }
    commands.push(RenderCommand::EndGroup);

    let body_height = (viewport.height - style.header_height).max(0.0);
    let Some(range) = layout.visible_range(viewport.y as u64, body_height as u64, 0) else {
        return commands;
    };
    let min_bucket = session.min_bucket().unwrap_or(*range.start());
    let width_ns = session.buckets().bucket_width_ns();
    let lanes_width = (lanes.len() as f64 * style.column_width - viewport.x).max(0.0);

    for index in range {
        let Some(placeholder) = controller.placeholder(index) else {
            continue;
        };
        if placeholder.is_hidden() {
            continue;
        }
        let (Some(top), Some(height)) = (layout.top_of(index), layout.height_of(index)) else {
            continue;
        };
        let y = style.header_height + top as f64 - viewport.y;

        commands.push(RenderCommand::BeginGroup {
            id: format!("bucket-{index}"),
            label: None,
        });
        if y >= style.header_height {
            let color = if placeholder.is_visible() {
                ThemeToken::TimeLabel
            } else {
                ThemeToken::TimeLabelPending
            };
            commands.push(RenderCommand::DrawText {
                position: Point::new(0.0, y),
                text: bucket_label(index, min_bucket, width_ns),
                color,
            });
        }
        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(style.gutter_width, y, lanes_width, f64::from(height)),
            color: ThemeToken::BucketBackground,
            border_color: Some(ThemeToken::BucketBorder),
            label: None,
            bucket: Some(index),
        });

        for (cell, lane) in placeholder.cells().iter().zip(lanes.lanes()) {
            let x = style.lane_x(lane.column, viewport);
            if !on_screen(x) {
                continue;
            }
            for (line, fragment) in cell.fragments.iter().enumerate() {
                let line_y = y + line as f64 * style.line_height;
                if line_y < style.header_height {
                    continue;
                }
                if line_y >= viewport.height {
                    break;
                }
                commands.push(RenderCommand::DrawText {
                    position: Point::new(x, line_y),
                    text: fragment.summary(),
                    color: fragment.theme_token(),
                });
            }
        }
        commands.push(RenderCommand::EndGroup);
    }

    commands
}
