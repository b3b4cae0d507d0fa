pub mod config;
pub mod layout;
pub mod live;
pub mod model;
pub mod render;
pub mod session;
pub mod transport;
pub mod views;
pub mod virtualize;

pub use config::{ConfigError, TimelineConfig};
pub use live::LiveTimeline;
pub use render::{ArgumentRenderer, DefaultArgumentRenderer};
pub use session::{IngestError, IngestionSession, SessionStats};
pub use transport::{ChannelTransport, StreamHandler, Subscription, Transport, TransportError};
