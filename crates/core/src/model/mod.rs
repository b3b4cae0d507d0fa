pub mod bucket;
pub mod event;
pub mod lane;

pub use bucket::{Bucket, BucketIndex, BucketStore};
pub use event::Event;
pub use lane::{Lane, LaneHeader, LaneRegistry};
