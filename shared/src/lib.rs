pub mod checkpoint;
pub mod colors;
pub mod dates;
pub mod filter;
pub mod geo;

pub use checkpoint::{CheckpointError, CheckpointRecord, CheckpointResponse};
pub use colors::{DEFAULT_COLOR, palette_color};
pub use dates::{Clock, FixedClock, LocalClock};
pub use filter::{FilterMode, RecordFilter};
pub use geo::{Bounds, Coordinate, Ring};
