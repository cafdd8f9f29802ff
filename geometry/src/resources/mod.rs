//! GPU resources owned by arenas and staging transfers.

mod buffer;

pub use buffer::{Buffer, MappedBuffer};
