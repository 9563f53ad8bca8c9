//! Parameter persistence in a reserved flash sector.

mod params;

pub use params::{ParamStore, DEFAULT_OFFSET, RECORD_LEN};
