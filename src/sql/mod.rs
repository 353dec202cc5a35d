//! Safe SQL rendering: identifiers from declarations only, values as named parameters.

pub mod builder;
pub mod params;
pub mod state;
pub use builder::QueryBuf;
pub use state::*;
