pub mod model;
pub mod trade;

pub use model::*;
pub use trade::*;
