mod catalog;
mod select_stations;

pub use catalog::*;
pub use select_stations::*;
