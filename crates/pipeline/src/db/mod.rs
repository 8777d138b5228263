mod sqlite;
mod weather_data;

pub use sqlite::*;
pub use weather_data::*;
