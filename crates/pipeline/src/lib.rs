mod db;
mod domains;
mod utils;

pub use db::*;
pub use domains::*;
pub use utils::*;
