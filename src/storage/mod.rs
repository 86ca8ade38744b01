pub mod table;

pub use table::{Entity, EntityTable};
