//! CFACTS system inventory: record model, column mapping and source adapters.

pub mod csv;
pub mod mapping;
pub mod model;
pub mod warehouse;

pub use self::csv::parse_csv;
pub use mapping::Field;
pub use model::{CfactsSystem, CFACTS_TABLE};
pub use warehouse::WarehouseView;
