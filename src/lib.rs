pub mod config;
pub mod context;
pub mod data_types;
pub mod ddl;
pub mod frontend;
pub mod identifier;
pub mod repository;
pub mod schema;
pub mod translate;
pub mod utils;
