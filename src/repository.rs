pub mod interface;
pub mod postgres;
pub mod statements;
