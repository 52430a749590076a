pub mod models;
pub mod records;
