pub mod client;
pub mod errors;
pub mod source;

pub use client::StatsApiClient;
pub use errors::ApiError;
pub use source::DataSource;
