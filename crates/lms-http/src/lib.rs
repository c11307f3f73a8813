pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{ApiClient, ClientConfig};
pub use error::{ApiError, Result};
pub use traits::ApiNetwork;
pub use types::{ApiRequest, ApiResponse};
