pub mod auth;
pub mod sheets;
pub mod stripe;
pub mod types;

pub use auth::*;
pub use sheets::*;
pub use stripe::*;
