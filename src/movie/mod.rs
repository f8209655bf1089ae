pub mod handlers;
pub mod provider;
pub mod recommend;
pub mod types;

pub use handlers::*;
pub use provider::*;
pub use types::*;
