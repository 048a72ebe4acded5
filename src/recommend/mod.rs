pub mod engine;
pub mod handlers;
pub mod types;

pub use engine::*;
pub use handlers::*;
pub use types::*;
