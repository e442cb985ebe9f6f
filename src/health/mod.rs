pub mod handlers;
pub mod state;

pub use handlers::*;
pub use state::*;
