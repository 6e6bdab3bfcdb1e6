pub mod dispatch;
pub mod state;

pub use state::AppState;
