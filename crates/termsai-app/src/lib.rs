pub mod controller;
pub mod session;
pub mod state;
pub mod terminal;
pub mod ticker;
pub mod view;

pub use controller::Controller;
pub use state::GenerationState;
pub use view::{RecordingView, View, ViewEvent};
