pub mod config;
pub mod error;
pub mod frame;
pub mod interpret;
pub mod text;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::ClientConfig;
    pub use crate::error::{Result, TermsError};
    pub use crate::frame::FrameSplitter;
    pub use crate::interpret::{interpret, Interpretation, ParseMode, FILTER_SENTINEL};
    pub use crate::types::{
        AugmentContext, ConceptCount, GraphId, GraphPayload, NetworkData, Operation, StreamEvent,
    };
}
