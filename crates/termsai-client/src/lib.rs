pub mod backend;
pub mod decode;
pub mod http;
pub mod mock;
pub mod reader;

pub use backend::{GraphBackend, ResponseBody};
pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend, Script, ScriptStep};
pub use reader::interpretations;
