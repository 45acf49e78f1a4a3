//! Publisher implementations

pub mod http;
pub mod mock;

pub use http::{HttpConnector, HttpPublisher};
pub use mock::{MockConnector, MockPublisher, PublishCall};
