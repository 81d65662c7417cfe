pub mod dgraph;
pub mod dispatcher;
pub mod message;

pub use dgraph::DGraphUpdate;
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use message::DispatchedTask;
