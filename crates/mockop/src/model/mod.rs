pub mod index;
pub mod invocation;
pub mod ordered;
pub mod state;

pub use index::{ResponseIndex, ResponseMeta, STDERR_BLOB, STDOUT_BLOB};
pub use invocation::CommandInvocation;
pub use ordered::OrderedMap;
pub use state::{StateConfig, StateCursor, StateDescriptor, STATE_CONFIG_VERSION};
