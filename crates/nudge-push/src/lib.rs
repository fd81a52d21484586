pub mod dispatcher;
pub mod error;
pub mod payload;
pub mod registry;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, RegistryError, TransportError};
pub use registry::Registry;
pub use transport::{PushTransport, WebPushTransport};
