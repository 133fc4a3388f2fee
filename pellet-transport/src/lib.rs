pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod transport;

pub use http::ReqwestTransport;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
