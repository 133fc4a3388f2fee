// Pellet Server client core
//
// Endpoints, content types, the error taxonomy, response decoders and the
// task executor shared by the transport and client crates.

pub mod decode;
pub mod endpoint;
pub mod error;
pub mod mime;
pub mod model;
pub mod task;

pub use decode::{ResponseDecoder, StandardDecoder};
pub use endpoint::{expand_query_template, parse_method, strip_query_template, Endpoint};
pub use error::{ErrorKind, PelletError};
pub use mime::MimeType;
pub use model::{Graph, QueryResult, ResultSet, SearchResult, Solution, Term};
pub use task::{
    Callback, ExecutorConfig, FnCallback, ResultCallback, Task, TaskExecutor, TaskHandle,
    TaskState,
};

// Re-exported so downstream crates name the same types
pub use http::Method;
pub use url::Url;
