// Pellet Server client
//
// Discovers a server's knowledge bases and capabilities from its JSON
// document and exposes each capability as a typed proxy with synchronous
// and callback-based operations.

pub mod builder;
pub mod config;
pub mod knowledge_base;
pub mod logging;
pub mod registry;
pub mod server;
pub mod services;
pub mod session;

pub use config::ClientConfig;
pub use knowledge_base::KnowledgeBase;
pub use registry::{CapabilityRegistry, Scope, ServiceFactory};
pub use server::Server;
pub use services::{
    downcast, Capability, Classify, Consistency, Explain, KbDiscovery, PsDiscovery, Query,
    Realize, Search, Service, ServiceContext, ServiceCore,
};
pub use session::{RequestTask, Session};

pub use pellet_core::{
    mime, parse_method, Callback, Endpoint, FnCallback, Graph, Method, MimeType, PelletError,
    QueryResult, ResultCallback, ResultSet, SearchResult, Solution, TaskHandle, TaskState, Term,
    Url,
};
