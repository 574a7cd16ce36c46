pub mod broker;
pub mod gemini;
pub mod http_client_factory;
pub mod mock;
pub mod observability;
pub mod persistence;
