pub mod envelope;
pub mod http;
pub mod pagination;
