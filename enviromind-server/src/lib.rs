pub mod cors;
pub mod http;
