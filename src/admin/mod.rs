pub mod authz;
pub mod handler;
pub mod http;
