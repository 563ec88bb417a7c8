pub mod admin;
pub mod agent;
pub mod bootstrap;
pub mod cli;
pub mod command;
pub mod context;
pub mod domain;
pub mod monitor;
pub mod notify;
pub mod parser;
pub mod registry;
pub mod storage;
pub mod util;
