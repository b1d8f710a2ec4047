pub mod ask;
pub mod auth;
pub mod config_cmd;
pub mod run;
pub mod status;
pub mod tools;
