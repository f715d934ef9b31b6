//! Command line interface

pub mod commands;

pub use commands::{
    cmd_create_key, cmd_dump, cmd_funds, cmd_list_keys, cmd_mine, cmd_validate, AppState,
    CliResult,
};
