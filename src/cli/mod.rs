//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod logging;
mod version;

pub use commands::{
    CanarySubcommand, ConfigSubcommand, TemplateSubcommand, handle_canary_command,
    handle_config_command, handle_template_command, render,
};
pub use logging::init_logging;
pub use version::display_version;
