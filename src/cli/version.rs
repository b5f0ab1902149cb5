//! Version command handler

use crate::services::progressive_delivery::VERSION;

/// Display version information
pub fn display_version() {
    println!("canary-fleet {}", VERSION);
    println!("  {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("  License: {}", env!("CARGO_PKG_LICENSE"));
}
