pub use crate::errors::{print_error, SeahorseError, SeahorseResult};
pub use crate::management::{call_command, execute_from_command_line, CommandRegistry, ManagementUtility};

pub mod errors;
pub mod hooks;
pub mod management;
pub mod version;
