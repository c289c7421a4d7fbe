mod commands;
mod layout;
mod wall;

pub use commands::{HELP, ViewerCommand};
pub use layout::{DEFAULT_WIDTH, GridLayout};
pub use wall::Viewer;
