mod init;
mod monitor;
mod scan;
mod schedule;
mod unignore;

pub use init::cmd_init;
pub use monitor::cmd_monitor;
pub use scan::cmd_scan;
pub use schedule::cmd_schedule;
pub use unignore::cmd_unignore;
