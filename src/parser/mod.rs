pub mod expiry;
pub mod nfo;

pub use expiry::{format_duration, parse_expiry};
pub use nfo::{NfoReader, SidecarReader};
