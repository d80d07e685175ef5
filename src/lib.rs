//! dumptruck: accepts SMTP sessions from anyone who is not on a DNS
//! blocklist, answers with canned replies, and writes the raw session to
//! disk. It never relays or delivers anything.

pub mod address;
pub mod capture;
pub mod command;
pub mod config;
pub mod error;
pub mod line;
pub mod logger;
pub mod reputation;
pub mod server;
pub mod session;
pub mod sink;

pub use config::Config;
pub use error::{Error, Result};
pub use logger::Logger;
pub use server::Dumptruck;
