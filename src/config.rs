use std::path::PathBuf;

use crate::line::DEFAULT_LINE_CAPACITY;
use crate::reputation::DEFAULT_BLOCKLISTS;

/// Captures must be strictly larger than this to be kept.
pub const DEFAULT_MIN_CAPTURE_SIZE: u64 = 50;

/// Read-only settings shared by the listener and every session.
#[derive(Debug, Clone)]
pub struct Config {
    pub address: String,
    pub ports: Vec<u16>,
    pub hostname: String,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub spam_detection: bool,
    pub blocklists: Vec<String>,
    pub min_capture_size: u64,
    pub line_capacity: usize,
    pub unique_names: bool,
}

impl Config {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            ports: vec![25],
            hostname: "mail.lf.lc".to_string(),
            output_dir: PathBuf::from("/srv/http/maildump"),
            temp_dir: std::env::temp_dir(),
            spam_detection: true,
            blocklists: DEFAULT_BLOCKLISTS.iter().map(|zone| zone.to_string()).collect(),
            min_capture_size: DEFAULT_MIN_CAPTURE_SIZE,
            line_capacity: DEFAULT_LINE_CAPACITY,
            unique_names: false,
        }
    }
}
