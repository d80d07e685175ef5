mod daemon;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use structopt::StructOpt;

use dumptruck::config::{Config, DEFAULT_MIN_CAPTURE_SIZE};
use dumptruck::line::DEFAULT_LINE_CAPACITY;
use dumptruck::reputation::DEFAULT_BLOCKLISTS;
use dumptruck::{Dumptruck, Logger};

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "dumptruck",
    about = "Accepts SMTP sessions and dumps them to disk without delivering anything"
)]
pub struct Opt {
    /// Output directory for captured sessions
    #[structopt(short = "o", long = "output", default_value = "/srv/http/maildump", parse(from_os_str))]
    pub output: PathBuf,

    /// Listening ports (can be specified multiple times, default: 25)
    #[structopt(short = "p", long = "port", default_value = "25", number_of_values = 1)]
    pub ports: Vec<u16>,

    /// Listening address (default: 0.0.0.0)
    #[structopt(short = "a", long = "address", default_value = "0.0.0.0")]
    pub address: String,

    /// Skip the DNS blocklist check
    #[structopt(long = "no-spam-check")]
    pub no_spam_check: bool,

    /// DNS blocklist zone (can be specified multiple times, replaces the defaults)
    #[structopt(long = "blocklist", number_of_values = 1)]
    pub blocklists: Vec<String>,

    /// Host name announced in the greeting
    #[structopt(long = "hostname", default_value = "mail.lf.lc")]
    pub hostname: String,

    /// Captures of this many bytes or fewer are thrown away
    #[structopt(long = "min-size")]
    pub min_size: Option<u64>,

    /// Longest line kept in a capture; the rest of a longer line is dropped
    #[structopt(long = "line-buffer")]
    pub line_buffer: Option<usize>,

    /// Directory for in-progress captures (default: system temp dir)
    #[structopt(long = "temp-dir", parse(from_os_str))]
    pub temp_dir: Option<PathBuf>,

    /// Append the connection number to file names so same-second sessions don't collide
    #[structopt(long = "unique-names")]
    pub unique_names: bool,

    /// Log file path
    #[structopt(long = "logs", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// Verbose mode - log every line exchanged with peers
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,

    /// Enable raw display (not filtered) - DANGEROUS
    #[structopt(short = "r", long = "raw")]
    pub raw_display: bool,

    /// Run as daemon
    #[structopt(short = "d", long = "daemon")]
    pub daemon: bool,

    /// PID file written in daemon mode
    #[structopt(long = "pid-file", default_value = "/tmp/dumptruck.pid", parse(from_os_str))]
    pub pid_file: PathBuf,

    /// User to switch to in daemon mode
    #[structopt(long = "user")]
    pub user: Option<String>,

    /// Group to switch to in daemon mode
    #[structopt(long = "group")]
    pub group: Option<String>,
}

impl Opt {
    fn config(&self) -> Config {
        let blocklists = if self.blocklists.is_empty() {
            DEFAULT_BLOCKLISTS.iter().map(|zone| zone.to_string()).collect()
        } else {
            self.blocklists.clone()
        };

        Config {
            address: self.address.clone(),
            ports: self.ports.clone(),
            hostname: self.hostname.clone(),
            output_dir: self.output.clone(),
            temp_dir: self.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            spam_detection: !self.no_spam_check,
            blocklists,
            min_capture_size: self.min_size.unwrap_or(DEFAULT_MIN_CAPTURE_SIZE),
            line_capacity: self.line_buffer.unwrap_or(DEFAULT_LINE_CAPACITY),
            unique_names: self.unique_names,
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    println!("==========================================");
    println!("dumptruck v{}", env!("CARGO_PKG_VERSION"));
    println!("==========================================");

    let logger = Logger::new(opt.log_file.as_deref(), opt.raw_display, opt.verbose)
        .with_context(|| format!("Failed to open log file: {:?}", opt.log_file))?;

    let server = Dumptruck::new(opt.config(), logger);
    let listeners = match server.bind() {
        Ok(listeners) => listeners,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            std::process::exit(1);
        }
    };

    println!("[INFO] Listening on {}:{:?}", server.config.address, server.config.ports);
    println!("[INFO] Spam detection: {}", server.config.spam_detection);
    if server.config.spam_detection {
        println!("[INFO] Blocklists: {:?}", server.config.blocklists);
    }
    println!("[INFO] Output directory: {:?}", server.config.output_dir);

    if opt.daemon {
        daemon::daemonize(&opt.pid_file, opt.user.as_deref(), opt.group.as_deref())?;
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(Arc::new(server).serve(listeners))?;

    Ok(())
}
