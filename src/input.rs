//! Provides a means to read, parse and hold configuration options for scans.
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Worker count used when the configured value is zero or negative.
pub const DEFAULT_ROUTINES: i32 = 200;

/// Handshake round trips per endpoint when the configured value is zero or negative.
pub const DEFAULT_PING_TIMES: i32 = 10;

/// Candidate cap applied after shuffling, unless `--all-mode` is set.
pub const DEFAULT_MAX_SCAN_COUNT: usize = 5000;

/// Highest port probed in `--full` mode.
pub const MAX_PORT_RANGE: u16 = 10000;

/// Upper delay bound meaning "no upper bound".
pub const MAX_DELAY: Duration = Duration::from_millis(9999);

/// Lower delay bound meaning "no lower bound".
pub const MIN_DELAY: Duration = Duration::ZERO;

/// Loss-rate ceiling meaning "keep everything".
pub const MAX_LOSS_RATE: f32 = 1.0;

/// Ports the WARP service is known to answer on. Probing these instead of the
/// whole range keeps the default candidate product small.
pub const COMMON_WARP_PORTS: [u16; 54] = [
    500, 854, 859, 864, 878, 880, 890, 891, 894, 903, 908, 928, 934, 939, 942, 943, 945, 946, 955,
    968, 987, 988, 1002, 1010, 1014, 1018, 1070, 1074, 1180, 1387, 1701, 1843, 2371, 2408, 2506,
    3138, 3476, 3581, 3854, 4177, 4198, 4233, 4500, 5279, 5956, 7103, 7152, 7156, 7281, 7559, 8319,
    8742, 8854, 8886,
];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "warpscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Cloudflare WARP endpoint scanner.
/// Sends WireGuard handshake-initiation datagrams to candidate (IP, port)
/// pairs and ranks the endpoints that answer by packet loss and latency.
pub struct Opts {
    /// A comma-delimited list of CIDRs or IPs to be scanned. Entries without
    /// a prefix length are treated as /32 (IPv4) or /128 (IPv6).
    #[arg(long = "ip")]
    pub ip: Option<String>,

    /// A newline-delimited file of CIDRs or IPs to be scanned. Ignored when
    /// --ip is given.
    #[arg(short, long)]
    pub file: Option<String>,

    /// Scan the built-in WARP IPv6 ranges instead of the IPv4 ones when no
    /// addresses are given.
    #[arg(long)]
    pub ipv6: bool,

    /// The number of concurrent probe workers.
    /// If set to 0 or below, warpscan will correct it to 200.
    #[arg(short = 'n', long, default_value = "200", allow_hyphen_values = true)]
    pub routines: i32,

    /// Handshake round trips per endpoint.
    /// If set to 0 or below, warpscan will correct it to 10.
    #[arg(short = 't', long, default_value = "10", allow_hyphen_values = true)]
    pub ping_times: i32,

    /// Probe every port from 1 to 10000 instead of the curated WARP port list.
    #[arg(long)]
    pub full: bool,

    /// The maximum number of candidates kept after shuffling.
    #[arg(long, default_value = "5000")]
    pub max_scan_count: usize,

    /// Disable the candidate cap and scan the whole shuffled product.
    #[arg(long)]
    pub all_mode: bool,

    /// Base64-encoded 32-byte WireGuard private key. When given, the probe
    /// datagram is a freshly built handshake initiation instead of the fixed
    /// template.
    #[arg(long)]
    pub private_key: Option<String>,

    /// Base64-encoded 32-byte public key of the remote peer. Defaults to the
    /// well-known WARP public key. Only meaningful with --private-key.
    #[arg(long)]
    pub public_key: Option<String>,

    /// Reserved-field override as a 3-element JSON array, e.g. [1,2,3].
    /// Requires --private-key.
    #[arg(long)]
    pub reserved: Option<String>,

    /// Only keep endpoints with an average delay at or below this bound, in milliseconds.
    #[arg(long, default_value = "300")]
    pub max_delay: u64,

    /// Only keep endpoints with an average delay at or above this bound, in milliseconds.
    #[arg(long, default_value = "0")]
    pub min_delay: u64,

    /// Only keep endpoints with a loss rate at or below this bound, from 0.0 to 1.0.
    #[arg(long, default_value = "1.0")]
    pub max_loss_rate: f32,

    /// The CSV file results are written to. Pass an empty string to skip the file.
    #[arg(short, long, default_value = "result.csv")]
    pub output: String,

    /// How many results to print to the console. 0 prints nothing.
    #[arg(short, long, default_value = "10")]
    pub print_num: usize,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// Greppable mode. Only output the results. No banner, no progress bar.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,
}

impl Opts {
    #[cfg(not(tarpaulin_include))]
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Reads the command line arguments into an Opts struct and merge
    /// values found within the user configuration file.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            routines,
            ping_times,
            full,
            max_scan_count,
            all_mode,
            ipv6,
            max_delay,
            min_delay,
            max_loss_rate,
            output,
            print_num,
            greppable,
            accessible
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(ip, file, private_key, public_key, reserved, ulimit);
    }

    /// Worker count with the zero-or-negative coercion applied.
    #[must_use]
    pub fn effective_routines(&self) -> usize {
        let routines = if self.routines <= 0 {
            DEFAULT_ROUTINES
        } else {
            self.routines
        };
        usize::try_from(routines).unwrap_or(DEFAULT_ROUTINES as usize)
    }

    /// Round trips per endpoint with the zero-or-negative coercion applied.
    #[must_use]
    pub fn effective_ping_times(&self) -> usize {
        let times = if self.ping_times <= 0 {
            DEFAULT_PING_TIMES
        } else {
            self.ping_times
        };
        usize::try_from(times).unwrap_or(DEFAULT_PING_TIMES as usize)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay)
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay)
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            ip: None,
            file: None,
            ipv6: false,
            routines: 0,
            ping_times: 0,
            full: false,
            max_scan_count: DEFAULT_MAX_SCAN_COUNT,
            all_mode: false,
            private_key: None,
            public_key: None,
            reserved: None,
            max_delay: 300,
            min_delay: 0,
            max_loss_rate: MAX_LOSS_RATE,
            output: String::new(),
            print_num: 10,
            ulimit: None,
            greppable: true,
            accessible: false,
            no_config: true,
            config_path: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[derive(Debug, Deserialize)]
pub struct Config {
    ip: Option<String>,
    file: Option<String>,
    ipv6: Option<bool>,
    routines: Option<i32>,
    ping_times: Option<i32>,
    full: Option<bool>,
    max_scan_count: Option<usize>,
    all_mode: Option<bool>,
    private_key: Option<String>,
    public_key: Option<String>,
    reserved: Option<String>,
    max_delay: Option<u64>,
    min_delay: Option<u64>,
    max_loss_rate: Option<f32>,
    output: Option<String>,
    print_num: Option<usize>,
    ulimit: Option<u64>,
    greppable: Option<bool>,
    accessible: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// ip = "162.159.192.0/24"
    /// routines = 200
    /// ping_times = 10
    /// max_loss_rate = 0.2
    /// output = "result.csv"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Self {
        let mut content = String::new();
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if config_path.exists() {
            content = match fs::read_to_string(config_path) {
                Ok(content) => content,
                Err(_) => String::new(),
            }
        }

        let config: Config = match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                println!("Found {e} in configuration file.\nAborting scan.\n");
                std::process::exit(1);
            }
        };

        config
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> PathBuf {
    let Some(mut config_path) = dirs::home_dir() else {
        panic!("Could not infer config file path.");
    };
    config_path.push(".warpscan.toml");
    config_path
}
