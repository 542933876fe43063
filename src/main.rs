//! warpscan binary: wires flag parsing, address expansion, probing and
//! output together.
#![allow(clippy::doc_markdown)]

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use log::{debug, warn};
use rlimit::{setrlimit, Resource};

use warpscan::address::build_candidates;
use warpscan::handshake::HandshakeCodec;
use warpscan::input::{Config, Opts};
use warpscan::output::{export_csv, print_results};
use warpscan::scanner::Scanner;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone());
    opts.merge(&config);
    debug!("Main() `opts` arguments are {opts:?}");

    if !opts.greppable {
        print_banner(opts.accessible);
    }

    if let Some(limit) = opts.ulimit {
        adjust_ulimit_size(limit);
    }

    // All fatal configuration errors surface here, before any network I/O.
    let codec = Arc::new(HandshakeCodec::from_opts(&opts)?);
    let candidates = build_candidates(&opts)?;

    let results = Scanner::new(candidates, codec, &opts).run().await;
    let results = results
        .filter_delay(opts.min_delay(), opts.max_delay())
        .filter_loss_rate(opts.max_loss_rate);

    export_csv(&results, &opts.output)?;
    print_results(&results, opts.print_num, &opts.output, opts.accessible);

    Ok(())
}

fn print_banner(accessible: bool) {
    let banner = format!("warpscan {}", env!("CARGO_PKG_VERSION"));
    if accessible {
        println!("{banner}\n");
    } else {
        println!("{}\n", banner.cyan().bold());
    }
}

fn adjust_ulimit_size(limit: u64) {
    match setrlimit(Resource::NOFILE, limit, limit) {
        Ok(()) => debug!("Automatically increasing ulimit value to {limit}."),
        Err(e) => warn!("ERROR. Failed to set ulimit value: {e}"),
    }
}
