//! Provides functions to expand CIDR/IP input into candidate UDP endpoints.
//!
//! Address sources, in order of precedence: inline `--ip` text, a
//! newline-delimited `--file`, then the built-in WARP ranges. IPv4 prefixes
//! are enumerated exhaustively; IPv6 prefixes are sampled with a bounded
//! random walk because exhaustive enumeration is intractable.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, Result};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use itertools::Itertools;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::input::{Opts, COMMON_WARP_PORTS, MAX_PORT_RANGE};

/// WARP anycast ranges scanned when no addresses are configured.
const DEFAULT_IPV4_CIDRS: [&str; 8] = [
    "162.159.192.0/24",
    "162.159.193.0/24",
    "162.159.195.0/24",
    "162.159.204.0/24",
    "188.114.96.0/24",
    "188.114.97.0/24",
    "188.114.98.0/24",
    "188.114.99.0/24",
];

const DEFAULT_IPV6_CIDRS: [&str; 2] = ["2606:4700:d0::/48", "2606:4700:d1::/48"];

/// Hard ceiling on addresses sampled from a single IPv6 prefix. The random
/// walk below terminates statistically; this cap makes the worst case finite.
const MAX_IPV6_SAMPLES: usize = 100_000;

/// Expands every configured CIDR/IP entry into concrete addresses.
///
/// Entries without a prefix length are read as `/32` (dotted-decimal) or
/// `/128` networks. Invalid syntax in any source is a fatal error.
///
/// ```rust
/// # use warpscan::input::Opts;
/// # use warpscan::address::parse_addresses;
/// let opts = Opts {
///     ip: Some("192.168.0.0/30".to_owned()),
///     ..Opts::default()
/// };
///
/// let ips = parse_addresses(&opts).unwrap();
/// assert_eq!(ips.len(), 4);
/// ```
pub fn parse_addresses(opts: &Opts) -> Result<Vec<IpAddr>> {
    let mut ips = Vec::new();

    if let Some(text) = &opts.ip {
        for entry in text.split(',') {
            expand_entry(entry, &mut ips)?;
        }
    } else if let Some(path) = &opts.file {
        let content =
            fs::read_to_string(path).with_context(|| format!("could not read {path:?}"))?;
        for entry in content.lines() {
            expand_entry(entry, &mut ips)?;
        }
    } else {
        let defaults: &[&str] = if opts.ipv6 {
            &DEFAULT_IPV6_CIDRS
        } else {
            &DEFAULT_IPV4_CIDRS
        };
        for entry in defaults {
            expand_entry(entry, &mut ips)?;
        }
    }

    debug!("Expanded address space holds {} addresses", ips.len());
    Ok(ips)
}

/// Builds the shuffled candidate endpoint list: the expanded address set
/// crossed with the port set, Fisher-Yates shuffled, then capped at
/// `max_scan_count` unless `all_mode` is set. Capping after the shuffle keeps
/// the retained subset an unbiased sample of the full product.
pub fn build_candidates(opts: &Opts) -> Result<Vec<SocketAddr>> {
    let ips = parse_addresses(opts)?;
    let ports: Vec<u16> = if opts.full {
        (1..=MAX_PORT_RANGE).collect()
    } else {
        COMMON_WARP_PORTS.to_vec()
    };

    let mut candidates: Vec<SocketAddr> = ports
        .iter()
        .cartesian_product(ips.iter())
        .map(|(&port, &ip)| SocketAddr::new(ip, port))
        .collect();

    candidates.shuffle(&mut rand::rng());

    if !opts.all_mode && candidates.len() > opts.max_scan_count {
        candidates.truncate(opts.max_scan_count);
    }

    debug!("Candidate list holds {} endpoints", candidates.len());
    Ok(candidates)
}

/// Appends `/32` or `/128` when the entry carries no prefix length.
fn normalize(entry: &str) -> String {
    if entry.contains('/') {
        entry.to_owned()
    } else if entry.contains('.') {
        format!("{entry}/32")
    } else {
        format!("{entry}/128")
    }
}

fn expand_entry(entry: &str, out: &mut Vec<IpAddr>) -> Result<()> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Ok(());
    }

    let net = IpNet::from_str(&normalize(entry))
        .with_context(|| format!("invalid CIDR or IP {entry:?}"))?;
    match net {
        IpNet::V4(net) => expand_ipv4(net, out),
        IpNet::V6(net) => sample_ipv6(net, out),
    }
    Ok(())
}

/// Exhaustively enumerates an IPv4 prefix.
///
/// Walks every /24-sized block the prefix spans and, within each, emits the
/// byte range the inverted mask allows in the final octet (clamped to 255).
/// Exact, not sampled: a /16 yields 65536 addresses.
fn expand_ipv4(net: Ipv4Net, out: &mut Vec<IpAddr>) {
    if net.prefix_len() == 32 {
        out.push(IpAddr::V4(net.addr()));
        return;
    }

    let hosts_in_block = host_span(net);
    let low = net.network().octets()[3];
    let mut block = net.network().octets();

    while net.contains(&Ipv4Addr::from(block)) {
        for i in 0..=hosts_in_block {
            out.push(IpAddr::V4(Ipv4Addr::new(
                block[0],
                block[1],
                block[2],
                low.wrapping_add(i),
            )));
        }
        // advance to the next block, carrying leftwards
        block[2] = block[2].wrapping_add(1);
        if block[2] == 0 {
            block[1] = block[1].wrapping_add(1);
            if block[1] == 0 {
                block[0] = block[0].wrapping_add(1);
                if block[0] == 0 {
                    break;
                }
            }
        }
    }
}

/// Host count covered by the final octet, derived from the inverted mask and
/// clamped to a single byte.
fn host_span(net: Ipv4Net) -> u8 {
    let inverted = !u32::from(net.netmask());
    u8::try_from(inverted.min(255)).unwrap_or(255)
}

/// Samples an IPv6 prefix with a random walk.
///
/// Each step randomizes the low 16 bits of the working address, records the
/// result, then advances the working address by a random byte increment with
/// leftward carry. Sampling stops once the walk leaves the prefix or hits
/// the per-prefix cap, so the sample size is statistical, not configured.
fn sample_ipv6(net: Ipv6Net, out: &mut Vec<IpAddr>) {
    if net.prefix_len() == 128 {
        out.push(IpAddr::V6(net.addr()));
        return;
    }

    let mut rng = rand::rng();
    let mut cur = net.network().octets();
    let mut sampled = 0;

    while sampled < MAX_IPV6_SAMPLES && net.contains(&Ipv6Addr::from(cur)) {
        cur[15] = rng.random_range(0..255);
        cur[14] = rng.random_range(0..255);
        out.push(IpAddr::V6(Ipv6Addr::from(cur)));
        sampled += 1;

        for i in (0..=13).rev() {
            let prev = cur[i];
            cur[i] = cur[i].wrapping_add(rng.random_range(0..255));
            if cur[i] >= prev {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::{IpAddr, Ipv4Addr};

    use super::{build_candidates, normalize, parse_addresses};
    use crate::input::{Opts, COMMON_WARP_PORTS};

    fn opts_with_ip(ip: &str) -> Opts {
        Opts {
            ip: Some(ip.to_owned()),
            ..Opts::default()
        }
    }

    #[test]
    fn normalize_appends_missing_prefix() {
        assert_eq!(normalize("1.2.3.4"), "1.2.3.4/32");
        assert_eq!(normalize("1.2.3.0/24"), "1.2.3.0/24");
        assert_eq!(normalize("2606:4700::"), "2606:4700::/128");
        assert_eq!(normalize("2606:4700::/32"), "2606:4700::/32");
    }

    #[test]
    fn single_ipv4_expands_to_itself() {
        let ips = parse_addresses(&opts_with_ip("188.114.96.1")).unwrap();
        assert_eq!(ips, [IpAddr::V4(Ipv4Addr::new(188, 114, 96, 1))]);
    }

    #[test]
    fn slash_24_expands_to_256_hosts() {
        let ips = parse_addresses(&opts_with_ip("162.159.192.0/24")).unwrap();
        assert_eq!(ips.len(), 256);
        assert_eq!(ips[0], IpAddr::V4(Ipv4Addr::new(162, 159, 192, 0)));
        assert_eq!(ips[255], IpAddr::V4(Ipv4Addr::new(162, 159, 192, 255)));
    }

    #[test]
    fn slash_30_expands_to_4_hosts() {
        let ips = parse_addresses(&opts_with_ip("192.168.0.0/30")).unwrap();
        assert_eq!(
            ips,
            [
                IpAddr::V4(Ipv4Addr::new(192, 168, 0, 0)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 0, 2)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 0, 3)),
            ]
        );
    }

    #[test]
    fn slash_23_spans_two_blocks() {
        let ips = parse_addresses(&opts_with_ip("10.0.0.0/23")).unwrap();
        assert_eq!(ips.len(), 512);
        assert!(ips.contains(&IpAddr::V4(Ipv4Addr::new(10, 0, 1, 255))));
    }

    #[test]
    fn inline_entries_are_comma_separated_and_trimmed() {
        let ips = parse_addresses(&opts_with_ip("127.0.0.1, 10.0.0.1,,")).unwrap();
        assert_eq!(ips.len(), 2);
    }

    #[test]
    fn invalid_entry_is_fatal() {
        assert!(parse_addresses(&opts_with_ip("300.10.1.1")).is_err());
        assert!(parse_addresses(&opts_with_ip("not-an-ip")).is_err());
    }

    #[test]
    fn single_ipv6_expands_to_itself() {
        let ips = parse_addresses(&opts_with_ip("2606:4700:d0::1")).unwrap();
        assert_eq!(ips.len(), 1);
        assert!(ips[0].is_ipv6());
    }

    #[test]
    fn ipv6_prefix_samples_within_bounds() {
        let ips = parse_addresses(&opts_with_ip("2606:4700:d0::/48")).unwrap();
        assert!(!ips.is_empty());
        let net: ipnet::Ipv6Net = "2606:4700:d0::/48".parse().unwrap();
        for ip in &ips {
            match ip {
                IpAddr::V6(v6) => assert!(net.contains(v6)),
                IpAddr::V4(_) => panic!("sampled an IPv4 address from an IPv6 prefix"),
            }
        }
    }

    #[test]
    fn file_source_is_newline_delimited() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "192.168.0.0/31").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.0.0.1").unwrap();

        let opts = Opts {
            file: Some(file.path().to_string_lossy().into_owned()),
            ..Opts::default()
        };
        let ips = parse_addresses(&opts).unwrap();
        assert_eq!(ips.len(), 3);
    }

    #[test]
    fn inline_text_takes_precedence_over_file() {
        let opts = Opts {
            ip: Some("127.0.0.1".to_owned()),
            file: Some("does-not-exist.txt".to_owned()),
            ..Opts::default()
        };
        let ips = parse_addresses(&opts).unwrap();
        assert_eq!(ips.len(), 1);
    }

    #[test]
    fn default_ranges_used_when_nothing_configured() {
        let opts = Opts {
            all_mode: true,
            ..Opts::default()
        };
        // 8 x /24 crossed with the curated ports
        let candidates = build_candidates(&opts).unwrap();
        assert_eq!(candidates.len(), 8 * 256 * COMMON_WARP_PORTS.len());
    }

    #[test]
    fn candidates_cross_addresses_with_curated_ports() {
        let opts = Opts {
            ip: Some("162.159.192.0/24".to_owned()),
            all_mode: true,
            ..Opts::default()
        };
        let candidates = build_candidates(&opts).unwrap();
        assert_eq!(candidates.len(), 256 * COMMON_WARP_PORTS.len());
    }

    #[test]
    fn candidates_are_capped_after_shuffling() {
        let opts = Opts {
            ip: Some("162.159.192.0/24".to_owned()),
            max_scan_count: 100,
            ..Opts::default()
        };
        let candidates = build_candidates(&opts).unwrap();
        assert_eq!(candidates.len(), 100);
    }

    #[test]
    fn empty_address_space_yields_no_candidates() {
        let opts = Opts {
            ip: Some(" , ".to_owned()),
            ..Opts::default()
        };
        let candidates = build_candidates(&opts).unwrap();
        assert!(candidates.is_empty());
    }
}
