//! Address report printed once the public listener is open.

use std::fmt;
use std::net::IpAddr;

/// Scheme the public port is reachable with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Every URL the public port answers on: non-loopback IPv4 interfaces first,
/// then `localhost` and `127.0.0.1`.
pub fn addresses(scheme: Scheme, port: u16) -> Vec<String> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::warn!(error = %e, "Could not list network interfaces");
            Vec::new()
        }
    };

    let mut hosts: Vec<String> = interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => Some(ip.to_string()),
            IpAddr::V6(_) => None,
        })
        .collect();
    hosts.dedup();
    hosts.push("localhost".to_string());
    hosts.push("127.0.0.1".to_string());

    hosts
        .into_iter()
        .map(|host| format!("{scheme}://{host}:{port}"))
        .collect()
}

/// Print the address report to stdout.
pub fn report(urls: &[String]) {
    println!("Available on:");
    for url in urls {
        println!("  {url}");
    }
    println!("Hit CTRL-C to stop the server");
}
