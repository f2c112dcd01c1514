//! Shared utilities for integration testing.

use std::net::TcpListener;

/// Reserve `count` distinct loopback addresses that are free right now.
///
/// All probes are held open until every port is picked, so the same port is
/// never returned twice.
pub fn free_addrs(count: usize) -> Vec<String> {
    let probes: Vec<TcpListener> = (0..count)
        .map(|_| TcpListener::bind("127.0.0.1:0").expect("bind probe listener"))
        .collect();

    probes
        .iter()
        .map(|probe| probe.local_addr().expect("probe address").to_string())
        .collect()
}
