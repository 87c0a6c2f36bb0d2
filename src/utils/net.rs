use std::net::SocketAddr;

/// accept an address either like 127.0.0.1:3000 or http://registry:3000/
pub(crate) fn http_base(addr: &str) -> String {
    // Strip existing "http://" or "https://" prefixes if duplicated.
    let normalized = addr.trim_start_matches("http://").trim_start_matches("https://");
    format!("http://{}", normalized.trim_end_matches('/'))
}

/// Base url a listener is reachable at, preferring the advertised hostname
/// over a wildcard bind address.
pub(crate) fn advertised_base(
    scheme: &str,
    hostname: &str,
    listen: SocketAddr,
) -> String {
    if listen.ip().is_unspecified() {
        format!("{}://{}:{}", scheme, hostname, listen.port())
    } else {
        format!("{}://{}", scheme, listen)
    }
}
