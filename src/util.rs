use std::net::{IpAddr, SocketAddr};

const ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";

/// Base64 vault key shared with the CRUD collaborators
pub fn get_encryption_key() -> Option<String> {
    std::env::var(ENCRYPTION_KEY).ok()
}

const BOT_TOKEN: &str = "TOKEN";

pub fn get_bot_token() -> Option<String> {
    std::env::var(BOT_TOKEN).ok()
}

const API_TOKEN: &str = "MONTOOL_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    std::env::var(API_TOKEN).ok().filter(|token| !token.is_empty())
}

/// Split a server address into host and port.
///
/// Accepts a bare host or IP (`default_port` applies), `host:port`,
/// `ip:port` and `[v6]:port`. Returns `None` for empty addresses or ones
/// containing whitespace.
pub fn host_and_port(address: &str, default_port: u16) -> Option<(String, u16)> {
    let address = address.trim();
    if address.is_empty() || address.contains(char::is_whitespace) {
        return None;
    }

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Some((addr.ip().to_string(), addr.port()));
    }

    let unbracketed = address
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(address);
    if let Ok(ip) = unbracketed.parse::<IpAddr>() {
        return Some((ip.to_string(), default_port));
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.contains(':') => port
            .parse::<u16>()
            .ok()
            .map(|port| (host.to_string(), port)),
        Some(_) => None,
        None => Some((address.to_string(), default_port)),
    }
}
