//! Target resolution

use crate::error::{AppError, Result};
use std::net::IpAddr;

/// Resolve a host name or literal address to the first usable IP
///
/// Literal addresses never touch the resolver. `prefer_ipv4` picks an IPv4
/// address when the name has both families.
pub async fn resolve_target(target: &str, prefer_ipv4: bool) -> Result<IpAddr> {
    let target = target.trim();
    let host = target
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(target);

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == '/') {
        return Err(AppError::dns_resolution(format!("'{}' is not a valid host name", target)));
    }

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| AppError::dns_resolution(format!("Failed to resolve {}: {}", host, e)))?
        .map(|addr| addr.ip())
        .collect();

    let preferred = if prefer_ipv4 {
        addrs.iter().find(|ip| ip.is_ipv4())
    } else {
        None
    };

    preferred
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| AppError::dns_resolution(format!("{} has no addresses", host)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_literal_addresses() {
        assert_eq!(resolve_target("192.0.2.7", true).await.unwrap(), "192.0.2.7".parse::<IpAddr>().unwrap());
        assert_eq!(resolve_target(" ::1 ", true).await.unwrap(), "::1".parse::<IpAddr>().unwrap());
        assert_eq!(resolve_target("[2001:db8::1]", false).await.unwrap(), "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_localhost_resolves() {
        assert!(resolve_target("localhost", true).await.unwrap().is_loopback());
    }

    #[tokio::test]
    async fn test_invalid_names() {
        assert!(matches!(resolve_target("", true).await, Err(AppError::DnsResolution(_))));
        assert!(matches!(resolve_target("http://x/y", true).await, Err(AppError::DnsResolution(_))));
    }
}
