//! Network classification of bookmark hosts
//!
//! Resolves a URL's host to an IPv4 address, probes reachability and places
//! the address in one of the fixed [`NetworkCategory`] buckets. Private
//! (RFC1918) ranges take precedence over VPN overlay ranges, which take
//! precedence over everything else.

use bookmark_manager_core::*;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::reachability::{HttpReachability, ReachabilityProbe};

/// Configuration for the network classifier
#[derive(Debug, Clone)]
pub struct NetworkClassifierConfig {
    /// Reachability probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// Upper bound for the DNS lookup in seconds
    pub resolve_timeout_secs: u64,
}

impl Default for NetworkClassifierConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 7,
            resolve_timeout_secs: 5,
        }
    }
}

/// How a URL's host resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    V4(Ipv4Addr),
    V6Only,
    Unresolvable,
    InvalidUrl,
}

/// Classifies hosts by address space and reachability
pub struct NetworkClassifier {
    probe: Arc<dyn ReachabilityProbe>,
    config: NetworkClassifierConfig,
}

impl NetworkClassifier {
    pub fn new() -> Self {
        Self::with_probe(Arc::new(HttpReachability::new()))
    }

    pub fn with_probe(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self::with_config(probe, NetworkClassifierConfig::default())
    }

    pub fn with_config(probe: Arc<dyn ReachabilityProbe>, config: NetworkClassifierConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &NetworkClassifierConfig {
        &self.config
    }

    /// Category and reachability of the URL's host
    ///
    /// Hosts that do not resolve to IPv4 are reported unreachable without
    /// probing.
    pub async fn classify_network(&self, url: &str) -> NetworkClassification {
        let ip = match self.resolve(url).await {
            Resolution::V4(ip) => ip,
            Resolution::V6Only => return unreachable(NetworkCategory::Ipv6Host),
            Resolution::Unresolvable => return unreachable(NetworkCategory::UnresolvableHost),
            Resolution::InvalidUrl => return unreachable(NetworkCategory::InvalidUrl),
        };

        let reachable = self
            .probe
            .is_online(url, Duration::from_secs(self.config.probe_timeout_secs))
            .await;

        let category = categorize_address(ip, reachable);
        info!("{} resolved to {} and classified as {}", url, ip, category);
        NetworkClassification { category, reachable }
    }

    /// Machine tag for the URL's category
    pub async fn network_tag(&self, url: &str) -> &'static str {
        self.classify_network(url).await.category.tag()
    }

    /// Literal addresses are used directly; names go through DNS
    pub async fn resolve(&self, url: &str) -> Resolution {
        let Some(parsed) = parse_loose(url) else {
            return Resolution::InvalidUrl;
        };

        match parsed.host() {
            Some(url::Host::Ipv4(ip)) => Resolution::V4(ip),
            Some(url::Host::Ipv6(_)) => Resolution::V6Only,
            Some(url::Host::Domain(domain)) if !domain.is_empty() => {
                let port = parsed.port_or_known_default().unwrap_or(80);
                let lookup = tokio::net::lookup_host((domain.to_string(), port));
                match tokio::time::timeout(Duration::from_secs(self.config.resolve_timeout_secs), lookup).await {
                    Ok(Ok(addrs)) => {
                        let addrs: Vec<_> = addrs.collect();
                        match addrs.iter().find_map(|a| match a.ip() {
                            IpAddr::V4(ip) => Some(ip),
                            IpAddr::V6(_) => None,
                        }) {
                            Some(ip) => Resolution::V4(ip),
                            None if !addrs.is_empty() => Resolution::V6Only,
                            None => Resolution::Unresolvable,
                        }
                    }
                    Ok(Err(e)) => {
                        debug!("DNS lookup for {} failed: {}", domain, e);
                        Resolution::Unresolvable
                    }
                    Err(_) => {
                        debug!("DNS lookup for {} timed out", domain);
                        Resolution::Unresolvable
                    }
                }
            }
            _ => Resolution::InvalidUrl,
        }
    }
}

impl Default for NetworkClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn unreachable(category: NetworkCategory) -> NetworkClassification {
    NetworkClassification { category, reachable: false }
}

fn parse_loose(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("http://{}", trimmed)).ok()?
    };
    parsed.host().is_some().then_some(parsed)
}

/// 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
pub fn is_private(ip: Ipv4Addr) -> bool {
    ip.is_private()
}

/// 100.64.0.0/10 (carrier-grade NAT space used by VPN overlays)
pub fn is_vpn(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0b1100_0000) == 64
}

/// Address-range precedence: private, then VPN, then remote
pub fn categorize_address(ip: Ipv4Addr, reachable: bool) -> NetworkCategory {
    if is_private(ip) {
        if reachable {
            NetworkCategory::Local
        } else {
            NetworkCategory::LocalOffline
        }
    } else if is_vpn(ip) {
        NetworkCategory::Vpn
    } else {
        NetworkCategory::Remote
    }
}

/// True when the URL's host is a literal IPv4 or IPv6 address
pub fn is_ip_host(url: &str) -> bool {
    matches!(
        parse_loose(url).as_ref().and_then(|u| u.host()),
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProbe {
        online: bool,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn new(online: bool) -> Arc<Self> {
            Arc::new(Self { online, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl ReachabilityProbe for FakeProbe {
        async fn is_online(&self, _url: &str, _timeout: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.online
        }
    }

    #[test]
    fn test_address_ranges() {
        assert!(is_private(Ipv4Addr::new(10, 1, 2, 3)));
        assert!(is_private(Ipv4Addr::new(172, 31, 0, 1)));
        assert!(!is_private(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(is_private(Ipv4Addr::new(192, 168, 0, 10)));
        assert!(is_vpn(Ipv4Addr::new(100, 64, 0, 1)));
        assert!(is_vpn(Ipv4Addr::new(100, 127, 255, 254)));
        assert!(!is_vpn(Ipv4Addr::new(100, 128, 0, 1)));
        assert!(!is_vpn(Ipv4Addr::new(100, 63, 0, 1)));
    }

    #[test]
    fn test_is_ip_host() {
        assert!(is_ip_host("http://192.168.1.1:8080/"));
        assert!(is_ip_host("http://[::1]/"));
        assert!(is_ip_host("10.0.0.1"));
        assert!(!is_ip_host("https://example.com"));
        assert!(!is_ip_host(""));
    }

    #[tokio::test]
    async fn test_private_host_offline_and_online() {
        let offline = NetworkClassifier::with_probe(FakeProbe::new(false));
        let result = offline.classify_network("http://192.168.1.10:8080/").await;
        assert_eq!(result, NetworkClassification { category: NetworkCategory::LocalOffline, reachable: false });

        let online = NetworkClassifier::with_probe(FakeProbe::new(true));
        let result = online.classify_network("http://10.0.0.5/").await;
        assert_eq!(result, NetworkClassification { category: NetworkCategory::Local, reachable: true });
        assert_eq!(online.network_tag("http://10.0.0.5/").await, "local-server");
    }

    #[tokio::test]
    async fn test_vpn_and_remote_ignore_reachability() {
        let classifier = NetworkClassifier::with_probe(FakeProbe::new(false));
        assert_eq!(classifier.classify_network("http://100.100.1.1").await.category, NetworkCategory::Vpn);
        assert_eq!(classifier.classify_network("http://203.0.113.5").await.category, NetworkCategory::Remote);
    }

    #[tokio::test]
    async fn test_non_ipv4_hosts_skip_probe() {
        let probe = FakeProbe::new(true);
        let classifier = NetworkClassifier::with_probe(probe.clone());

        let v6 = classifier.classify_network("http://[fd00::1]/").await;
        assert_eq!(v6, NetworkClassification { category: NetworkCategory::Ipv6Host, reachable: false });

        let invalid = classifier.classify_network("http://").await;
        assert_eq!(invalid.category, NetworkCategory::InvalidUrl);

        let unresolvable = classifier.classify_network("http://no-such-host.invalid/").await;
        assert_eq!(unresolvable.category, NetworkCategory::UnresolvableHost);
        assert!(!unresolvable.reachable);

        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
