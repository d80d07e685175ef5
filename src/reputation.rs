//! DNS blocklist lookups for connecting peers.
//!
//! A peer is listed when `<reversed ip>.<zone>` resolves to at least one
//! address in any configured zone. Resolver failures count as "not listed",
//! so a broken resolver lets everyone through.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;

pub const DEFAULT_BLOCKLISTS: &[&str] = &[
    "zen.spamhaus.org",
    "bl.spamcop.net",
    "b.barracudacentral.org",
    "dnsbl.sorbs.net",
];

/// Forward host lookups.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Uses whatever resolver the host is configured with.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Peer classification produced once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Trusted,
    Listed { zone: String },
}

impl Verdict {
    pub fn is_listed(&self) -> bool {
        matches!(self, Verdict::Listed { .. })
    }
}

pub struct ReputationChecker {
    zones: Vec<String>,
    resolver: Arc<dyn Resolver>,
}

impl ReputationChecker {
    pub fn new<I, S>(zones: I, resolver: Arc<dyn Resolver>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let zones = zones
            .into_iter()
            .map(|zone| zone.as_ref().trim().trim_matches('.').to_string())
            .filter(|zone| !zone.is_empty())
            .collect();
        Self { zones, resolver }
    }

    pub fn with_defaults(resolver: Arc<dyn Resolver>) -> Self {
        Self::new(DEFAULT_BLOCKLISTS.iter(), resolver)
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    /// Queries the zones in order and stops at the first hit.
    pub async fn check(&self, peer: &SocketAddr) -> Verdict {
        let reversed = reverse_ip(peer.ip());
        for zone in &self.zones {
            let query = format!("{}.{}", reversed, zone);
            match self.resolver.lookup_host(&query).await {
                Ok(addrs) if !addrs.is_empty() => {
                    return Verdict::Listed { zone: zone.clone() };
                }
                _ => continue,
            }
        }
        Verdict::Trusted
    }
}

/// DNSBL form of an address: reversed octets for IPv4, reversed nibbles
/// for IPv6. IPv4-mapped IPv6 addresses are treated as IPv4.
pub fn reverse_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => reverse_octets(&v4.octets()),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => reverse_octets(&v4.octets()),
            None => v6
                .octets()
                .iter()
                .rev()
                .flat_map(|byte| [byte & 0x0f, byte >> 4])
                .map(|nibble| format!("{:x}", nibble))
                .collect::<Vec<_>>()
                .join("."),
        },
    }
}

fn reverse_octets(octets: &[u8; 4]) -> String {
    octets
        .iter()
        .rev()
        .map(|octet| octet.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubResolver {
        answers: HashMap<String, io::Result<Vec<IpAddr>>>,
        queries: Mutex<Vec<String>>,
    }

    impl StubResolver {
        fn answer(mut self, host: &str, result: io::Result<Vec<IpAddr>>) -> Self {
            self.answers.insert(host.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl Resolver for StubResolver {
        async fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>> {
            self.queries.lock().unwrap().push(host.to_string());
            match self.answers.get(host) {
                Some(Ok(addrs)) => Ok(addrs.clone()),
                Some(Err(e)) => Err(io::Error::new(e.kind(), e.to_string())),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "no such host")),
            }
        }
    }

    fn listed() -> io::Result<Vec<IpAddr>> {
        Ok(vec![IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2))])
    }

    fn peer(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 40000)
    }

    #[test]
    fn reverses_ipv4() {
        assert_eq!(reverse_ip("1.2.3.4".parse().unwrap()), "4.3.2.1");
        assert_eq!(reverse_ip("::ffff:10.0.0.1".parse().unwrap()), "1.0.0.10");
    }

    #[test]
    fn reverses_ipv6_nibbles() {
        assert_eq!(
            reverse_ip("2001:db8::1".parse().unwrap()),
            "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2"
        );
    }

    #[test]
    fn zones_are_normalised() {
        let checker = ReputationChecker::new(
            [".zen.spamhaus.org", "bl.spamcop.net.", "  "],
            Arc::new(StubResolver::default()),
        );
        assert_eq!(checker.zones(), ["zen.spamhaus.org", "bl.spamcop.net"]);
    }

    #[tokio::test]
    async fn any_zone_hit_marks_listed_and_short_circuits() {
        let resolver = Arc::new(
            StubResolver::default().answer("4.3.2.1.bl.spamcop.net", listed()),
        );
        let checker = ReputationChecker::with_defaults(resolver.clone());

        let verdict = checker.check(&peer("1.2.3.4")).await;
        assert_eq!(
            verdict,
            Verdict::Listed {
                zone: "bl.spamcop.net".to_string()
            }
        );
        assert_eq!(
            *resolver.queries.lock().unwrap(),
            vec!["4.3.2.1.zen.spamhaus.org", "4.3.2.1.bl.spamcop.net"]
        );
    }

    #[tokio::test]
    async fn unresolved_everywhere_is_trusted() {
        let resolver = Arc::new(StubResolver::default());
        let checker = ReputationChecker::with_defaults(resolver.clone());

        assert_eq!(checker.check(&peer("1.2.3.4")).await, Verdict::Trusted);
        assert_eq!(resolver.queries.lock().unwrap().len(), DEFAULT_BLOCKLISTS.len());
    }

    #[tokio::test]
    async fn resolver_errors_fail_open() {
        let resolver = StubResolver::default()
            .answer(
                "4.3.2.1.zen.spamhaus.org",
                Err(io::Error::new(io::ErrorKind::TimedOut, "resolver down")),
            )
            .answer("4.3.2.1.bl.spamcop.net", Ok(vec![]));
        let checker = ReputationChecker::with_defaults(Arc::new(resolver));

        assert!(!checker.check(&peer("1.2.3.4")).await.is_listed());
    }
}
