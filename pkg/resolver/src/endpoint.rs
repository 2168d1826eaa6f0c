use std::cmp::Ordering;
use std::fmt;

/// spec.md §3 "Endpoint". Identity is `(protocol, host, port, path)`;
/// `mastery_level` participates only in ranking.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub mastery_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    File,
    Remote,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::File => "file",
            Protocol::Remote => "remote",
        })
    }
}

impl Endpoint {
    fn identity(&self) -> (u8, &str, u16, &str) {
        (
            match self.protocol {
                Protocol::File => 0,
                Protocol::Remote => 1,
            },
            &self.host,
            self.port,
            &self.path,
        )
    }

    /// `protocol://host:port/path`; local endpoints use `file` with
    /// host/port ignored (spec.md §6 "Endpoint string").
    pub fn to_uri_string(&self) -> String {
        match self.protocol {
            Protocol::File => format!("file://{}", self.path),
            Protocol::Remote => format!("remote://{}:{}/{}", self.host, self.port, self.path),
        }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}
impl Eq for Endpoint {}

/// Identity order, matching `PartialEq`/`Eq` (spec.md §3: "mastery_level
/// participates in ranking, not identity"). Candidate ranking by mastery is
/// done separately by the caller (`ResolverEntry::collect`), not via `Ord`.
impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}
impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_mastery_level() {
        let a = Endpoint { protocol: Protocol::Remote, host: "h".into(), port: 1, path: "p".into(), mastery_level: 0 };
        let mut b = a.clone();
        b.mastery_level = 9;
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_ignores_mastery_level() {
        let mut low = Endpoint { protocol: Protocol::Remote, host: "a".into(), port: 1, path: "p".into(), mastery_level: 0 };
        let mut high = low.clone();
        high.mastery_level = 5;
        assert_eq!(low.cmp(&high), Ordering::Equal);
        low.host = "b".into();
        assert_eq!(low.cmp(&high), Ordering::Greater);
    }
}
