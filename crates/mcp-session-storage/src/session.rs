use std::sync::OnceLock;

/// A session identifier: either echoed from the transport or generated on
/// first use and cached for the lifetime of the underlying session object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive a session id per spec §4.10: prefer the transport's session
/// header if present; otherwise generate a random id on first request and
/// cache it on the underlying session object so subsequent requests on the
/// same connection reuse it. `cache` models "cached on the underlying
/// session object" — callers hold one `OnceLock` per connection/session.
pub fn derive_session_id(header: Option<&str>, cache: &OnceLock<SessionId>) -> SessionId {
    if let Some(header) = header {
        if !header.is_empty() {
            return SessionId(header.to_string());
        }
    }
    cache.get_or_init(|| SessionId(uuid::Uuid::now_v7().to_string())).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_transport_header_when_present() {
        let cache = OnceLock::new();
        let id = derive_session_id(Some("sess-from-header"), &cache);
        assert_eq!(id.0, "sess-from-header");
    }

    #[test]
    fn generates_and_caches_id_when_header_absent() {
        let cache = OnceLock::new();
        let first = derive_session_id(None, &cache);
        let second = derive_session_id(None, &cache);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_header_falls_back_to_generation() {
        let cache = OnceLock::new();
        let id = derive_session_id(Some(""), &cache);
        assert!(!id.0.is_empty());
    }
}
