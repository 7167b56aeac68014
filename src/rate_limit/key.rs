use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use sha2::{Digest, Sha256};

/// Maps a request to the string its quota is tracked under.
pub type KeyFn = Arc<dyn Fn(&Request<Body>) -> String + Send + Sync>;

/// Identifier a client submitted in a login-style body (e-mail or username),
/// placed in the request extensions by `middleware::capture_identity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedIdentity(pub String);

/// Client address: `x-real-ip`, then the first entry of `x-forwarded-for`,
/// then the socket peer.
pub fn client_address(req: &Request<Body>) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(peer.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub fn by_address() -> KeyFn {
    Arc::new(client_address)
}

/// Address plus a digest of the submitted identifier, so one address cannot
/// lock out every account and one account cannot be hammered from one address.
pub fn by_address_and_identity() -> KeyFn {
    Arc::new(|req: &Request<Body>| {
        let address = client_address(req);
        match req.extensions().get::<SubmittedIdentity>() {
            Some(SubmittedIdentity(id)) => {
                format!("{}:{:x}", address, Sha256::digest(id.as_bytes()))
            }
            None => format!("{}:anonymous", address),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/login")
    }

    #[test]
    fn prefers_real_ip_header() {
        let req = request()
            .header("x-real-ip", "10.0.0.1")
            .header("x-forwarded-for", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&req), "10.0.0.1");
    }

    #[test]
    fn falls_back_to_first_forwarded_entry() {
        let req = request()
            .header("x-forwarded-for", " , 203.0.113.7, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&req), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let mut req = request().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4242))));
        assert_eq!(client_address(&req), "192.168.1.9");
    }

    #[test]
    fn unknown_without_any_source() {
        let req = request().body(Body::empty()).unwrap();
        assert_eq!(client_address(&req), "unknown");
    }

    #[test]
    fn identity_key_hashes_the_identifier() {
        let key_fn = by_address_and_identity();
        let mut req = request()
            .header("x-real-ip", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(key_fn(&req), "10.0.0.1:anonymous");

        req.extensions_mut()
            .insert(SubmittedIdentity("alice@example.com".into()));
        let key = key_fn(&req);
        assert!(key.starts_with("10.0.0.1:"));
        assert!(!key.contains("alice"));
        assert_eq!(key.len(), "10.0.0.1:".len() + 64);
    }
}
