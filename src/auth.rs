/*
 * auth.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, a socket-level HTTP(S) client engine.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP authentication: WWW-Authenticate challenge parsing and the Basic
//! and Digest (RFC 2617) credential computations.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};

use crate::error::{Result, WebError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

/// A parsed WWW-Authenticate challenge.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    pub realm: Option<String>,
    pub nonce: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
    pub qop: Option<String>,
}

pub(crate) fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Random hex token for cnonce and boundary generation.
pub(crate) fn random_md5_token() -> String {
    md5_hex(rand::random::<u32>().to_string().as_bytes())
}

/// Splits a challenge's option list on unquoted commas, folding names to
/// lower case. Quotes toggle rather than nest.
fn parse_options(s: &str) -> Vec<(String, String)> {
    let mut options = Vec::new();
    let mut name = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut quoted = false;
    let mut push = |name: &mut String, value: &mut String| {
        let n = name.trim().to_ascii_lowercase();
        if !n.is_empty() {
            options.push((n, value.trim().to_string()));
        }
        name.clear();
        value.clear();
    };
    for c in s.chars() {
        match c {
            '"' => quoted = !quoted,
            '=' if !quoted && !in_value => in_value = true,
            ',' if !quoted => {
                push(&mut name, &mut value);
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => name.push(c),
        }
    }
    push(&mut name, &mut value);
    options
}

/// Parses a WWW-Authenticate header value. Schemes other than Basic and
/// Digest yield None.
pub fn parse_challenge(header: &str) -> Option<AuthChallenge> {
    let header = header.trim();
    let (word, rest) = match header.find(char::is_whitespace) {
        Some(pos) => (&header[..pos], &header[pos + 1..]),
        None => (header, ""),
    };
    let scheme = match word.to_ascii_lowercase().as_str() {
        "basic" => AuthScheme::Basic,
        "digest" => AuthScheme::Digest,
        _ => return None,
    };
    let mut challenge = AuthChallenge {
        scheme,
        realm: None,
        nonce: None,
        opaque: None,
        algorithm: None,
        qop: None,
    };
    for (name, value) in parse_options(rest) {
        match name.as_str() {
            "realm" => challenge.realm = Some(value),
            "nonce" => challenge.nonce = Some(value),
            "opaque" => challenge.opaque = Some(value),
            "algorithm" => challenge.algorithm = Some(value),
            "qop" => challenge.qop = Some(value),
            _ => {}
        }
    }
    Some(challenge)
}

/// `Authorization` header value for HTTP Basic.
pub fn basic_authorization(login: &str, password: &str) -> String {
    format!(
        "Basic {}",
        BASE64.encode(format!("{}:{}", login, password))
    )
}

/// `Authorization` header value for HTTP Digest. The serialized request
/// body is needed for qop=auth-int.
pub fn digest_authorization(
    challenge: &AuthChallenge,
    login: &str,
    password: &str,
    body: &[u8],
    method: &str,
    uri: &str,
) -> Result<String> {
    digest_with_cnonce(challenge, login, password, body, method, uri, &random_md5_token())
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| WebError::DigestOptions(format!("missing {}", what)))
}

fn digest_with_cnonce(
    challenge: &AuthChallenge,
    login: &str,
    password: &str,
    body: &[u8],
    method: &str,
    uri: &str,
    cnonce: &str,
) -> Result<String> {
    let realm = required(&challenge.realm, "realm")?;
    let nonce = required(&challenge.nonce, "nonce")?;
    let opaque = required(&challenge.opaque, "opaque")?;

    let algorithm = challenge
        .algorithm
        .as_deref()
        .unwrap_or("md5")
        .to_ascii_lowercase();
    let session = match algorithm.as_str() {
        "md5" => false,
        "md5-sess" => true,
        other => {
            return Err(WebError::DigestOptions(format!(
                "unsupported algorithm: {}",
                other
            )))
        }
    };
    let qop = match challenge.qop.as_deref().map(str::to_ascii_lowercase) {
        None => None,
        Some(q) if q == "auth" || q == "auth-int" => Some(q),
        Some(other) => {
            return Err(WebError::DigestOptions(format!(
                "unsupported qop: {}",
                other
            )))
        }
    };

    let mut ha1 = md5_hex(format!("{}:{}:{}", login, realm, password).as_bytes());
    if session {
        ha1 = md5_hex(format!("{}:{}:{}", ha1, nonce, cnonce).as_bytes());
    }
    let ha2 = match qop.as_deref() {
        Some("auth-int") => md5_hex(format!("{}:{}:{}", method, uri, md5_hex(body)).as_bytes()),
        _ => md5_hex(format!("{}:{}", method, uri).as_bytes()),
    };
    let response = match &qop {
        Some(qop) => md5_hex(
            format!("{}:{}:00000001:{}:{}:{}", ha1, nonce, cnonce, qop, ha2).as_bytes(),
        ),
        None => md5_hex(format!("{}:{}:{}", ha1, nonce, ha2).as_bytes()),
    };

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", response=\"{}\", uri=\"{}\", opaque=\"{}\"",
        login, realm, nonce, response, uri, opaque,
    );
    if let Some(qop) = &qop {
        header.push_str(&format!(", qop={}, nc=00000001", qop));
    }
    if qop.is_some() || session {
        header.push_str(&format!(", cnonce=\"{}\"", cnonce));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc2617_challenge() -> AuthChallenge {
        AuthChallenge {
            scheme: AuthScheme::Digest,
            realm: Some("testrealm@host.com".into()),
            nonce: Some("dcd98b7102dd2f0e8b11d0f600bfb0c093".into()),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".into()),
            algorithm: None,
            qop: Some("auth".into()),
        }
    }

    #[test]
    fn parses_digest_challenge() {
        let ch = parse_challenge(
            "Digest realm=\"testrealm@host.com\", qop=\"auth,auth-int\", \
             nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", \
             opaque=\"5ccc069c403ebaf9f0171e9517f40e41\"",
        )
        .unwrap();
        assert_eq!(ch.scheme, AuthScheme::Digest);
        assert_eq!(ch.realm.as_deref(), Some("testrealm@host.com"));
        assert_eq!(ch.qop.as_deref(), Some("auth,auth-int"));
        assert_eq!(
            ch.nonce.as_deref(),
            Some("dcd98b7102dd2f0e8b11d0f600bfb0c093")
        );
    }

    #[test]
    fn parses_basic_challenge_and_rejects_unknown_schemes() {
        let ch = parse_challenge("Basic realm=\"WallyWorld\"").unwrap();
        assert_eq!(ch.scheme, AuthScheme::Basic);
        assert_eq!(ch.realm.as_deref(), Some("WallyWorld"));
        assert!(parse_challenge("Bearer realm=\"x\"").is_none());
    }

    #[test]
    fn quoted_commas_do_not_split_options() {
        let ch = parse_challenge("Digest realm=\"a, b\", nonce=\"n\"").unwrap();
        assert_eq!(ch.realm.as_deref(), Some("a, b"));
        assert_eq!(ch.nonce.as_deref(), Some("n"));
    }

    #[test]
    fn basic_credentials() {
        assert_eq!(
            basic_authorization("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn rfc2617_digest_vector() {
        let header = digest_with_cnonce(
            &rfc2617_challenge(),
            "Mufasa",
            "Circle Of Life",
            b"",
            "GET",
            "/dir/index.html",
            "0a4f113b",
        )
        .unwrap();
        assert!(header.contains("response=\"6629fae49393a05397450978507c4ef1\""));
        assert!(header.contains("username=\"Mufasa\""));
        assert!(header.contains("qop=auth, nc=00000001"));
        assert!(header.contains("cnonce=\"0a4f113b\""));
    }

    #[test]
    fn digest_requires_challenge_fields() {
        let mut ch = rfc2617_challenge();
        ch.opaque = None;
        assert!(matches!(
            digest_authorization(&ch, "u", "p", b"", "GET", "/"),
            Err(WebError::DigestOptions(_))
        ));
        let mut ch = rfc2617_challenge();
        ch.algorithm = Some("sha-256".into());
        assert!(digest_authorization(&ch, "u", "p", b"", "GET", "/").is_err());
        let mut ch = rfc2617_challenge();
        ch.qop = Some("auth-conf".into());
        assert!(digest_authorization(&ch, "u", "p", b"", "GET", "/").is_err());
    }

    #[test]
    fn digest_without_qop_omits_counter_fields() {
        let mut ch = rfc2617_challenge();
        ch.realm = Some("R".into());
        ch.nonce = Some("N".into());
        ch.opaque = Some("O".into());
        ch.qop = None;
        let header = digest_with_cnonce(&ch, "u", "p", b"", "GET", "/x", "c").unwrap();
        let ha1 = md5_hex(b"u:R:p");
        let ha2 = md5_hex(b"GET:/x");
        let expected = md5_hex(format!("{}:N:{}", ha1, ha2).as_bytes());
        assert!(header.contains(&format!("response=\"{}\"", expected)));
        assert!(!header.contains("qop="));
        assert!(!header.contains("nc="));
        assert!(!header.contains("cnonce="));
    }

    #[test]
    fn session_algorithm_folds_nonces_into_ha1() {
        let mut ch = rfc2617_challenge();
        ch.algorithm = Some("MD5-sess".into());
        ch.qop = None;
        let header =
            digest_with_cnonce(&ch, "Mufasa", "Circle Of Life", b"", "GET", "/", "0a4f113b")
                .unwrap();
        let ha1 = md5_hex(b"Mufasa:testrealm@host.com:Circle Of Life");
        let ha1 = md5_hex(
            format!("{}:dcd98b7102dd2f0e8b11d0f600bfb0c093:0a4f113b", ha1).as_bytes(),
        );
        let ha2 = md5_hex(b"GET:/");
        let expected = md5_hex(
            format!("{}:dcd98b7102dd2f0e8b11d0f600bfb0c093:{}", ha1, ha2).as_bytes(),
        );
        assert!(header.contains(&format!("response=\"{}\"", expected)));
        assert!(header.contains("cnonce=\"0a4f113b\""));
    }

    #[test]
    fn auth_int_hashes_the_body() {
        let mut ch = rfc2617_challenge();
        ch.qop = Some("auth-int".into());
        let with_body =
            digest_with_cnonce(&ch, "u", "p", b"payload", "POST", "/x", "c").unwrap();
        let without_body = digest_with_cnonce(&ch, "u", "p", b"", "POST", "/x", "c").unwrap();
        assert_ne!(with_body, without_body);
        assert!(with_body.contains("qop=auth-int"));
    }
}
