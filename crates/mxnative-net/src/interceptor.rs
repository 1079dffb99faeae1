// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cookie encryption interceptor.
//
// Cookies set by the trusted runtime host are stored on the device only in
// encrypted form. Outbound requests get their encrypted cookies decrypted
// just before they leave; inbound `Set-Cookie` headers are replaced by an
// encrypted copy plus an expired companion that erases the plain cookie.
//
// Wire format of an encrypted cookie:
//
//   MxEnc<name>="<base64 ciphertext>___enc___<base64 nonce>"
//
// Any failure to decrypt or encrypt is an error; nothing is silently dropped.

use std::future::Future;
use std::sync::Arc;

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request, Response, Uri};
use mxnative_core::config::RuntimeConfig;
use mxnative_core::error::{MxNativeError, Result};
use mxnative_security::ValueCipher;
use tracing::{debug, instrument, warn};

use crate::cookie::{PAIR_SEPARATOR, SetCookie, request_pairs};

/// Name prefix marking a cookie as encrypted.
pub const ENCRYPTED_COOKIE_PREFIX: &str = "MxEnc";

/// Separates the ciphertext from the nonce inside an encrypted cookie value.
pub const IV_DELIMITER: &str = "___enc___";

/// Encrypts and decrypts cookies exchanged with the trusted runtime host.
pub struct CookieEncryptionInterceptor {
    trusted_host: String,
    cipher: Arc<dyn ValueCipher>,
}

impl CookieEncryptionInterceptor {
    pub fn new(trusted_host: impl Into<String>, cipher: Arc<dyn ValueCipher>) -> Self {
        Self {
            trusted_host: trusted_host.into().to_ascii_lowercase(),
            cipher,
        }
    }

    /// Build an interceptor for the host of the configured runtime URL.
    pub fn from_config(config: &RuntimeConfig, cipher: Arc<dyn ValueCipher>) -> Result<Self> {
        let host = config
            .trusted_host()
            .ok_or(MxNativeError::RuntimeUrlMissing)?;
        Ok(Self::new(host, cipher))
    }

    pub fn trusted_host(&self) -> &str {
        &self.trusted_host
    }

    /// Whether traffic to `uri` is subject to cookie encryption.
    pub fn applies_to(&self, uri: &Uri) -> bool {
        uri.host().is_some_and(|host| {
            host.trim_start_matches('[')
                .trim_end_matches(']')
                .eq_ignore_ascii_case(&self.trusted_host)
        })
    }

    /// Run `proceed` with cookie transforms applied on both sides when the
    /// request targets the trusted host. Other requests pass through as-is.
    pub async fn intercept<B, R, F, Fut>(
        &self,
        mut request: Request<B>,
        proceed: F,
    ) -> Result<Response<R>>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<Response<R>>>,
    {
        if !self.applies_to(request.uri()) {
            return proceed(request).await;
        }

        self.decrypt_request(&mut request)?;
        let mut response = proceed(request).await?;
        self.encrypt_response(&mut response)?;
        Ok(response)
    }

    /// Replace the request's `Cookie` header with its decrypted form.
    ///
    /// When no encrypted cookie is present, or the rebuilt header would be
    /// blank, the request is left untouched.
    #[instrument(skip_all, fields(uri = %request.uri()))]
    pub fn decrypt_request<B>(&self, request: &mut Request<B>) -> Result<()> {
        let Some(header) = joined_cookie_header(request.headers())? else {
            return Ok(());
        };
        let Some(decrypted) = self.decrypt_cookie_header(&header)? else {
            return Ok(());
        };

        let value = HeaderValue::from_str(&decrypted)
            .map_err(|e| MxNativeError::Cookie(format!("decrypted header is invalid: {e}")))?;
        let headers = request.headers_mut();
        headers.remove(COOKIE);
        headers.insert(COOKIE, value);
        Ok(())
    }

    /// Decrypt a request `Cookie` header value.
    ///
    /// Returns `Ok(None)` when the header should be sent unchanged. Once any
    /// encrypted cookie is present, plain cookies are dropped.
    pub fn decrypt_cookie_header(&self, header: &str) -> Result<Option<String>> {
        let pairs: Vec<&str> = request_pairs(header).collect();
        if !pairs
            .iter()
            .any(|pair| pair.starts_with(ENCRYPTED_COOKIE_PREFIX))
        {
            return Ok(None);
        }

        let mut decrypted = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let Some(encrypted) = pair.strip_prefix(ENCRYPTED_COOKIE_PREFIX) else {
                continue;
            };
            let (name, value) = encrypted.split_once('=').ok_or_else(|| {
                MxNativeError::Cookie(format!("encrypted cookie {pair:?} has no value"))
            })?;
            decrypted.push(format!("{name}={}", self.decrypt_value(value)?));
        }

        let rebuilt = decrypted.join(PAIR_SEPARATOR);
        debug!(cookies = decrypted.len(), "request cookies decrypted");
        Ok((!rebuilt.trim().is_empty()).then_some(rebuilt))
    }

    /// Replace every `Set-Cookie` header with encrypted/expired pairs.
    ///
    /// Headers that do not parse as a cookie are dropped rather than passed
    /// through in plain text.
    #[instrument(skip_all, fields(status = response.status().as_u16()))]
    pub fn encrypt_response<B>(&self, response: &mut Response<B>) -> Result<()> {
        let raw = response.headers().get_all(SET_COOKIE);
        if raw.iter().next().is_none() {
            return Ok(());
        }

        let mut replacements = Vec::new();
        let mut encrypted_count = 0usize;
        for value in raw {
            let parsed = value
                .to_str()
                .map_err(|e| MxNativeError::Cookie(e.to_string()))
                .and_then(SetCookie::parse);
            let cookie = match parsed {
                Ok(cookie) => cookie,
                Err(e) => {
                    warn!(error = %e, "dropping unparseable Set-Cookie header");
                    continue;
                }
            };
            let (encrypted, expired) = self.encrypt_cookie(&cookie)?;
            replacements.push(header_value(&encrypted)?);
            replacements.push(header_value(&expired)?);
            encrypted_count += 1;
        }

        let headers = response.headers_mut();
        headers.remove(SET_COOKIE);
        for value in replacements {
            headers.append(SET_COOKIE, value);
        }
        debug!(cookies = encrypted_count, "response cookies encrypted");
        Ok(())
    }

    /// The encrypted copy of `cookie` and the expired companion erasing the
    /// plain one.
    pub fn encrypt_cookie(&self, cookie: &SetCookie) -> Result<(SetCookie, SetCookie)> {
        let sealed = self.cipher.encrypt(&cookie.value)?;
        let encrypted = SetCookie {
            name: format!("{ENCRYPTED_COOKIE_PREFIX}{}", cookie.name),
            value: format!("\"{}{IV_DELIMITER}{}\"", sealed.ciphertext, sealed.iv),
            ..cookie.clone()
        };
        Ok((encrypted, cookie.expired()))
    }

    /// Decrypt an encrypted cookie value, quoted or not.
    pub fn decrypt_value(&self, value: &str) -> Result<String> {
        let unquoted = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let (ciphertext, iv) = unquoted
            .split_once(IV_DELIMITER)
            .ok_or_else(|| MxNativeError::Cookie("encrypted cookie is missing its IV".into()))?;
        self.cipher.decrypt(ciphertext, iv)
    }
}

fn joined_cookie_header(headers: &HeaderMap) -> Result<Option<String>> {
    let values = headers
        .get_all(COOKIE)
        .iter()
        .map(|value| {
            value
                .to_str()
                .map_err(|e| MxNativeError::Cookie(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((!values.is_empty()).then(|| values.join(PAIR_SEPARATOR)))
}

fn header_value(cookie: &SetCookie) -> Result<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| MxNativeError::Cookie(format!("cannot encode {}: {e}", cookie.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxnative_security::AesGcmCipher;

    fn new_interceptor() -> CookieEncryptionInterceptor {
        let key = AesGcmCipher::generate_key().expect("key");
        let cipher = Arc::new(AesGcmCipher::new(&key).expect("cipher"));
        CookieEncryptionInterceptor::new("app.example.com", cipher)
    }

    fn encrypted_pair(interceptor: &CookieEncryptionInterceptor, name: &str, value: &str) -> String {
        let (encrypted, _) = interceptor
            .encrypt_cookie(&SetCookie::new(name, value))
            .expect("encrypt");
        format!("{}={}", encrypted.name, encrypted.value)
    }

    fn cookie_header<B>(request: &Request<B>) -> Option<&str> {
        request.headers().get(COOKIE).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn host_matching() {
        let interceptor = new_interceptor();
        assert!(interceptor.applies_to(&"https://app.example.com/xas/".parse().expect("uri")));
        assert!(interceptor.applies_to(&"https://APP.example.com:8443/".parse().expect("uri")));
        assert!(!interceptor.applies_to(&"https://cdn.example.com/".parse().expect("uri")));
        assert!(!interceptor.applies_to(&"/relative".parse().expect("uri")));
    }

    #[test]
    fn from_config_requires_runtime_url() {
        let key = AesGcmCipher::generate_key().expect("key");
        let cipher: Arc<dyn ValueCipher> = Arc::new(AesGcmCipher::new(&key).expect("cipher"));

        let missing = CookieEncryptionInterceptor::from_config(&RuntimeConfig::default(), cipher.clone());
        assert!(matches!(missing, Err(MxNativeError::RuntimeUrlMissing)));

        let config = RuntimeConfig::default().with_runtime_url("https://App.Example.com/");
        let interceptor = CookieEncryptionInterceptor::from_config(&config, cipher).expect("config");
        assert_eq!(interceptor.trusted_host(), "app.example.com");
    }

    #[test]
    fn request_cookie_is_decrypted() {
        let interceptor = new_interceptor();
        let header = encrypted_pair(&interceptor, "session", "plain-token");
        assert!(header.starts_with("MxEncsession=\""));

        let mut request = Request::get("https://app.example.com/xas/")
            .header(COOKIE, header)
            .body(())
            .expect("request");
        interceptor.decrypt_request(&mut request).expect("decrypt");

        assert_eq!(cookie_header(&request), Some("session=plain-token"));
    }

    #[test]
    fn plain_cookies_pass_through_unchanged() {
        let interceptor = new_interceptor();
        assert_eq!(interceptor.decrypt_cookie_header("a=1; b=2").expect("header"), None);
    }

    #[test]
    fn plain_cookies_are_dropped_next_to_encrypted_ones() {
        let interceptor = new_interceptor();
        let header = format!("theme=dark; {}", encrypted_pair(&interceptor, "session", "s3cr3t"));
        assert_eq!(
            interceptor.decrypt_cookie_header(&header).expect("header").as_deref(),
            Some("session=s3cr3t")
        );
    }

    #[test]
    fn undecryptable_cookie_fails_closed() {
        let interceptor = new_interceptor();
        let bogus = format!("MxEncsession=\"AAAA{IV_DELIMITER}AAAA\"");
        assert!(interceptor.decrypt_cookie_header(&bogus).is_err());
        assert!(matches!(
            interceptor.decrypt_cookie_header("MxEncsession=no-delimiter"),
            Err(MxNativeError::Cookie(_))
        ));

        let other = new_interceptor();
        let foreign = encrypted_pair(&other, "session", "x");
        assert!(interceptor.decrypt_cookie_header(&foreign).is_err());
    }

    #[test]
    fn response_cookies_are_encrypted_with_expired_companion() {
        let interceptor = new_interceptor();
        let mut response = Response::builder()
            .header(SET_COOKIE, "session=abc; Path=/")
            .header(SET_COOKIE, "xsrf=123; Path=/; Secure")
            .body(())
            .expect("response");

        interceptor.encrypt_response(&mut response).expect("encrypt");

        let headers: Vec<SetCookie> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| SetCookie::parse(v.to_str().expect("ascii")).expect("parse"))
            .collect();
        assert_eq!(headers.len(), 4);

        let encrypted = &headers[0];
        assert_eq!(encrypted.name, "MxEncsession");
        assert!(encrypted.value.starts_with('"') && encrypted.value.ends_with('"'));
        assert!(encrypted.value.contains(IV_DELIMITER));
        assert_eq!(encrypted.path.as_deref(), Some("/"));
        assert_eq!(interceptor.decrypt_value(&encrypted.value).expect("decrypt"), "abc");

        let expired = &headers[1];
        assert_eq!(expired.name, "session");
        assert!(expired.value.is_empty());
        assert!(expired.expires.expect("expires").timestamp() <= 0);

        assert_eq!(headers[2].name, "MxEncxsrf");
        assert!(headers[2].secure);
        assert_eq!(headers[3].name, "xsrf");
    }

    #[test]
    fn odd_attributes_and_bad_headers_do_not_leak_plain_cookies() {
        let interceptor = new_interceptor();
        let mut response = Response::builder()
            .header(SET_COOKIE, "lang=en; Expires=Sun Nov  6 08:49:37 2094")
            .header(SET_COOKIE, "session=abc; Max-Age=later; Path=/")
            .header(SET_COOKIE, "no-equals-sign")
            .body(())
            .expect("response");

        interceptor.encrypt_response(&mut response).expect("encrypt");

        let names: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| SetCookie::parse(v.to_str().expect("ascii")).expect("parse").name)
            .collect();
        assert_eq!(names, ["MxEnclang", "lang", "MxEncsession", "session"]);

        let lang = SetCookie::parse(
            response
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .expect("set-cookie"),
        )
        .expect("parse");
        assert!(lang.expires.is_some());
        assert_eq!(interceptor.decrypt_value(&lang.value).expect("decrypt"), "en");
    }

    #[test]
    fn response_without_cookies_is_untouched() {
        let interceptor = new_interceptor();
        let mut response = Response::new(());
        interceptor.encrypt_response(&mut response).expect("encrypt");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn intercept_round_trip_against_trusted_host() {
        let interceptor = new_interceptor();
        let stored = encrypted_pair(&interceptor, "session", "old");

        let request = Request::get("https://app.example.com/xas/")
            .header(COOKIE, stored)
            .body(())
            .expect("request");

        let response = interceptor
            .intercept(request, |sent: Request<()>| async move {
                assert_eq!(cookie_header(&sent), Some("session=old"));
                Ok::<_, MxNativeError>(Response::builder()
                    .header(SET_COOKIE, "session=new; Path=/")
                    .body(())
                    .expect("response"))
            })
            .await
            .expect("intercept");

        let first = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie");
        let cookie = SetCookie::parse(first).expect("parse");
        assert_eq!(interceptor.decrypt_value(&cookie.value).expect("decrypt"), "new");
    }

    #[tokio::test]
    async fn intercept_ignores_other_hosts() {
        let interceptor = new_interceptor();
        let request = Request::get("https://tracker.example.org/")
            .header(COOKIE, "MxEncsession=garbage")
            .body(())
            .expect("request");

        let response = interceptor
            .intercept(request, |sent: Request<()>| async move {
                assert_eq!(cookie_header(&sent), Some("MxEncsession=garbage"));
                Ok::<_, MxNativeError>(Response::builder()
                    .header(SET_COOKIE, "id=1")
                    .body(())
                    .expect("response"))
            })
            .await
            .expect("intercept");

        assert_eq!(
            response.headers().get(SET_COOKIE).and_then(|v| v.to_str().ok()),
            Some("id=1")
        );
    }
}
