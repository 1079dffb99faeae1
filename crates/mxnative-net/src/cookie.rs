// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cookie header model.
//
// Only what the encryption interceptor needs: request `Cookie` headers are
// plain `name=value` pairs joined by "; ", and `Set-Cookie` headers are parsed
// into a struct that can be re-emitted with the same attributes.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use mxnative_core::error::{MxNativeError, Result};

/// Separator between pairs in a request `Cookie` header.
pub const PAIR_SEPARATOR: &str = "; ";

/// IMF-fixdate, the format emitted for `Expires`.
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Legacy Netscape and asctime formats still sent by some servers.
const LEGACY_DATES: [&str; 3] = [
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%a, %d-%b-%y %H:%M:%S GMT",
    "%a %b %d %H:%M:%S %Y",
];

/// Split a request `Cookie` header into its `name=value` pairs.
pub fn request_pairs(header: &str) -> impl Iterator<Item = &str> {
    header.split(PAIR_SEPARATOR).filter(|pair| !pair.is_empty())
}

/// One parsed `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Parse a `Set-Cookie` header value. Unknown attributes are ignored.
    pub fn parse(header: &str) -> Result<Self> {
        let mut parts = header.split(';');
        let pair = parts.next().unwrap_or_default().trim();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| MxNativeError::Cookie(format!("missing '=' in {pair:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MxNativeError::Cookie("empty cookie name".into()));
        }

        let mut cookie = Self::new(name, value.trim());
        for attribute in parts {
            let attribute = attribute.trim();
            let (key, val) = match attribute.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attribute, None),
            };
            match (key.to_ascii_lowercase().as_str(), val) {
                ("domain", Some(v)) if !v.is_empty() => cookie.domain = Some(v.to_owned()),
                ("path", Some(v)) if v.starts_with('/') => cookie.path = Some(v.to_owned()),
                // Unparseable dates and ages are ignored, not fatal.
                ("expires", Some(v)) => {
                    if let Some(date) = parse_http_date(v) {
                        cookie.expires = Some(date);
                    }
                }
                ("max-age", Some(v)) => {
                    if let Ok(age) = v.parse() {
                        cookie.max_age = Some(age);
                    }
                }
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                ("samesite", Some(v)) => cookie.same_site = Some(v.to_owned()),
                _ => {}
            }
        }
        Ok(cookie)
    }

    /// A cookie of the same name, domain and path that instructs the client
    /// to drop its stored copy.
    pub fn expired(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: String::new(),
            domain: self.domain.clone(),
            path: self.path.clone(),
            expires: Some(DateTime::UNIX_EPOCH),
            max_age: Some(0),
            secure: self.secure,
            http_only: self.http_only,
            same_site: self.same_site.clone(),
        }
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(expires) = self.expires {
            write!(f, "; Expires={}", expires.format(HTTP_DATE))?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(same_site) = &self.same_site {
            write!(f, "; SameSite={same_site}")?;
        }
        Ok(())
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    // asctime pads single-digit days with a second space.
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    LEGACY_DATES
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&collapsed, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_attributes() {
        let cookie = SetCookie::parse(
            "session=abc; Path=/; Domain=app.example.com; Secure; HttpOnly; \
             Expires=Wed, 21 Oct 2026 07:28:00 GMT; SameSite=Lax",
        )
        .expect("parse");

        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert_eq!(cookie.domain.as_deref(), Some("app.example.com"));
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site.as_deref(), Some("Lax"));
        assert_eq!(
            cookie.expires,
            Some(Utc.with_ymd_and_hms(2026, 10, 21, 7, 28, 0).unwrap())
        );
    }

    #[test]
    fn legacy_expires_format() {
        let cookie =
            SetCookie::parse("id=1; expires=Wed, 21-Oct-2026 07:28:00 GMT").expect("parse");
        assert_eq!(
            cookie.expires,
            Some(Utc.with_ymd_and_hms(2026, 10, 21, 7, 28, 0).unwrap())
        );
    }

    #[test]
    fn value_may_contain_equals_and_quotes() {
        let cookie = SetCookie::parse("token=\"a=b==\"; Path=/").expect("parse");
        assert_eq!(cookie.value, "\"a=b==\"");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let original = SetCookie::parse("session=abc; Path=/api; Secure; HttpOnly").expect("parse");
        let reparsed = SetCookie::parse(&original.to_string()).expect("reparse");
        assert_eq!(original, reparsed);
    }

    #[test]
    fn expired_companion_is_in_the_past() {
        let cookie = SetCookie::parse("session=abc; Path=/; Secure").expect("parse");
        let expired = cookie.expired();
        assert_eq!(expired.name, "session");
        assert!(expired.value.is_empty());
        assert!(expired.expires.expect("expires") < Utc::now());
        assert_eq!(expired.path.as_deref(), Some("/"));
        assert!(expired.to_string().contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn asctime_expires_format() {
        let cookie = SetCookie::parse("lang=en; Expires=Sun Nov  6 08:49:37 2094").expect("parse");
        assert_eq!(
            cookie.expires,
            Some(Utc.with_ymd_and_hms(2094, 11, 6, 8, 49, 37).unwrap())
        );
    }

    #[test]
    fn malformed_headers_fail() {
        assert!(SetCookie::parse("no-equals-sign").is_err());
        assert!(SetCookie::parse("=value").is_err());
    }

    #[test]
    fn bad_expires_and_max_age_are_ignored() {
        let cookie = SetCookie::parse("a=b; Max-Age=soon; Expires=tomorrow; Path=/").expect("parse");
        assert_eq!(cookie.value, "b");
        assert_eq!(cookie.max_age, None);
        assert_eq!(cookie.expires, None);
        assert_eq!(cookie.path.as_deref(), Some("/"));
    }

    #[test]
    fn request_pairs_split_on_separator() {
        let pairs: Vec<_> = request_pairs("a=1; b=2; c=").collect();
        assert_eq!(pairs, ["a=1", "b=2", "c="]);
    }
}
