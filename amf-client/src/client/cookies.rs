//! Cookies set by the broker, replayed on later calls of the same session
use log::trace;

/// A minimal cookie store for a single gateway
///
/// Attributes such as `Path` or `Domain` are not tracked, every cookie is sent back to the
/// gateway that set it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    /// Remember the cookie of a `Set-Cookie` header value
    ///
    /// An empty value or `Max-Age=0` deletes the cookie.
    pub fn store(&mut self, set_cookie: &str) {
        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            return;
        }

        let expired = parts.any(|attribute| {
            attribute
                .split_once('=')
                .is_some_and(|(k, v)| k.trim().eq_ignore_ascii_case("max-age") && v.trim() == "0")
        });

        self.cookies.retain(|(n, _)| n != name);
        if !expired && !value.is_empty() {
            trace!("Storing cookie {}", name);
            self.cookies.push((name.to_string(), value.to_string()));
        }
    }

    /// The value of the `Cookie` request header, `None` when there are no cookies
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// The value of a cookie
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Forget every cookie
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Are there no cookies
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
