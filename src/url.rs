//! URL parsing, resolution and `application/x-www-form-urlencoded` query handling.

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationParts {
    pub scheme: String,
    pub has_authority: bool,
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: String,
    pub pathname: String,
    pub opaque_path: String,
    pub search: String,
    pub hash: String,
}

impl LocationParts {
    pub fn protocol(&self) -> String {
        format!("{}:", self.scheme)
    }

    pub fn host(&self) -> String {
        if self.port.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }

    /// Serialized origin, or `"null"` for URLs without a host.
    pub fn origin(&self) -> String {
        if self.has_authority && !self.hostname.is_empty() {
            format!("{}//{}", self.protocol(), self.host())
        } else {
            "null".to_string()
        }
    }

    pub fn href(&self) -> String {
        if self.has_authority {
            let path = if self.pathname.is_empty() {
                "/".to_string()
            } else {
                self.pathname.clone()
            };
            let credentials = if self.username.is_empty() && self.password.is_empty() {
                String::new()
            } else if self.password.is_empty() {
                format!("{}@", self.username)
            } else {
                format!("{}:{}@", self.username, self.password)
            };
            format!(
                "{}//{}{}{}{}{}",
                self.protocol(),
                credentials,
                self.host(),
                path,
                self.search,
                self.hash
            )
        } else {
            format!(
                "{}{}{}{}",
                self.protocol(),
                self.opaque_path,
                self.search,
                self.hash
            )
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let scheme_end = trimmed.find(':')?;
        let scheme = trimmed[..scheme_end].to_ascii_lowercase();
        if !is_valid_url_scheme(&scheme) {
            return None;
        }
        let rest = &trimmed[scheme_end + 1..];
        if let Some(without_slashes) = rest.strip_prefix("//") {
            let authority_end = without_slashes
                .find(|ch| ['/', '?', '#'].contains(&ch))
                .unwrap_or(without_slashes.len());
            let authority = &without_slashes[..authority_end];
            let tail = &without_slashes[authority_end..];
            let (username, password, hostname, port) = split_authority_components(authority);
            let (pathname, search, hash) = split_path_search_hash(tail);
            let pathname = if pathname.is_empty() {
                "/".to_string()
            } else {
                normalize_pathname(&pathname)
            };
            let port = strip_default_port(&scheme, port);
            Some(Self {
                scheme,
                has_authority: true,
                username,
                password,
                hostname: hostname.to_ascii_lowercase(),
                port,
                pathname,
                opaque_path: String::new(),
                search,
                hash,
            })
        } else {
            let (opaque_path, search, hash) = split_path_search_hash(rest);
            Some(Self {
                scheme,
                has_authority: false,
                username: String::new(),
                password: String::new(),
                hostname: String::new(),
                port: String::new(),
                pathname: String::new(),
                opaque_path,
                search,
                hash,
            })
        }
    }

    /// Query pairs of `search`, decoded.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_query_pairs(&self.search)
    }

    pub fn set_query_pairs(&mut self, pairs: &[(String, String)]) {
        self.search = ensure_search_prefix(&serialize_query_pairs(pairs));
    }

    /// The URL with its fragment removed.
    pub fn without_hash(&self) -> String {
        let mut next = self.clone();
        next.hash.clear();
        next.href()
    }
}

fn strip_default_port(scheme: &str, port: String) -> String {
    let default_port = match scheme {
        "http" | "ws" => "80",
        "https" | "wss" => "443",
        "ftp" => "21",
        _ => return port,
    };
    if port == default_port { String::new() } else { port }
}

pub(crate) fn is_valid_url_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
}

pub(crate) fn split_hostname_and_port(authority: &str) -> (String, String) {
    if authority.is_empty() {
        return (String::new(), String::new());
    }

    if let Some(rest) = authority.strip_prefix('[') {
        if let Some(end_idx) = rest.find(']') {
            let hostname = authority[..end_idx + 2].to_string();
            let suffix = &authority[end_idx + 2..];
            if let Some(port) = suffix.strip_prefix(':') {
                return (hostname, port.to_string());
            }
            return (hostname, String::new());
        }
    }

    if let Some(idx) = authority.rfind(':') {
        let hostname = &authority[..idx];
        let port = &authority[idx + 1..];
        if !hostname.contains(':') {
            return (hostname.to_string(), port.to_string());
        }
    }
    (authority.to_string(), String::new())
}

pub(crate) fn split_authority_components(authority: &str) -> (String, String, String, String) {
    if authority.is_empty() {
        return (String::new(), String::new(), String::new(), String::new());
    }

    let (userinfo, hostport) = if let Some(at) = authority.rfind('@') {
        (&authority[..at], &authority[at + 1..])
    } else {
        ("", authority)
    };

    let (username, password) = if userinfo.is_empty() {
        (String::new(), String::new())
    } else if let Some((username, password)) = userinfo.split_once(':') {
        (username.to_string(), password.to_string())
    } else {
        (userinfo.to_string(), String::new())
    };

    let (hostname, port) = split_hostname_and_port(hostport);
    (username, password, hostname, port)
}

pub(crate) fn split_path_search_hash(tail: &str) -> (String, String, String) {
    let mut pathname = tail;
    let mut search = "";
    let mut hash = "";

    if let Some(hash_pos) = tail.find('#') {
        pathname = &tail[..hash_pos];
        hash = &tail[hash_pos..];
    }

    if let Some(search_pos) = pathname.find('?') {
        search = &pathname[search_pos..];
        pathname = &pathname[..search_pos];
    }

    (pathname.to_string(), search.to_string(), hash.to_string())
}

pub(crate) fn normalize_pathname(pathname: &str) -> String {
    let starts_with_slash = pathname.starts_with('/');
    let ends_with_slash = (pathname.ends_with('/') && pathname.len() > 1)
        || pathname.ends_with("/.")
        || pathname.ends_with("/..");
    let mut parts = Vec::new();
    for segment in pathname.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            parts.pop();
            continue;
        }
        parts.push(segment);
    }
    let mut out = if starts_with_slash {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    };
    if out.is_empty() {
        out.push('/');
    }
    if ends_with_slash && !out.ends_with('/') {
        out.push('/');
    }
    out
}

pub(crate) fn ensure_search_prefix(value: &str) -> String {
    if value.is_empty() || value == "?" {
        String::new()
    } else if value.starts_with('?') {
        value.to_string()
    } else {
        format!("?{value}")
    }
}

pub(crate) fn ensure_hash_prefix(value: &str) -> String {
    if value.starts_with('#') {
        value.to_string()
    } else {
        format!("#{value}")
    }
}

fn resolve_against_base_parts(input: &str, base: &LocationParts) -> String {
    let input = input.trim();
    if input.is_empty() {
        return base.without_hash();
    }

    if input.starts_with("//") {
        return LocationParts::parse(&format!("{}{}", base.protocol(), input))
            .map(|parts| parts.href())
            .unwrap_or_else(|| input.to_string());
    }

    let mut next = base.clone();
    if input.starts_with('#') {
        next.hash = ensure_hash_prefix(input);
        return next.href();
    }

    if input.starts_with('?') {
        let (search, hash) = match input.find('#') {
            Some(pos) => (&input[..pos], &input[pos..]),
            None => (input, ""),
        };
        next.search = ensure_search_prefix(search);
        next.hash = hash.to_string();
        return next.href();
    }

    let mut relative = input;
    let mut next_search = String::new();
    let mut next_hash = String::new();
    if let Some(hash_pos) = relative.find('#') {
        next_hash = ensure_hash_prefix(&relative[hash_pos + 1..]);
        relative = &relative[..hash_pos];
    }
    if let Some(search_pos) = relative.find('?') {
        next_search = ensure_search_prefix(&relative[search_pos + 1..]);
        relative = &relative[..search_pos];
    }

    if relative.starts_with('/') {
        if next.has_authority {
            next.pathname = normalize_pathname(relative);
        } else {
            next.opaque_path = relative.to_string();
        }
    } else if next.has_authority {
        let base_dir = if let Some((prefix, _)) = next.pathname.rsplit_once('/') {
            if prefix.is_empty() {
                "/".to_string()
            } else {
                format!("{prefix}/")
            }
        } else {
            "/".to_string()
        };
        next.pathname = normalize_pathname(&format!("{base_dir}{relative}"));
    } else {
        next.opaque_path = relative.to_string();
    }
    next.search = next_search;
    next.hash = next_hash;
    next.href()
}

/// Resolves `input` against `base` and returns the absolute href.
pub fn resolve_url(input: &str, base: &str) -> Result<String> {
    let input = input.trim();
    if let Some(absolute) = LocationParts::parse(input) {
        return Ok(absolute.href());
    }
    let base_parts =
        LocationParts::parse(base).ok_or_else(|| Error::InvalidUrl(base.to_string()))?;
    let resolved = resolve_against_base_parts(input, &base_parts);
    LocationParts::parse(&resolved)
        .map(|parts| parts.href())
        .ok_or(Error::InvalidUrl(resolved))
}

pub fn origin_of(url: &str) -> Option<String> {
    LocationParts::parse(url).map(|parts| parts.origin())
}

pub fn same_origin(a: &str, b: &str) -> bool {
    match (origin_of(a), origin_of(b)) {
        (Some(left), Some(right)) => left != "null" && left == right,
        _ => false,
    }
}

/// True when the URL carries a fragment marker, even an empty one.
pub fn has_fragment(url: &str) -> bool {
    url.contains('#')
}

pub fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (raw_name, raw_value) = part.split_once('=').unwrap_or((part, ""));
            (
                decode_form_urlencoded_component(raw_name),
                decode_form_urlencoded_component(raw_value),
            )
        })
        .collect()
}

pub fn serialize_query_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                encode_form_urlencoded_component(name),
                encode_form_urlencoded_component(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `URLSearchParams.set`: replaces the first pair named `name`, drops the
/// rest, or appends when absent.
pub fn set_query_pair(pairs: &mut Vec<(String, String)>, name: &str, value: &str) {
    match pairs.iter().position(|(key, _)| key == name) {
        Some(first) => {
            pairs[first].1 = value.to_string();
            let mut idx = 0usize;
            pairs.retain(|(key, _)| {
                let keep = idx <= first || key != name;
                idx += 1;
                keep
            });
        }
        None => pairs.push((name.to_string(), value.to_string())),
    }
}

pub fn encode_form_urlencoded_component(src: &str) -> String {
    let mut out = String::new();
    for b in src.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(*b, b'*' | b'-' | b'.' | b'_') {
            out.push(*b as char);
        } else if *b == b' ' {
            out.push('+');
        } else {
            out.push('%');
            out.push(to_hex_upper((*b >> 4) & 0x0F));
            out.push(to_hex_upper(*b & 0x0F));
        }
    }
    out
}

/// Lenient decode: malformed escapes are kept literally.
pub fn decode_form_urlencoded_component(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (from_hex_digit(bytes[i + 1]), from_hex_digit(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn to_hex_upper(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'A' + (nibble - 10)) as char,
    }
}

fn from_hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
