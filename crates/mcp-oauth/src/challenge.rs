//! `WWW-Authenticate` and `Link` header parsing
//!
//! Authorization servers and MCP gateways advertise where to authenticate in
//! loosely standardized places. These helpers pull single values out of those
//! headers without trying to be a full RFC 7235 parser: parameter names match
//! case-insensitively, values may be quoted strings or bare tokens.

/// Extract the value of auth-param `name` from a challenge header.
///
/// Matches `name="value"` and `name=value`. The parameter name must start at a
/// boundary (start of header, whitespace or comma) so `realm` does not match
/// inside `xrealm`. Empty values are treated as absent.
pub fn auth_param(header: &str, name: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();
    let needle = format!("{}=", name.to_ascii_lowercase());

    for (idx, _) in lower.match_indices(&needle) {
        let at_boundary = header[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || c == ',');
        if !at_boundary {
            continue;
        }

        let rest = &header[idx + needle.len()..];
        let value = match rest.strip_prefix('"') {
            Some(quoted) => unquote(quoted)?,
            None => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == ',')
                    .unwrap_or(rest.len());
                rest[..end].to_string()
            }
        };

        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// Read a quoted-string body up to the closing quote, resolving `\"` escapes.
/// Returns `None` if the quote is never closed.
fn unquote(input: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => out.push(chars.next()?),
            c => out.push(c),
        }
    }
    None
}

/// Whether the challenge uses the Bearer scheme (RFC 6750).
pub fn is_bearer(header: &str) -> bool {
    header.to_ascii_lowercase().contains("bearer")
}

/// Find the target of the first `Link` entry carrying relation `rel`.
///
/// Entries look like `<https://auth.example.com/authorize>; rel="oauth2-authorize"`
/// and may be comma-separated. A `rel` attribute may list several
/// space-separated relation types.
pub fn link_with_rel(header: &str, rel: &str) -> Option<String> {
    let mut rest = header;
    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let close = after_open.find('>')?;
        let target = &after_open[..close];
        let params_and_tail = &after_open[close + 1..];
        let params = match params_and_tail.find('<') {
            Some(next) => &params_and_tail[..next],
            None => params_and_tail,
        };

        let matches_rel = auth_param(&params.replace(';', ","), "rel").is_some_and(|value| {
            value
                .split_whitespace()
                .any(|r| r.eq_ignore_ascii_case(rel))
        });
        if matches_rel && !target.is_empty() {
            return Some(target.to_string());
        }

        rest = params_and_tail;
    }
    None
}
