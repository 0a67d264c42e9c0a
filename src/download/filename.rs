// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Filename resolution for downloaded payloads
//!
//! Order of preference:
//! 1. RFC 5987 `filename*=UTF-8''<percent-encoded>`, percent-decoded
//! 2. plain `filename="..."` or `filename=...`, quotes stripped
//! 3. `<sanitized fallback>.<extension>`
//!
//! A failed percent-decode silently drops to step 2. Every function here is
//! pure, so resolving the same header twice gives the same name.

use lazy_static::lazy_static;
use regex::Regex;

/// Extension assumed when the server does not name the file
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Base name used when the fallback sanitizes to nothing
pub const DEFAULT_BASE_NAME: &str = "episode";

lazy_static! {
    static ref EXTENDED_FILENAME: Regex =
        Regex::new(r#"(?i)filename\*\s*=\s*UTF-8''([^;]+)"#).unwrap();
    static ref PLAIN_FILENAME: Regex =
        Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*"?([^";]+)"?"#).unwrap();
}

/// Replace `<>:"/\|?*` and control characters with `_`, then trim
pub fn sanitize_base_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Raw file name announced by a `Content-Disposition` value
///
/// Returns the name exactly as the header states it, no path handling.
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(caps) = EXTENDED_FILENAME.captures(header) {
        let encoded = caps[1].trim().trim_matches('"');
        if let Ok(decoded) = urlencoding::decode(encoded) {
            if !decoded.is_empty() {
                return Some(decoded.into_owned());
            }
        }
        // undecodable: fall through to the plain form, quotes kept as matched
        return plain_filename(header, false);
    }

    plain_filename(header, true)
}

fn plain_filename(header: &str, strip_quotes: bool) -> Option<String> {
    let caps = PLAIN_FILENAME.captures(header)?;
    let value = caps[1].trim();
    let value = if strip_quotes {
        value.replace(['\'', '"'], "")
    } else {
        value.to_string()
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Reduce a header-supplied name to a safe final path component
///
/// Directory parts are dropped so a header cannot point outside the
/// destination directory.
pub fn safe_file_name(raw: &str) -> Option<String> {
    let last = raw
        .rsplit(['/', '\\'])
        .find(|part| !part.trim().is_empty())?;
    let cleaned = sanitize_base_name(last);
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

/// File name for a payload
///
/// `fallback_base` is sanitized and gets `.{extension}` appended when the
/// header is missing or unusable.
pub fn resolve_filename(header: Option<&str>, fallback_base: &str, extension: &str) -> String {
    if let Some(name) = header
        .and_then(parse_content_disposition)
        .and_then(|raw| safe_file_name(&raw))
    {
        return name;
    }

    let base = sanitize_base_name(fallback_base);
    let base = if base.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        base
    };
    format!("{}.{}", base, extension.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_form_is_decoded() {
        let header = "attachment; filename*=UTF-8''%E6%B5%8B%E8%AF%95.mp3";
        assert_eq!(resolve_filename(Some(header), "x", "mp3"), "测试.mp3");
    }

    #[test]
    fn test_extended_form_wins_over_plain() {
        let header = "attachment; filename=\"ascii.m4a\"; filename*=UTF-8''%E8%8A%82%E7%9B%AE.m4a";
        assert_eq!(parse_content_disposition(header).as_deref(), Some("节目.m4a"));
    }

    #[test]
    fn test_plain_quoted_form() {
        let header = "attachment; filename=\"plain name.mp3\"";
        assert_eq!(resolve_filename(Some(header), "x", "mp3"), "plain name.mp3");
    }

    #[test]
    fn test_plain_unquoted_form() {
        let header = "attachment; filename=episode-42.m4a";
        assert_eq!(resolve_filename(Some(header), "x", "mp3"), "episode-42.m4a");
    }

    #[test]
    fn test_bad_percent_encoding_falls_back_to_plain() {
        // %FF is not valid UTF-8
        let header = "attachment; filename=\"fallback.mp3\"; filename*=UTF-8''%FF%FE.mp3";
        assert_eq!(parse_content_disposition(header).as_deref(), Some("fallback.mp3"));
    }

    #[test]
    fn test_no_header_uses_fallback() {
        assert_eq!(resolve_filename(None, "My Episode", "mp3"), "My Episode.mp3");
        assert_eq!(resolve_filename(Some("inline"), "My Episode", "mp3"), "My Episode.mp3");
        assert_eq!(resolve_filename(None, "  ", "mp3"), "episode.mp3");
    }

    #[test]
    fn test_sanitize_base_name() {
        assert_eq!(sanitize_base_name("A/B:C*D"), "A_B_C_D");
        assert_eq!(sanitize_base_name("  <Title> | \"Q?\"  "), "_Title_ _ _Q__");
        assert_eq!(sanitize_base_name("tab\there"), "tab_here");
    }

    #[test]
    fn test_header_paths_are_flattened() {
        let header = "attachment; filename=\"../../etc/passwd\"";
        assert_eq!(resolve_filename(Some(header), "x", "mp3"), "passwd");

        let header = "attachment; filename*=UTF-8''..%2F..%2F";
        assert_eq!(resolve_filename(Some(header), "safe", "mp3"), "safe.mp3");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let header = "attachment; filename*=UTF-8''%E6%B5%8B%E8%AF%95.mp3";
        assert_eq!(parse_content_disposition(header), parse_content_disposition(header));
    }
}
