//! Scanning helpers for the attribute remainder of a result record.
//!
//! The MI tuple grammar (bare-identifier keys, double-quoted values, nested
//! `{…}` tuples and `[…]` lists) is never materialized as a tree here; the
//! operations in this crate only ever need a named quoted value or a flat
//! list of quoted strings, so the scanners below walk the raw text and stop
//! as soon as they have what they came for.

use super::unescape::unescape_mi_string;
use crate::{DbgError, DbgResult};

// Position right after `key=` if the key occurs at an attribute boundary.
fn find_key(attrs: &str, key: &str) -> Option<usize> {
    let needle = format!("{key}=");
    let bytes = attrs.as_bytes();
    let mut from = 0;
    while let Some(rel) = attrs[from..].find(needle.as_str()) {
        let at = from + rel;
        let boundary = at == 0 || matches!(bytes[at - 1], b',' | b'{' | b'[');
        if boundary {
            return Some(at + needle.len());
        }
        from = at + needle.len();
    }
    None
}

// Reads a double-quoted string starting at `attrs[start..]`, honoring
// backslash escapes. Returns (decoded, index one past the closing quote).
fn read_quoted(attrs: &str, start: usize) -> DbgResult<(String, usize)> {
    let rest = &attrs[start..];
    if !rest.starts_with('"') {
        return Err(DbgError::Decode {
            reason: format!("expected quoted value at {rest:?}"),
        });
    }
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            let decoded = unescape_mi_string(&rest[1..i])?;
            return Ok((decoded, start + i + 1));
        }
    }
    Err(DbgError::Decode {
        reason: format!("unterminated quoted value in {attrs:?}"),
    })
}

/// Extracts the decoded value of `key="…"`, or `None` if the key is absent.
pub fn quoted_value(attrs: &str, key: &str) -> DbgResult<Option<String>> {
    match find_key(attrs, key) {
        None => Ok(None),
        Some(at) => read_quoted(attrs, at).map(|(s, _)| Some(s)),
    }
}

/// Extracts `key=["…","…",…]` as a vector of decoded strings, or `None` if
/// the key is absent.
pub fn string_list(attrs: &str, key: &str) -> DbgResult<Option<Vec<String>>> {
    let Some(at) = find_key(attrs, key) else {
        return Ok(None);
    };
    if !attrs[at..].starts_with('[') {
        return Err(DbgError::Decode {
            reason: format!("expected list for {key:?} in {attrs:?}"),
        });
    }
    let mut items = Vec::new();
    let mut pos = at + 1;
    loop {
        match attrs[pos..].chars().next() {
            Some(']') => return Ok(Some(items)),
            Some('"') => {
                let (item, next) = read_quoted(attrs, pos)?;
                items.push(item);
                pos = next;
                if attrs[pos..].starts_with(',') {
                    pos += 1;
                }
            }
            _ => {
                return Err(DbgError::Decode {
                    reason: format!("malformed list for {key:?} in {attrs:?}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{quoted_value, string_list};

    #[test]
    fn quoted_value_by_key() {
        let attrs = r#"msg="No symbol table is loaded.",code="undefined""#;
        assert_eq!(
            quoted_value(attrs, "msg").unwrap().unwrap(),
            "No symbol table is loaded."
        );
        assert_eq!(quoted_value(attrs, "code").unwrap().unwrap(), "undefined");
        assert!(quoted_value(attrs, "absent").unwrap().is_none());
    }

    #[test]
    fn quoted_value_with_escapes() {
        let attrs = r#"contents="0011",msg="say \"hi\"\n""#;
        assert_eq!(quoted_value(attrs, "msg").unwrap().unwrap(), "say \"hi\"\n");
    }

    #[test]
    fn key_must_start_an_attribute() {
        // `value=` must not be found inside `prev_value=`
        let attrs = r#"prev_value="1",value="2""#;
        assert_eq!(quoted_value(attrs, "value").unwrap().unwrap(), "2");
    }

    #[test]
    fn unterminated_value_is_a_decode_error() {
        assert!(quoted_value(r#"msg="oops"#, "msg").is_err());
    }

    #[test]
    fn string_list_by_key() {
        let attrs = r#"register-names=["rax","rbx","","rip"]"#;
        let names = string_list(attrs, "register-names").unwrap().unwrap();
        assert_eq!(names, vec!["rax", "rbx", "", "rip"]);
        assert!(string_list(attrs, "other").unwrap().is_none());
    }

    #[test]
    fn empty_string_list() {
        assert_eq!(
            string_list(r#"names=[]"#, "names").unwrap().unwrap(),
            Vec::<String>::new()
        );
    }
}
