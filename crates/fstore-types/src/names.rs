//! Object name validation and label sanitization.
//!
//! Valid object names:
//! - Must be non-empty
//! - Must not start with `.`
//! - Must not contain `/` or `\`
//!
//! Handle labels are free text (typically a node name plus its id) and are
//! mapped to directory names by [`sanitize_label`]. The mapping is lossy:
//! two labels that sanitize to the same string are not told apart.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::TypeError;

/// Characters that are forbidden anywhere in an object name.
const PATH_SEPARATORS: &[char] = &['/', '\\'];

/// Characters outside the directory-safe set.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid unsafe-char pattern"));

/// The first five characters, then the first dash-separated number sequence.
static NODE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.{5}).*?(\d+(?:-\d+)+)").expect("valid node-id pattern"));

/// Validate an object name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use fstore_types::names::validate_object_name;
///
/// assert!(validate_object_name("image.png").is_ok());
/// assert!(validate_object_name(".hidden").is_err());
/// assert!(validate_object_name("dir/file").is_err());
/// ```
pub fn validate_object_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty".into(),
        });
    }

    if name.starts_with('.') {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: "must not start with '.'".into(),
        });
    }

    for ch in PATH_SEPARATORS {
        if name.contains(*ch) {
            return Err(TypeError::InvalidName {
                name: name.to_string(),
                reason: format!("must not contain path separator {ch:?}"),
            });
        }
    }

    Ok(())
}

/// Map a handle label to a string safe for use in a directory name.
///
/// Steps, in order:
/// 1. drop `(`, `)` and `-`
/// 2. replace `:` with `-`
/// 3. replace every character outside `[A-Za-z0-9_-]` with `_`
/// 4. if a dash-separated number sequence such as `0-6-4` follows the first
///    five characters, collapse everything in between: `Create_FileStore_0-6-4`
///    becomes `Creat_0-6-4`
/// 5. cap the result at `max_len` characters
pub fn sanitize_label(label: &str, max_len: usize) -> String {
    let stripped: String = label
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '-'))
        .map(|c| if c == ':' { '-' } else { c })
        .collect();
    let safe = UNSAFE_CHARS.replace_all(&stripped, "_");
    let shortened = NODE_ID.replace(&safe, "${1}_${2}");
    shortened.chars().take(max_len).collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sanitized_labels_are_directory_safe(label in ".*", max_len in 1usize..64) {
            let out = sanitize_label(&label, max_len);
            prop_assert!(out.chars().count() <= max_len);
            prop_assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }
}
