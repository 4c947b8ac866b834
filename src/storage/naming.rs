//! # Names
//!
//! Public namespaces and keys are `[a-zA-Z0-9]+`. Backends additionally
//! accept `_` so the reserved schema namespaces can be stored; nothing else
//! ever reaches a path or an SQL statement.

/// Whether `name` is a valid public namespace or key
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Whether `name` is safe to use as a backend identifier
pub fn is_storage_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_names() {
        assert!(is_valid_name("users"));
        assert!(is_valid_name("Users42"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("users_schema"));
        assert!(!is_valid_name("../etc"));
        assert!(!is_valid_name("a b"));
        assert!(!is_valid_name("caf\u{e9}"));
    }

    #[test]
    fn test_storage_identifiers() {
        assert!(is_storage_identifier("users_schema"));
        assert!(is_storage_identifier("_schema"));
        assert!(!is_storage_identifier("users\"; DROP TABLE x"));
        assert!(!is_storage_identifier("a/b"));
        assert!(!is_storage_identifier(""));
    }
}
