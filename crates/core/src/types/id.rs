//! Newtype IDs for type-safe entity references.
//!
//! The backend hands out opaque string ids (UUIDs in practice). Use the
//! `define_id!` macro to create wrappers that prevent mixing ids of
//! different entity types.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - `new()`, `as_str()` and `From<String>`/`From<&str>`
///
/// # Example
///
/// ```rust
/// # use folio_core::define_id;
/// define_id!(PostId);
/// define_id!(AuthorId);
///
/// let post = PostId::new("p-1");
/// assert_eq!(post.as_str(), "p-1");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

define_id!(UserId);
define_id!(ResourceId);

impl ResourceId {
    /// Check that the id is safe to splice into a URL path segment.
    ///
    /// Rejects empty ids and anything containing `/`, `?`, `#`, `%` or
    /// whitespace.
    #[must_use]
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && !self
                .0
                .chars()
                .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_serde() {
        let id = UserId::new("0b5c");
        assert_eq!(id.to_string(), "0b5c");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"0b5c\"");
        let back: UserId = serde_json::from_str("\"0b5c\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_resource_id_path_safety() {
        assert!(ResourceId::new("4f1e-22").is_path_safe());
        assert!(!ResourceId::new("").is_path_safe());
        assert!(!ResourceId::new("../users").is_path_safe());
        assert!(!ResourceId::new("a?b=c").is_path_safe());
        assert!(!ResourceId::new("a b").is_path_safe());
        assert!(!ResourceId::new("%2e").is_path_safe());
    }
}
