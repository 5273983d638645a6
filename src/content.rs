//! Content categories and the per-operation policy governing them.
//!
//! Every public storage operation resolves its category through
//! [`ContentType::parse_for`] before touching the network, so an unsupported
//! value never reaches the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Classification of a stored object.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Installation media.
    Iso,
    /// Container template archive.
    Vztmpl,
    /// Configuration snippet such as cloud-init user data.
    Snippet,
    /// Backup archive produced by `vzdump`.
    Backup,
}

/// Operation families with distinct content policies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Moves bytes into storage: upload, download-by-URL and secure copy.
    Transfer,
    /// Reads or removes an existing volume.
    Access,
}

const TRANSFER_CAPABLE: &[ContentType] =
    &[ContentType::Iso, ContentType::Vztmpl, ContentType::Snippet];

const ACCESSIBLE: &[ContentType] = &[
    ContentType::Iso,
    ContentType::Vztmpl,
    ContentType::Snippet,
    ContentType::Backup,
];

impl Operation {
    /// Categories permitted for this operation family.
    #[must_use]
    pub const fn allowed(self) -> &'static [ContentType] {
        match self {
            Self::Transfer => TRANSFER_CAPABLE,
            Self::Access => ACCESSIBLE,
        }
    }

    fn describe_allowed(self) -> String {
        self.allowed()
            .iter()
            .map(|content| content.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl ContentType {
    /// Wire name used for the `content` form field and in request paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iso => "iso",
            Self::Vztmpl => "vztmpl",
            Self::Snippet => "snippet",
            Self::Backup => "backup",
        }
    }

    /// Segment used inside a volume identifier (`storage:segment/name`).
    ///
    /// Snippets live under the plural `snippets` segment; every other category
    /// reuses its wire name.
    #[must_use]
    pub const fn volume_segment(self) -> &'static str {
        match self {
            Self::Snippet => "snippets",
            other => other.as_str(),
        }
    }

    /// Parses `value` and checks it against the policy for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContentType`] when the value is unknown
    /// or not permitted for the operation.
    pub fn parse_for(operation: Operation, value: &str) -> Result<Self, StorageError> {
        operation
            .allowed()
            .iter()
            .copied()
            .find(|content| content.as_str() == value)
            .ok_or_else(|| StorageError::InvalidContentType {
                value: value.to_owned(),
                allowed: operation.describe_allowed(),
            })
    }

    /// Checks an already typed category against the policy for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContentType`] when the category is not
    /// permitted for the operation.
    pub fn ensure_allowed(self, operation: Operation) -> Result<Self, StorageError> {
        Self::parse_for(operation, self.as_str())
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("iso", ContentType::Iso)]
    #[case("vztmpl", ContentType::Vztmpl)]
    #[case("snippet", ContentType::Snippet)]
    fn transfer_accepts_upload_capable_categories(
        #[case] value: &str,
        #[case] expected: ContentType,
    ) {
        let parsed = ContentType::parse_for(Operation::Transfer, value).expect("allowed");
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("backup")]
    #[case("images")]
    #[case("rootdir")]
    #[case("")]
    #[case("ISO")]
    #[case(" iso")]
    #[case("iso\n")]
    fn transfer_rejects_other_categories(#[case] value: &str) {
        let err = ContentType::parse_for(Operation::Transfer, value).expect_err("rejected");
        let StorageError::InvalidContentType { value: offending, allowed } = err else {
            panic!("expected InvalidContentType, got {err:?}");
        };
        assert_eq!(offending, value);
        assert_eq!(allowed, "iso, vztmpl, snippet");
    }

    #[test]
    fn access_permits_backup() {
        let parsed = ContentType::parse_for(Operation::Access, "backup").expect("allowed");
        assert_eq!(parsed, ContentType::Backup);
    }

    #[rstest]
    #[case("images")]
    #[case("snippets")]
    #[case("vzdump")]
    fn access_rejects_unknown_categories(#[case] value: &str) {
        let err = ContentType::parse_for(Operation::Access, value).expect_err("rejected");
        assert!(
            err.to_string().contains("iso, vztmpl, snippet, backup"),
            "error should list the allowed set: {err}"
        );
    }

    #[test]
    fn ensure_allowed_rejects_backup_transfer() {
        let result = ContentType::Backup.ensure_allowed(Operation::Transfer);
        assert!(matches!(
            result,
            Err(StorageError::InvalidContentType { .. })
        ));
    }

    #[test]
    fn snippet_segment_is_plural() {
        assert_eq!(ContentType::Snippet.volume_segment(), "snippets");
        assert_eq!(ContentType::Iso.volume_segment(), "iso");
    }
}
