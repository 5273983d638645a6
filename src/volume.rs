//! Volume identifiers and the volume records returned by storage lookups.
//!
//! A volume identifier has the shape `storage:segment/name`, for example
//! `local:iso/ubuntu.iso` or `snippets:snippets/user-data.yaml`. The API
//! usually echoes it, but some content endpoints omit it; in that case it is
//! synthesized here from the pool, the content category and the basename of
//! the volume path. This is the only place identifiers are derived locally.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer};

use crate::content::ContentType;
use crate::error::StorageError;

/// Parsed `storage:segment/name` volume identifier.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VolumeId {
    storage: String,
    segment: String,
    name: String,
}

impl VolumeId {
    /// Builds an identifier for `name` of the given category on `storage`.
    #[must_use]
    pub fn new(storage: impl Into<String>, content: ContentType, name: impl Into<String>) -> Self {
        Self {
            storage: storage.into(),
            segment: content.volume_segment().to_owned(),
            name: name.into(),
        }
    }

    /// Derives an identifier from a filesystem path or bare file name by
    /// keeping only its final component.
    ///
    /// Applying this to the rendered name of an identifier it produced yields
    /// the same identifier again.
    #[must_use]
    pub fn synthesize(storage: &str, content: ContentType, path_or_name: &str) -> Self {
        Self::new(storage, content, basename(path_or_name))
    }

    /// Storage pool component.
    #[must_use]
    pub fn storage(&self) -> &str {
        &self.storage
    }

    /// Segment component (`iso`, `vztmpl`, `backup`, `snippets`, ...).
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Volume name component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content category implied by the segment, when it is one this crate
    /// manages.
    #[must_use]
    pub fn content_type(&self) -> Option<ContentType> {
        [
            ContentType::Iso,
            ContentType::Vztmpl,
            ContentType::Snippet,
            ContentType::Backup,
        ]
        .into_iter()
        .find(|content| content.volume_segment() == self.segment)
    }

    /// Location of the volume on a directory-backed pool rooted at `base`.
    ///
    /// Returns `None` for segments outside the managed categories.
    #[must_use]
    pub fn path_under(&self, base: &Utf8Path) -> Option<Utf8PathBuf> {
        let subdir = match self.content_type()? {
            ContentType::Iso => "template/iso",
            ContentType::Vztmpl => "template/cache",
            ContentType::Backup => "dump",
            ContentType::Snippet => "snippets",
        };
        Some(base.join(subdir).join(&self.name))
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.storage, self.segment, self.name)
    }
}

impl FromStr for VolumeId {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidVolumeId(value.to_owned());
        let (storage, rest) = value.split_once(':').ok_or_else(invalid)?;
        let (segment, name) = rest.split_once('/').ok_or_else(invalid)?;
        if storage.is_empty() || segment.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            storage: storage.to_owned(),
            segment: segment.to_owned(),
            name: name.to_owned(),
        })
    }
}

/// Final `/`-separated component of `path`, ignoring trailing separators.
#[must_use]
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// A stored object on a node's storage pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    /// Content category the volume was fetched as.
    pub content: ContentType,
    /// Node owning the storage pool.
    pub node: String,
    /// Storage pool holding the volume.
    pub storage: String,
    /// Canonical identifier; empty when unknown.
    pub volid: String,
    /// Filesystem path on the node; empty when unknown.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Bytes used on disk.
    pub used: u64,
    /// On-disk format reported by the API, if any.
    pub format: Option<String>,
    /// Fully qualified retrieval URL; only populated for snippets.
    pub url: Option<String>,
}

impl Volume {
    /// Fills in the identifier when the API omitted it.
    ///
    /// The identifier is derived from the path when known and from
    /// `name_hint` otherwise. A non-empty identifier is never replaced.
    pub fn ensure_volid(&mut self, name_hint: &str) {
        if !self.volid.is_empty() {
            return;
        }
        let source = if self.path.is_empty() {
            name_hint
        } else {
            self.path.as_str()
        };
        self.volid = VolumeId::synthesize(&self.storage, self.content, source).to_string();
    }

    /// Identifier used to address the volume in a delete request.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingVolumeReference`] when neither the
    /// identifier nor the path is known, or when the path names no file.
    pub fn delete_target(&self) -> Result<String, StorageError> {
        if !self.volid.is_empty() {
            return Ok(self.volid.clone());
        }
        match basename(&self.path) {
            "" | "." | ".." => Err(StorageError::MissingVolumeReference),
            name => Ok(VolumeId::new(self.storage.as_str(), self.content, name).to_string()),
        }
    }
}

/// Volume attributes as returned by the content endpoints.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub(crate) struct VolumeInfo {
    #[serde(default)]
    pub volid: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub used: u64,
    #[serde(default)]
    pub format: Option<String>,
}

impl VolumeInfo {
    pub(crate) fn into_volume(self, content: ContentType, node: &str, storage: &str) -> Volume {
        Volume {
            content,
            node: node.to_owned(),
            storage: storage.to_owned(),
            volid: self.volid.unwrap_or_default(),
            path: self.path.unwrap_or_default(),
            size: self.size,
            used: self.used,
            format: self.format,
            url: None,
        }
    }
}

// Sizes arrive as JSON numbers from most endpoints and as strings from others.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Raw::Number(value)) => Ok(value),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(0),
        Some(Raw::Text(text)) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn volume(volid: &str, path: &str) -> Volume {
        Volume {
            content: ContentType::Iso,
            node: String::from("pve1"),
            storage: String::from("local"),
            volid: volid.to_owned(),
            path: path.to_owned(),
            size: 0,
            used: 0,
            format: None,
            url: None,
        }
    }

    #[test]
    fn synthesize_uses_basename_of_path() {
        let id = VolumeId::synthesize(
            "local",
            ContentType::Iso,
            "/var/lib/vz/template/iso/ubuntu.iso",
        );
        assert_eq!(id.to_string(), "local:iso/ubuntu.iso");
    }

    #[test]
    fn synthesize_is_idempotent() {
        let first = VolumeId::synthesize("local", ContentType::Vztmpl, "/a/b/debian.tar.zst");
        let second = VolumeId::synthesize("local", ContentType::Vztmpl, first.name());
        assert_eq!(first, second);
    }

    #[rstest]
    #[case("local:iso/ubuntu.iso", "local", "iso", "ubuntu.iso")]
    #[case("snippets:snippets/user.yaml", "snippets", "snippets", "user.yaml")]
    #[case("nfs:backup/dir/vzdump.tar", "nfs", "backup", "dir/vzdump.tar")]
    fn parse_splits_components(
        #[case] raw: &str,
        #[case] storage: &str,
        #[case] segment: &str,
        #[case] name: &str,
    ) {
        let id: VolumeId = raw.parse().expect("valid identifier");
        assert_eq!(id.storage(), storage);
        assert_eq!(id.segment(), segment);
        assert_eq!(id.name(), name);
        assert_eq!(id.to_string(), raw);
    }

    #[rstest]
    #[case("")]
    #[case("local")]
    #[case("local:iso")]
    #[case(":iso/a")]
    #[case("local:/a")]
    #[case("local:iso/")]
    fn parse_rejects_malformed(#[case] raw: &str) {
        let err = raw.parse::<VolumeId>().expect_err("malformed");
        assert_eq!(err, StorageError::InvalidVolumeId(raw.to_owned()));
    }

    #[test]
    fn path_under_maps_directory_layout() {
        let base = Utf8Path::new("/var/lib/vz");
        let cases = [
            ("local:iso/a.iso", "/var/lib/vz/template/iso/a.iso"),
            ("local:vztmpl/b.tar.zst", "/var/lib/vz/template/cache/b.tar.zst"),
            ("local:backup/c.vma", "/var/lib/vz/dump/c.vma"),
            ("snippets:snippets/d.yaml", "/var/lib/vz/snippets/d.yaml"),
        ];
        for (raw, expected) in cases {
            let id: VolumeId = raw.parse().expect("valid identifier");
            assert_eq!(id.path_under(base), Some(Utf8PathBuf::from(expected)));
        }
        let disk: VolumeId = "local:100/vm-100-disk-0.qcow2".parse().expect("valid");
        assert_eq!(disk.path_under(base), None);
    }

    #[test]
    fn ensure_volid_keeps_existing_identifier() {
        let mut vol = volume("local:iso/original.iso", "/x/other.iso");
        vol.ensure_volid("other.iso");
        assert_eq!(vol.volid, "local:iso/original.iso");
    }

    #[test]
    fn ensure_volid_prefers_path_over_name() {
        let mut vol = volume("", "/var/lib/vz/template/iso/from-path.iso");
        vol.ensure_volid("from-name.iso");
        assert_eq!(vol.volid, "local:iso/from-path.iso");
        vol.ensure_volid("from-name.iso");
        assert_eq!(vol.volid, "local:iso/from-path.iso");
    }

    #[test]
    fn ensure_volid_falls_back_to_name() {
        let mut vol = volume("", "");
        vol.ensure_volid("ubuntu.iso");
        assert_eq!(vol.volid, "local:iso/ubuntu.iso");
    }

    #[test]
    fn delete_target_requires_reference() {
        assert_eq!(
            volume("", "").delete_target(),
            Err(StorageError::MissingVolumeReference)
        );
        assert_eq!(
            volume("", "/var/lib/vz/template/iso/x.iso").delete_target(),
            Ok(String::from("local:iso/x.iso"))
        );
        assert_eq!(
            volume("local:iso/y.iso", "").delete_target(),
            Ok(String::from("local:iso/y.iso"))
        );
    }

    #[rstest]
    #[case("/")]
    #[case("//")]
    #[case("..")]
    #[case("/var/lib/vz/..")]
    #[case(".")]
    fn delete_target_rejects_paths_without_file_name(#[case] path: &str) {
        assert_eq!(
            volume("", path).delete_target(),
            Err(StorageError::MissingVolumeReference)
        );
    }

    #[test]
    fn volume_info_accepts_string_sizes() {
        let info: VolumeInfo = serde_json::from_value(json!({
            "path": "/var/lib/vz/template/iso/a.iso",
            "size": "1024",
            "used": 512,
            "format": "iso"
        }))
        .expect("decode");
        assert_eq!(info.size, 1024);
        assert_eq!(info.used, 512);
        assert_eq!(info.volid, None);
    }

    #[test]
    fn volume_info_defaults_missing_sizes() {
        let info: VolumeInfo =
            serde_json::from_value(json!({ "volid": "local:iso/a.iso", "size": null }))
                .expect("decode");
        assert_eq!(info.size, 0);
        assert_eq!(info.used, 0);
    }

    #[test]
    fn volume_info_rejects_non_numeric_size() {
        let result = serde_json::from_value::<VolumeInfo>(json!({ "size": "lots" }));
        assert!(result.is_err());
    }
}
