//! Naming of uploads, both on local disk and in the bucket
//!
//! Each upload gets a random id so that two clients sending `scan.pdf` at the
//! same time never share a local path, a source object or an output prefix.

use crate::gcp::ObjectInfo;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File systems cap a path component at 255 bytes; the spool name adds
/// `<uuid>-` in front of the sanitized name.
const MAX_NAME_BYTES: usize = 255 - 37;
const FALLBACK_NAME: &str = "upload";

/// Identity of one uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadKey {
    id: Uuid,
    name: String,
}

impl UploadKey {
    /// New key with a random id for a client-supplied filename
    pub fn new(filename: &str) -> Self {
        Self::with_id(Uuid::new_v4(), filename)
    }

    pub fn with_id(id: Uuid, filename: &str) -> Self {
        Self {
            id,
            name: sanitize_filename(filename),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sanitized filename
    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// Spool path inside `dir`. Always a direct child of `dir`.
    pub fn local_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-{}", self.id, self.name))
    }

    /// Bucket key of the uploaded source document
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.id, self.name)
    }

    /// Prefix under which the batch job writes its result shards
    pub fn output_prefix(&self) -> String {
        format!("{}-output/", self.object_key())
    }
}

/// Reduce a client filename to a single safe path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._- ]` (and other
/// Unicode alphanumerics) become `_`, and leading dots are stripped so the
/// result is never `.`, `..` or hidden.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.');
    let mut name = String::new();
    for c in trimmed.chars() {
        if name.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        name.push(c);
    }

    if name.trim().is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// First page covered by a result shard.
///
/// Batch output objects are named `output-<first>-to-<last>.json`.
pub fn page_index(object_name: &str) -> Option<u32> {
    let file = object_name.rsplit('/').next()?;
    let rest = file.strip_prefix("output-")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Order shards by page index; names without one go last, by name
pub fn sort_by_page(objects: &mut [ObjectInfo]) {
    objects.sort_by(|a, b| {
        let (pa, pb) = (page_index(&a.name), page_index(&b.name));
        pa.is_none()
            .cmp(&pb.is_none())
            .then(pa.cmp(&pb))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(name: &str) -> ObjectInfo {
        ObjectInfo {
            name: name.to_string(),
            size: None,
        }
    }

    #[test]
    fn test_keys_keep_filename() {
        let id = Uuid::nil();
        let key = UploadKey::with_id(id, "report.pdf");
        assert_eq!(key.object_key(), format!("{}/report.pdf", id));
        assert_eq!(key.output_prefix(), format!("{}/report.pdf-output/", id));
        assert!(key.object_key().ends_with("report.pdf"));
    }

    #[test]
    fn test_same_filename_gets_distinct_keys() {
        let a = UploadKey::new("scan.pdf");
        let b = UploadKey::new("scan.pdf");
        assert_ne!(a.object_key(), b.object_key());
        assert_ne!(a.local_path(Path::new("uploads")), b.local_path(Path::new("uploads")));
    }

    #[test]
    fn test_path_traversal_is_neutralized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename(".."), FALLBACK_NAME);
        assert_eq!(sanitize_filename(".bashrc"), "bashrc");
        assert_eq!(sanitize_filename(""), FALLBACK_NAME);

        let dir = Path::new("/srv/uploads");
        let key = UploadKey::with_id(Uuid::nil(), "../../../etc/shadow");
        assert_eq!(key.local_path(dir).parent(), Some(dir));
    }

    #[test]
    fn test_odd_characters_replaced() {
        assert_eq!(sanitize_filename("my scan?.png"), "my scan_.png");
        assert_eq!(sanitize_filename("a\0b.pdf"), "a_b.pdf");
        assert_eq!(sanitize_filename("résumé.pdf"), "résumé.pdf");
    }

    #[test]
    fn test_long_names_truncated() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), MAX_NAME_BYTES);
    }

    #[test]
    fn test_multibyte_names_fit_in_one_path_component() {
        let name = format!("{}.png", "あ".repeat(100));
        let sanitized = sanitize_filename(&name);
        assert!(sanitized.len() <= MAX_NAME_BYTES);
        assert!(sanitized.starts_with("あ"));

        let key = UploadKey::new(&name);
        let path = key.local_path(Path::new("/tmp/uploads"));
        assert!(path.file_name().unwrap().len() <= 255);
    }

    #[test]
    fn test_page_index() {
        assert_eq!(page_index("k/doc.pdf-output/output-1-to-1.json"), Some(1));
        assert_eq!(page_index("k/doc.pdf-output/output-12-to-12.json"), Some(12));
        assert_eq!(page_index("k/doc.pdf-output/manifest.json"), None);
        assert_eq!(page_index("output-x-to-y.json"), None);
    }

    #[test]
    fn test_sort_is_numeric_not_lexicographic() {
        let mut objects = vec![
            obj("p/output-10-to-10.json"),
            obj("p/zz-extra.json"),
            obj("p/output-2-to-2.json"),
            obj("p/output-1-to-1.json"),
        ];
        sort_by_page(&mut objects);

        let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "p/output-1-to-1.json",
                "p/output-2-to-2.json",
                "p/output-10-to-10.json",
                "p/zz-extra.json",
            ]
        );
    }
}
