//! Git blob ids: the version token hosting APIs hand back for file content.

use sha1::{Digest, Sha1};

/// SHA-1 of the git object `blob <len>\0<content>`, hex encoded.
///
/// Equal to what `git hash-object` prints for the same bytes, and to the
/// `sha` field of a contents-API response for an unchanged file.
pub fn blob_id(content: &[u8]) -> String {
    let header = format!("blob {}\0", content.len());
    let mut hasher = Sha1::new();
    hasher.update(header.as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_matches_git() {
        assert_eq!(blob_id(b""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn hello_blob_matches_git() {
        // printf 'hello\n' | git hash-object --stdin
        assert_eq!(blob_id(b"hello\n"), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn different_content_different_id() {
        assert_ne!(blob_id(b"a"), blob_id(b"b"));
    }
}
