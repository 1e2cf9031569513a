//! File-backed key/value store.
//!
//! One file per key inside a directory. Keys are percent-encoded into file
//! names so any logical key (including server-assigned conversation ids) maps
//! to a single safe path component. Writes go to a temporary file in the same
//! directory and are renamed over the target, so a crash never leaves a
//! half-written value behind.

use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use chatwire_core::persistence::KvBackend;
use chatwire_types::error::PersistenceError;

#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }
}

/// Map a key to a file name: ASCII alphanumerics, `-` and `_` pass through,
/// every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    if encoded.is_empty() {
        encoded.push('%');
    }
    encoded
}

impl KvBackend for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        tracing::trace!(key, bytes = value.len(), "value written");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_core::persistence::{KvGateway, PersistenceGateway};
    use chatwire_types::conversation::{Message, Sender};
    use tempfile::TempDir;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("chat_messages_s-1"), "chat_messages_s-1");
        assert_eq!(encode_key("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_eq!(encode_key("a b"), "a%20b");
        assert_eq!(encode_key(""), "%");
    }

    #[test]
    fn test_set_get_delete() {
        let tmp = TempDir::new().unwrap();
        let kv = FileKv::open(tmp.path().join("store")).unwrap();

        assert_eq!(kv.get("token").unwrap(), None);
        kv.set("token", "abc").unwrap();
        kv.set("token", "def").unwrap();
        assert_eq!(kv.get("token").unwrap().as_deref(), Some("def"));

        kv.delete("token").unwrap();
        kv.delete("token").unwrap();
        assert_eq!(kv.get("token").unwrap(), None);
    }

    #[test]
    fn test_keys_with_path_characters_stay_inside_dir() {
        let tmp = TempDir::new().unwrap();
        let kv = FileKv::open(tmp.path()).unwrap();
        kv.set("chat_messages_a/b", "x").unwrap();

        let entries: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["chat_messages_a%2Fb".to_string()]);
        assert_eq!(kv.get("chat_messages_a/b").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_gateway_over_files_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let messages = vec![Message::new(Sender::User, "persist me")];
        {
            let gateway = KvGateway::new(FileKv::open(tmp.path()).unwrap());
            gateway.write_messages("s-1", &messages).unwrap();
            gateway.write_active_id(Some("s-1")).unwrap();
        }

        let gateway = KvGateway::new(FileKv::open(tmp.path()).unwrap());
        assert_eq!(gateway.read_messages("s-1").unwrap(), messages);
        assert_eq!(gateway.read_active_id().unwrap().as_deref(), Some("s-1"));
    }
}
