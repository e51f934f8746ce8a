pub mod gcs;
pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};

pub use gcs::GcsStore;
pub use local::LocalStore;

/// Préfixe des objets déposés par l'endpoint.
pub const UPLOAD_PREFIX: &str = "uploads";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub public_url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<StoredBlob>;

    fn backend(&self) -> &'static str;
}

/// `uploads/{YYYYmmddHHMMSS}_{tag}_{nom}`, avec un tag aléatoire de 8
/// caractères hexadécimaux : deux envois du même fichier dans la même
/// seconde donnent deux objets distincts.
pub fn upload_key<Tz: TimeZone>(now: &DateTime<Tz>, filename: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format_upload_key(now, rand::random::<u32>(), filename)
}

pub fn format_upload_key<Tz: TimeZone>(now: &DateTime<Tz>, tag: u32, filename: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}/{}_{:08x}_{}",
        UPLOAD_PREFIX,
        now.format("%Y%m%d%H%M%S"),
        tag,
        sanitize_filename(filename)
    )
}

/// Garde le dernier segment du nom et remplace tout caractère hors
/// `[A-Za-z0-9._-]` par `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.storage {
        StorageBackend::Gcs => Arc::new(GcsStore::new(
            &config.bucket,
            &config.credentials,
            config.storage_timeout_secs.map(Duration::from_secs),
        )?),
        StorageBackend::Local => Arc::new(LocalStore::new(&config.local_storage_dir)?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn key_is_timestamped_under_upload_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 5, 7).unwrap();
        assert_eq!(
            format_upload_key(&now, 0x1a2b, "botol.jpg"),
            "uploads/20240603090507_00001a2b_botol.jpg"
        );
    }

    #[test]
    fn same_name_in_same_second_gets_distinct_keys() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 5, 7).unwrap();
        let keys: std::collections::HashSet<String> =
            (0..64).map(|_| upload_key(&now, "botol.jpg")).collect();
        assert!(keys.len() > 1);
        for key in &keys {
            assert!(key.starts_with("uploads/20240603090507_"));
            assert!(key.ends_with("_botol.jpg"));
            assert_eq!(key.len(), "uploads/20240603090507_00000000_botol.jpg".len());
        }
    }

    #[test]
    fn filenames_cannot_escape_the_prefix() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\kaleng 1.png"), "kaleng_1.png");
        assert_eq!(sanitize_filename("sampah (2).jpeg"), "sampah__2_.jpeg");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }
}
