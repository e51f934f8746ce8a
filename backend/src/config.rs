use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Google Cloud Storage
    Gcs,
    /// Répertoire local
    Local,
}

/// Configuration du serveur ; chaque option peut venir de l'environnement.
#[derive(Debug, Clone, Parser)]
#[command(name = "sampah-api", version, about = "Classification d'images de déchets")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "WORKERS", default_value_t = num_cpus::get())]
    pub workers: usize,

    #[arg(long, env = "MODEL_PATH", default_value = "./model/model.onnx")]
    pub model_path: PathBuf,

    /// Table de référence JSON ; la table intégrée sinon.
    #[arg(long, env = "REFERENCE_PATH")]
    pub reference_path: Option<PathBuf>,

    #[arg(long = "storage", env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Gcs)]
    pub storage: StorageBackend,

    #[arg(long, env = "BUCKET_NAME", default_value = "cuan-sampah-bucket")]
    pub bucket: String,

    #[arg(
        long,
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        default_value = "sampah-cuan-credentials.json"
    )]
    pub credentials: PathBuf,

    #[arg(long, env = "LOCAL_STORAGE_DIR", default_value = "./uploads")]
    pub local_storage_dir: PathBuf,

    #[arg(long, env = "STORAGE_TIMEOUT_SECS")]
    pub storage_timeout_secs: Option<u64>,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}
