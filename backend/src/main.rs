use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use sampah_api::config::Config;
use sampah_api::context::AppContext;
use sampah_api::inference::ModelInference;
use sampah_api::models::ReferenceTable;
use sampah_api::{routes, storage};

fn build_context(config: &Config) -> anyhow::Result<AppContext> {
    let references = match &config.reference_path {
        Some(path) => ReferenceTable::load(path)?,
        None => ReferenceTable::builtin()?,
    };
    info!("📚 Table de référence: {} classes", references.len());

    let model = ModelInference::load(&config.model_path).map_err(|e| {
        e.context(format!("chargement du modèle {}", config.model_path.display()))
    })?;
    info!("✅ Modèle ONNX chargé: {}", config.model_path.display());

    let store = storage::from_config(config)?;
    info!("🪣 Stockage: {}", store.backend());

    Ok(AppContext::new(Arc::new(model), store, references)?
        .with_max_upload_bytes(config.max_upload_bytes))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let config = Config::parse();
    info!("🚀 Démarrage de l'API de classification des déchets");

    let context = match build_context(&config) {
        Ok(context) => context,
        Err(e) => {
            error!("❌ {:#}", e);
            return Err(std::io::Error::other(format!("démarrage impossible: {:#}", e)));
        }
    };
    let context = web::Data::new(context);

    let bind_address = format!("{}:{}", config.host, config.port);
    info!("🌐 Serveur démarré sur: http://{}", bind_address);
    info!("👷 Workers: {}", config.workers);
    info!("🔧 Endpoints:");
    info!("   GET  /               - Vérification santé");
    info!("   POST /predict_image  - Classification d'une image");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(context.clone())
            .configure(routes::configure)
    })
    .workers(config.workers)
    .bind(&bind_address)?
    .run()
    .await
}
