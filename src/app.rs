use crate::{
    config::Config,
    error::Result,
    index::VectorIndex,
    ml::HuggingFaceEmbedder,
    routes::api_routes,
    services::{
        KeywordTables, OllamaGenerator, RecommendationPipeline, RecommendationService, Retriever,
    },
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::info;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        // Always bind to 0.0.0.0 for container compatibility
        let bind_address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}:{}", self.host, self.port);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        // All long-lived singletons are built once here and shared with every
        // request through web::Data; request handlers never construct their own.
        let index = VectorIndex::load(&self.config.index_path, &self.config.metadata_path)?;
        info!("Catalog index ready: {} books", index.len());

        let embedder = Arc::new(HuggingFaceEmbedder::new(&self.config)?);
        if let Err(e) = embedder.prewarm().await {
            tracing::warn!("Embedder prewarm failed, continuing cold: {}", e);
        }

        let keywords = KeywordTables::load(self.config.keyword_tables_path.as_deref())?;

        let retriever = Arc::new(Retriever::new(
            embedder,
            Arc::new(RwLock::new(index)),
            keywords,
        ));

        let generator = Arc::new(OllamaGenerator::new(&self.config)?);
        let pipeline = RecommendationPipeline::new(retriever.clone(), generator, None);

        let service = web::Data::new(RecommendationService::new(
            retriever,
            pipeline,
            Some(PathBuf::from(&self.config.interaction_log_dir)),
        ));

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(service.clone())
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
