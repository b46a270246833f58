use std::sync::{Arc, Mutex};

use actix_web::web;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::application::SheetImportUseCase;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::storage::ensure_upload_dir;
use crate::interfaces::http::{add_log, start_server, HttpState, LogEntry};

pub fn run() -> std::io::Result<()> {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
            error!(error = %err, "Failed to load configuration");
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err));
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    actix_web::rt::System::new().block_on(serve(config))
}

pub async fn serve(config: AppConfig) -> std::io::Result<()> {
    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));

    let upload_dir = ensure_upload_dir(&config.upload_dir).map_err(|err| {
        error!(
            error = %err,
            upload_dir = %config.upload_dir.display(),
            "Failed to create upload dir"
        );
        err
    })?;

    let mapping = config
        .field_mapping()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let import = SheetImportUseCase::new(Arc::new(mapping));

    let state = web::Data::new(HttpState::new(
        import,
        logs.clone(),
        upload_dir,
        config.max_upload_bytes,
    ));

    let server = start_server(state, &config)?;
    info!(
        host = %config.host,
        port = config.port,
        max_upload_bytes = config.max_upload_bytes,
        mapped_headers = config.mapping.len(),
        "Sheet intake server listening"
    );
    add_log(
        &logs,
        "INFO",
        "Server",
        &format!("Listening on {}:{}", config.host, config.port),
    );

    server.await
}
