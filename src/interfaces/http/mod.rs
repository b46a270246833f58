use actix_cors::Cors;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, ResponseError};
use chrono::Local;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

use crate::application::SheetImportUseCase;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::spreadsheet::SheetFormat;
use crate::infrastructure::storage::TempUpload;

/// Multipart part that carries the spreadsheet.
pub const FILE_FIELD: &str = "file";
const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub type SharedLogs = Arc<Mutex<Vec<LogEntry>>>;

pub struct HttpState {
    pub import: SheetImportUseCase,
    pub logs: SharedLogs,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl HttpState {
    pub fn new(
        import: SheetImportUseCase,
        logs: SharedLogs,
        upload_dir: PathBuf,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            import,
            logs,
            upload_dir,
            max_upload_bytes,
        }
    }
}

/// Failure body: `{"success": false, "message": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            message: self.to_string(),
        })
    }
}

#[post("/upload")]
async fn upload(data: web::Data<HttpState>, mut payload: Multipart) -> Result<HttpResponse> {
    let (temp, format, file_name) =
        match receive_upload(&mut payload, &data.upload_dir, data.max_upload_bytes).await {
            Ok(received) => received,
            Err(e) => {
                add_log(&data.logs, log_level(&e), "Upload", &format!("Upload rejected: {}", e));
                return Err(e);
            }
        };

    add_log(
        &data.logs,
        "INFO",
        "Upload",
        &format!("Parsing {} as {}", file_name, format.extension()),
    );

    let import = data.import.clone();
    // The guard moves into the blocking task so the file is removed once parsing ends.
    let result = web::block(move || {
        let records = import.import(temp.path(), format);
        drop(temp);
        records
    })
    .await
    .map_err(|e| AppError::Internal(format!("Parse task failed: {}", e)))
    .and_then(|records| records);

    match result {
        Ok(records) => {
            add_log(
                &data.logs,
                "INFO",
                "Upload",
                &format!("{}: {} record(s) returned", file_name, records.len()),
            );
            Ok(HttpResponse::Ok().json(records))
        }
        Err(e) => {
            add_log(&data.logs, log_level(&e), "Upload", &format!("{}: {}", file_name, e));
            Err(e)
        }
    }
}

fn log_level(err: &AppError) -> &'static str {
    if err.is_client_error() {
        "WARN"
    } else {
        "ERROR"
    }
}

/// Find the `file` part, check its type and stream it to a temp file within the size limit.
async fn receive_upload(
    payload: &mut Multipart,
    upload_dir: &Path,
    max_bytes: u64,
) -> Result<(TempUpload, SheetFormat, String)> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|_| AppError::MissingFile)?;

        let file_name = {
            let disposition = field.content_disposition();
            match (disposition.get_name(), disposition.get_filename()) {
                (Some(FILE_FIELD), Some(name)) => Some(name.to_string()),
                _ => None,
            }
        };
        let Some(file_name) = file_name else {
            drain(&mut field).await?;
            continue;
        };

        let format = SheetFormat::from_file_name(&file_name)
            .ok_or_else(|| AppError::InvalidFileType(file_name.clone()))?;

        let temp = TempUpload::new(upload_dir, format.extension())?;
        write_limited(&mut field, temp.path(), max_bytes).await?;
        return Ok((temp, format, file_name));
    }

    Err(AppError::MissingFile)
}

async fn write_limited(field: &mut Field, path: &Path, max_bytes: u64) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(upload_read_error)?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(AppError::FileTooLarge(max_bytes));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(())
}

async fn drain(field: &mut Field) -> Result<()> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(upload_read_error)?;
    }
    Ok(())
}

/// A broken multipart stream is a transport failure, not a spreadsheet problem.
fn upload_read_error(err: MultipartError) -> AppError {
    AppError::Internal(format!("Failed to read upload: {}", err))
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> HttpResponse {
    let logs = lock_logs(&data.logs);
    HttpResponse::Ok().json(&*logs)
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

fn lock_logs(logs: &Mutex<Vec<LogEntry>>) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
    logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    match level {
        "ERROR" => tracing::error!(source, "{}", message),
        "WARN" => tracing::warn!(source, "{}", message),
        "DEBUG" => tracing::debug!(source, "{}", message),
        _ => tracing::info!(source, "{}", message),
    }

    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = lock_logs(logs);
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

/// Route table, shared by the server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(upload)
            .service(get_logs)
            .service(health),
    );
}

pub fn start_server(state: web::Data<HttpState>, config: &AppConfig) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(config.bind_address())?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::FieldMapping;
    use actix_web::http::header;
    use actix_web::test as actix_test;
    use serde_json::json;

    const BOUNDARY: &str = "sheet-intake-test-boundary";

    struct TestDir(PathBuf);

    impl TestDir {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("sheet-intake-http-{}", uuid::Uuid::new_v4())))
        }

        fn file_count(&self) -> usize {
            std::fs::read_dir(&self.0)
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn state(dir: &TestDir, max_upload_bytes: u64) -> web::Data<HttpState> {
        web::Data::new(HttpState::new(
            SheetImportUseCase::new(Arc::new(FieldMapping::default())),
            Arc::new(Mutex::new(Vec::new())),
            dir.0.clone(),
            max_upload_bytes,
        ))
    }

    fn multipart_part(name: &str, file_name: Option<&str>, content: &[u8]) -> Vec<u8> {
        let mut part = format!("--{}\r\n", BOUNDARY).into_bytes();
        match file_name {
            Some(file_name) => part.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => part.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        part.extend_from_slice(content);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn multipart_body(parts: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body: Vec<u8> = parts.into_iter().flatten().collect();
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> actix_test::TestRequest {
        actix_test::TestRequest::post()
            .uri("/api/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    const PRODUCT_CSV: &str = "产品编码,产品名称,采购价,税点\n\
                               A1,Widget,10,0.13\n\
                               A2,Gadget,,0.1\n\
                               A3,Gizmo,5,0\n";

    #[actix_web::test]
    async fn test_upload_csv_returns_bare_array() {
        let dir = TestDir::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(&dir, 10 * 1024 * 1024))
                .configure(configure),
        )
        .await;

        let body = multipart_body(vec![multipart_part(
            "file",
            Some("products.csv"),
            PRODUCT_CSV.as_bytes(),
        )]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!([{
                "productCode": "A1",
                "productName": "Widget",
                "purchasePrice": 10,
                "taxRate": 0.13
            }])
        );
        assert_eq!(dir.file_count(), 0);
    }

    #[actix_web::test]
    async fn test_other_fields_are_skipped() {
        let dir = TestDir::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(&dir, 1024 * 1024))
                .configure(configure),
        )
        .await;

        let body = multipart_body(vec![
            multipart_part("note", None, b"hello"),
            multipart_part("file", Some("PRODUCTS.CSV"), PRODUCT_CSV.as_bytes()),
        ]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_missing_file() {
        let dir = TestDir::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(&dir, 1024))
                .configure(configure),
        )
        .await;

        let body = multipart_body(vec![multipart_part("note", None, b"no file here")]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = actix_test::read_body_json(resp).await;
        assert!(!body.success);
        assert_eq!(body.message, AppError::MissingFile.to_string());
    }

    #[actix_web::test]
    async fn test_invalid_file_type() {
        let dir = TestDir::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(&dir, 1024))
                .configure(configure),
        )
        .await;

        let body = multipart_body(vec![multipart_part("file", Some("notes.txt"), b"a,b")]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = actix_test::read_body_json(resp).await;
        assert!(!body.success);
        assert!(body.message.contains("notes.txt"));
        assert_eq!(dir.file_count(), 0);
    }

    #[actix_web::test]
    async fn test_file_too_large() {
        let dir = TestDir::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(&dir, 16))
                .configure(configure),
        )
        .await;

        let body = multipart_body(vec![multipart_part(
            "file",
            Some("products.csv"),
            PRODUCT_CSV.as_bytes(),
        )]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = actix_test::read_body_json(resp).await;
        assert_eq!(body.message, AppError::FileTooLarge(16).to_string());
        assert_eq!(dir.file_count(), 0);
    }

    #[actix_web::test]
    async fn test_empty_sheet() {
        let dir = TestDir::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(&dir, 1024))
                .configure(configure),
        )
        .await;

        let body = multipart_body(vec![multipart_part("file", Some("empty.csv"), b"")]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = actix_test::read_body_json(resp).await;
        assert_eq!(body.message, AppError::EmptySheet.to_string());
        assert_eq!(dir.file_count(), 0);
    }

    #[actix_web::test]
    async fn test_corrupt_workbook_is_internal_error() {
        let dir = TestDir::new();
        let data = state(&dir, 1024);
        let app = actix_test::init_service(App::new().app_data(data.clone()).configure(configure)).await;

        let body = multipart_body(vec![multipart_part(
            "file",
            Some("broken.xlsx"),
            b"not really a workbook",
        )]);
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = actix_test::read_body_json(resp).await;
        assert!(!body.success);
        assert_eq!(dir.file_count(), 0);

        let logs = lock_logs(&data.logs);
        assert!(logs.iter().any(|entry| entry.level == "ERROR"));
    }

    #[actix_web::test]
    async fn test_logs_and_health() {
        let dir = TestDir::new();
        let data = state(&dir, 1024);
        add_log(&data.logs, "INFO", "Test", "hello");
        let app = actix_test::init_service(App::new().app_data(data.clone()).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/api/logs").to_request();
        let logs: Vec<LogEntry> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "hello");

        let req = actix_test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[actix_web::test]
    async fn test_truncated_upload_is_internal_error() {
        let dir = TestDir::new();
        let data = state(&dir, 1024 * 1024);
        let app =
            actix_test::init_service(App::new().app_data(data.clone()).configure(configure))
                .await;

        // Part body without its closing boundary, as when a client aborts mid-upload.
        let body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"products.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{}",
            BOUNDARY, PRODUCT_CSV
        )
        .into_bytes();
        let resp = actix_test::call_service(&app, upload_request(body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = actix_test::read_body_json(resp).await;
        assert!(!body.success);
        assert!(body.message.contains("Failed to read upload"));
        assert!(!body.message.contains("parse spreadsheet"));
        assert_eq!(dir.file_count(), 0);
    }

    #[test]
    fn test_upload_read_error_is_not_a_parse_error() {
        let err = upload_read_error(MultipartError::Incomplete);
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_log_buffer_is_bounded() {
        let logs = Mutex::new(Vec::new());
        for i in 0..150 {
            add_log(&logs, "INFO", "Test", &format!("entry {}", i));
        }
        let logs = lock_logs(&logs);
        assert_eq!(logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(logs[0].message, "entry 50");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::EmptySheet.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InternalParseError("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
