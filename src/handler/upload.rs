//! Upload stream writer module
//!
//! The core of the relay: streams a POST body into a file under the
//! configured output directory in bounded memory. The client-supplied
//! filename is untrusted and reduced to a single path component before it
//! touches the filesystem; the byte counter is local to the request, so
//! concurrent uploads cannot corrupt each other's accounting.

use crate::config::AppState;
use crate::http;
use crate::logger;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::Response;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Terminal upload failures, each reported as a 500 with a short diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// The target path could not be resolved or opened for writing
    OutputOpen,
    /// A chunk could not be written to the open file
    BodyWrite,
    /// The request body stream failed mid-transfer
    BodyRead,
}

impl UploadError {
    /// Diagnostic string sent to the client
    pub const fn message(self) -> &'static str {
        match self {
            Self::OutputOpen => "Unable to open output file",
            Self::BodyWrite => "Unable to write to output file",
            Self::BodyRead => "Error reading request body",
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Handle one upload request.
///
/// Logs receipt and completion (with the number of bytes stored) on every
/// exit path and converts all I/O failures into HTTP error responses; this
/// function never fails.
pub async fn handle_upload<B>(
    remote_addr: SocketAddr,
    requested_filename: Option<&str>,
    body: B,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    logger::log_upload_received(&remote_addr);

    let output_dir = Path::new(&state.config.storage.output_dir);
    let mut transferred: u64 = 0;
    let result = store_body(requested_filename, body, output_dir, &mut transferred).await;

    logger::log_upload_completed(&remote_addr, transferred);

    match result {
        Ok(()) => http::build_upload_ok_response(),
        Err(err) => http::build_500_response(err.message()),
    }
}

/// Resolve the target path and stream the body into it.
///
/// `transferred` is updated after each successful chunk write so the caller
/// can report the byte count even when the transfer aborts midway. Partial
/// writes are not rolled back; the file handle is released on every exit
/// path by ownership.
async fn store_body<B>(
    requested_filename: Option<&str>,
    body: B,
    output_dir: &Path,
    transferred: &mut u64,
) -> Result<(), UploadError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    let target = requested_filename
        .and_then(|raw| resolve_target(raw, output_dir))
        .ok_or(UploadError::OutputOpen)?;

    let mut file = match File::create(&target).await {
        Ok(file) => file,
        Err(e) => {
            logger::log_error(&format!("Failed to open '{}': {e}", target.display()));
            return Err(UploadError::OutputOpen);
        }
    };

    copy_body(body, &mut file, transferred).await?;

    // Close errors are logged but never fail a finished transfer
    if let Err(e) = file.shutdown().await {
        logger::log_warning(&format!("Error closing '{}': {e}", target.display()));
    }
    Ok(())
}

/// Copy the body into the file one frame at a time.
///
/// Each frame is written before the next one is pulled from the transport,
/// so memory use stays bounded by the frame size no matter how large the
/// body is.
async fn copy_body<B>(mut body: B, file: &mut File, transferred: &mut u64) -> Result<(), UploadError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                logger::log_error(&format!("Failed to read request body: {e}"));
                return Err(UploadError::BodyRead);
            }
        };

        // Trailer frames carry no bytes for the file
        let Some(data) = frame.data_ref() else {
            continue;
        };
        if let Err(e) = file.write_all(data).await {
            logger::log_error(&format!("Failed to write chunk: {e}"));
            return Err(UploadError::BodyWrite);
        }
        *transferred += data.len() as u64;
    }
    Ok(())
}

/// Resolve a client-supplied filename to a path inside `output_dir`.
///
/// The output directory is canonicalized and the sanitized name joined to
/// it; the result must be a direct child of the directory. Returns None
/// when the name is unusable or the directory cannot be resolved.
pub fn resolve_target(requested: &str, output_dir: &Path) -> Option<PathBuf> {
    let name = match sanitize_filename(requested) {
        Some(name) => name,
        None => {
            logger::log_warning(&format!("Rejected upload filename '{requested}'"));
            return None;
        }
    };

    let root = match output_dir.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            logger::log_error(&format!(
                "Output directory not found or inaccessible '{}': {e}",
                output_dir.display()
            ));
            return None;
        }
    };

    let target = root.join(&name);
    // A single sanitized component cannot escape the root, but the direct
    // child invariant is checked against anything the sanitizer let through
    if target.parent() != Some(root.as_path()) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {requested} -> {}",
            target.display()
        ));
        return None;
    }
    Some(target)
}

/// Reduce an untrusted filename to its final path component.
///
/// The raw value is percent-decoded first (the upload page encodes names
/// with `encodeURIComponent`). Both `/` and `\` count as separators
/// regardless of platform. Names that reduce to nothing a file can be
/// called (empty, `.`, `..`) are rejected.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let decoded = http::percent_decode(raw);
    let last = decoded
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())?;
    match last {
        "." | ".." => None,
        name => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, StorageConfig,
    };
    use hyper::body::Frame;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::tempdir;

    /// Body that yields one data frame and then fails, for exercising the
    /// read-error path.
    struct FailingBody {
        sent: bool,
    }

    impl Body for FailingBody {
        type Data = Bytes;
        type Error = String;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, String>>> {
            let this = self.get_mut();
            if this.sent {
                Poll::Ready(Some(Err("connection reset by peer".to_string())))
            } else {
                this.sent = true;
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"partial")))))
            }
        }
    }

    fn test_state(output_dir: &Path) -> AppState {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                workers: None,
            },
            storage: StorageConfig {
                output_dir: output_dir.to_string_lossy().into_owned(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                access_log: false,
                show_headers: false,
                access_log_format: "common".to_string(),
                access_log_file: None,
                error_log_file: None,
            },
            performance: PerformanceConfig {
                keep_alive_timeout: 75,
                read_timeout: 0,
                write_timeout: 0,
                max_connections: None,
            },
            http: HttpConfig::default(),
        };
        AppState::new(&config)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mut transferred = 0;
        let body = Full::new(Bytes::from_static(b"hello world"));

        let result = store_body(Some("report.txt"), body, dir.path(), &mut transferred).await;

        assert_eq!(result, Ok(()));
        assert_eq!(transferred, 11);
        let written = std::fs::read(dir.path().join("report.txt")).unwrap();
        assert_eq!(written, b"hello world");
    }

    #[tokio::test]
    async fn test_empty_body_writes_empty_file() {
        let dir = tempdir().unwrap();
        let mut transferred = 0;
        let body = Full::new(Bytes::new());

        let result = store_body(Some("empty.bin"), body, dir.path(), &mut transferred).await;

        assert_eq!(result, Ok(()));
        assert_eq!(transferred, 0);
        let metadata = std::fs::metadata(dir.path().join("empty.bin")).unwrap();
        assert_eq!(metadata.len(), 0);
    }

    #[tokio::test]
    async fn test_reupload_truncates() {
        let dir = tempdir().unwrap();
        let mut transferred = 0;
        let first = Full::new(Bytes::from_static(b"a much longer first version"));
        store_body(Some("note.txt"), first, dir.path(), &mut transferred)
            .await
            .unwrap();

        let second = Full::new(Bytes::from_static(b"short"));
        store_body(Some("note.txt"), second, dir.path(), &mut transferred)
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("note.txt")).unwrap();
        assert_eq!(written, b"short");
    }

    #[tokio::test]
    async fn test_traversal_stays_inside_output_dir() {
        let dir = tempdir().unwrap();
        let mut transferred = 0;
        let body = Full::new(Bytes::from_static(b"top secret"));

        let result = store_body(Some("../secret"), body, dir.path(), &mut transferred).await;

        assert_eq!(result, Ok(()));
        assert!(dir.path().join("secret").exists());
        assert!(!dir.path().parent().unwrap().join("secret").exists());
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_open_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut transferred = 0;
        let body = Full::new(Bytes::from_static(b"payload"));

        let result = store_body(Some("file.txt"), body, &missing, &mut transferred).await;

        assert_eq!(result, Err(UploadError::OutputOpen));
        assert_eq!(transferred, 0);
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_missing_filename_is_open_error() {
        let dir = tempdir().unwrap();
        let mut transferred = 0;
        let body = Full::new(Bytes::from_static(b"payload"));

        let result = store_body(None, body, dir.path(), &mut transferred).await;

        assert_eq!(result, Err(UploadError::OutputOpen));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_read_error_aborts_with_partial_file() {
        let dir = tempdir().unwrap();
        let mut transferred = 0;
        let body = FailingBody { sent: false };

        let result = store_body(Some("partial.bin"), body, dir.path(), &mut transferred).await;

        assert_eq!(result, Err(UploadError::BodyRead));
        // The chunk written before the failure stays on disk; no rollback
        assert_eq!(transferred, 7);
        let written = std::fs::read(dir.path().join("partial.bin")).unwrap();
        assert_eq!(written, b"partial");
    }

    #[tokio::test]
    async fn test_handle_upload_success_response() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let body = Full::new(Bytes::from_static(b"hello world"));

        let response = handle_upload(peer(), Some("report.txt"), body, &state).await;

        assert_eq!(response.status(), 200);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"File uploaded successfully\n");
        assert!(dir.path().join("report.txt").exists());
    }

    #[tokio::test]
    async fn test_handle_upload_open_failure_response() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let state = test_state(&missing);
        let body = Full::new(Bytes::from_static(b"hello"));

        let response = handle_upload(peer(), Some("report.txt"), body, &state).await;

        assert_eq!(response.status(), 500);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Unable to open output file");
    }

    #[test]
    fn test_sanitize_plain_name() {
        assert_eq!(sanitize_filename("report.txt"), Some("report.txt".to_string()));
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("a/b/c.txt"), Some("c.txt".to_string()));
        assert_eq!(sanitize_filename("../../etc/passwd"), Some("passwd".to_string()));
        assert_eq!(sanitize_filename("/etc/passwd"), Some("passwd".to_string()));
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), Some("boot.ini".to_string()));
    }

    #[test]
    fn test_sanitize_decodes_percent_escapes() {
        assert_eq!(sanitize_filename("my%20file.txt"), Some("my file.txt".to_string()));
        // Encoded traversal decodes to separators, which are then stripped
        assert_eq!(sanitize_filename("%2e%2e%2fsecret"), Some("secret".to_string()));
    }

    #[test]
    fn test_sanitize_rejects_unusable_names() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("."), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("/"), None);
        assert_eq!(sanitize_filename("a/.."), None);
    }

    #[test]
    fn test_sanitize_keeps_name_with_trailing_slash() {
        assert_eq!(sanitize_filename("dir/"), Some("dir".to_string()));
    }

    #[test]
    fn test_resolve_target_is_direct_child() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();

        let target = resolve_target("../secret", dir.path()).unwrap();
        assert_eq!(target.parent(), Some(root.as_path()));
        assert_eq!(target.file_name().unwrap(), "secret");

        assert_eq!(resolve_target("..", dir.path()), None);
    }
}
