//! JSON API endpoints.
//!
//! Each handler parses the request, resolves the bearer token to a username
//! and calls into [`SessionManager`] or [`FileStore`]. No filesystem or token
//! logic lives here.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::SessionManager;
use crate::error::FileboxError;
use crate::files::{FileEntry, FileStore, IncomingFile};
use crate::server::assets::StaticAssets;
use crate::server::body::{
    content_disposition, error_response, file_body, json_response, success_response,
    HttpResponse,
};

/// Limit for JSON request bodies.
const MAX_JSON_BODY_BYTES: usize = 1 << 20;

/// Multipart field carrying uploaded files.
const UPLOAD_FIELD: &str = "files";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    success: bool,
    items: Vec<FileEntry>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    uploaded: usize,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    path: String,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderRequest {
    #[serde(default)]
    path: String,
    #[serde(default)]
    folder_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    #[serde(default)]
    path: String,
    #[serde(default)]
    old_name: String,
    #[serde(default)]
    new_name: String,
}

/// Routes API requests to the session manager and file store.
pub struct ApiHandler {
    sessions: Arc<SessionManager>,
    files: Arc<FileStore>,
    assets: Option<StaticAssets>,
    max_upload_bytes: usize,
}

impl ApiHandler {
    pub fn new(
        sessions: Arc<SessionManager>,
        files: Arc<FileStore>,
        assets: Option<StaticAssets>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            sessions,
            files,
            assets,
            max_upload_bytes,
        }
    }

    /// Dispatch a single request.
    pub async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        tracing::debug!("{} {}", method, path);

        if let Some(expected) = expected_method(&path) {
            if method != expected {
                return method_not_allowed();
            }
        }

        match path.as_str() {
            "/api/login" => self.login(req).await,
            "/api/register" => self.register(req).await,
            "/api/logout" => self.logout(req).await,
            "/api/files" => match method {
                Method::GET => self.list(req).await,
                Method::DELETE => self.delete(req).await,
                _ => method_not_allowed(),
            },
            "/api/files/upload" => self.upload(req).await,
            "/api/files/folder" => self.create_folder(req).await,
            "/api/files/download" => self.download(req).await,
            "/api/files/rename" => self.rename(req).await,
            p if p.starts_with("/api/") => error_response(StatusCode::NOT_FOUND, "Not found"),
            _ => match &self.assets {
                Some(assets) if method == Method::GET => assets.serve(&path).await,
                Some(_) => method_not_allowed(),
                None => error_response(StatusCode::NOT_FOUND, "Not found"),
            },
        }
    }

    async fn login<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let login: LoginRequest = match read_json(req).await {
            Ok(login) => login,
            Err(response) => return response,
        };

        if !self.sessions.authenticate(&login.username, &login.password) {
            tracing::info!("Failed login for {:?}", login.username);
            return json_response(
                StatusCode::UNAUTHORIZED,
                &LoginResponse {
                    success: false,
                    token: None,
                    message: Some("Invalid credentials".to_string()),
                },
            );
        }

        if let Err(e) = self.files.ensure_user_dir(&login.username).await {
            tracing::error!("Failed to create directory for {}: {}", login.username, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating user directory",
            );
        }

        let token = match self.sessions.generate_token(&login.username) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Failed to generate token: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error generating token");
            }
        };

        tracing::info!("User {} logged in", login.username);
        json_response(
            StatusCode::OK,
            &LoginResponse {
                success: true,
                token: Some(token),
                message: Some("Login successful".to_string()),
            },
        )
    }

    async fn register<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let register: LoginRequest = match read_json(req).await {
            Ok(register) => register,
            Err(response) => return response,
        };

        // Registration rewrites the credential file with blocking I/O.
        let sessions = self.sessions.clone();
        let (username, password) = (register.username.clone(), register.password);
        let created =
            tokio::task::spawn_blocking(move || sessions.create_user(&username, &password)).await;
        match created {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
            Err(e) => {
                tracing::error!("Registration task failed: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error creating user");
            }
        }

        if let Err(e) = self.files.ensure_user_dir(&register.username).await {
            tracing::error!("Failed to create directory for {}: {}", register.username, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating user directory",
            );
        }

        success_response()
    }

    async fn logout<B>(&self, req: Request<B>) -> HttpResponse {
        if let Some(token) = header_token(&req) {
            self.sessions.revoke_token(&token);
        }
        success_response()
    }

    async fn list<B>(&self, req: Request<B>) -> HttpResponse {
        let username = match self.authenticate(&req) {
            Ok(username) => username,
            Err(response) => return response,
        };

        let query = query_params(&req);
        let path = query.get("path").map(String::as_str).unwrap_or("root");

        match self.files.list_entries(&username, path).await {
            Ok(items) => json_response(
                StatusCode::OK,
                &ListResponse {
                    success: true,
                    items,
                },
            ),
            Err(e) => fs_error_response(&e),
        }
    }

    async fn delete<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let username = match self.authenticate(&req) {
            Ok(username) => username,
            Err(response) => return response,
        };

        let delete: DeleteRequest = match read_json(req).await {
            Ok(delete) => delete,
            Err(response) => return response,
        };

        if delete.names.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "No files specified");
        }

        match self
            .files
            .delete_entries(&username, &delete.path, &delete.names)
            .await
        {
            Ok(removed) => {
                tracing::debug!(
                    "{} deleted {} of {} entries",
                    username,
                    removed,
                    delete.names.len()
                );
                success_response()
            }
            Err(e) => fs_error_response(&e),
        }
    }

    async fn upload<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let username = match self.authenticate(&req) {
            Ok(username) => username,
            Err(response) => return response,
        };

        let query = query_params(&req);
        let path = query.get("path").cloned().unwrap_or_else(|| "root".to_string());

        let files = match read_multipart_files(req, self.max_upload_bytes).await {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!("Rejected upload form: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "Error processing form");
            }
        };

        if files.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "No files uploaded");
        }

        match self.files.upload_into(&username, &path, &files).await {
            Ok(uploaded) => {
                tracing::info!("{} uploaded {} of {} files", username, uploaded, files.len());
                json_response(
                    StatusCode::OK,
                    &UploadResponse {
                        success: true,
                        uploaded,
                    },
                )
            }
            Err(e) => fs_error_response(&e),
        }
    }

    async fn create_folder<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let username = match self.authenticate(&req) {
            Ok(username) => username,
            Err(response) => return response,
        };

        let folder: FolderRequest = match read_json(req).await {
            Ok(folder) => folder,
            Err(response) => return response,
        };

        if folder.folder_name.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Folder name not specified");
        }

        match self
            .files
            .create_folder(&username, &folder.path, &folder.folder_name)
            .await
        {
            Ok(()) => success_response(),
            Err(e) => fs_error_response(&e),
        }
    }

    async fn download<B>(&self, req: Request<B>) -> HttpResponse {
        let username = match self.authenticate(&req) {
            Ok(username) => username,
            Err(response) => return response,
        };

        let query = query_params(&req);
        let path = query.get("path").map(String::as_str).unwrap_or("");
        let name = match query.get("name") {
            Some(name) if !name.is_empty() => name.as_str(),
            _ => return error_response(StatusCode::BAD_REQUEST, "File name not specified"),
        };

        let download = match self.files.open_download(&username, path, name).await {
            Ok(download) => download,
            Err(e) => return fs_error_response(&e),
        };

        let mime = mime_guess::from_path(&download.path).first_or_octet_stream();
        let mut response = Response::new(file_body(download.file));
        let headers = response.headers_mut();
        headers.insert(CONTENT_DISPOSITION, content_disposition(&download.name));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(download.size));
        if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
            headers.insert(CONTENT_TYPE, value);
        }
        response
    }

    async fn rename<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let username = match self.authenticate(&req) {
            Ok(username) => username,
            Err(response) => return response,
        };

        let rename: RenameRequest = match read_json(req).await {
            Ok(rename) => rename,
            Err(response) => return response,
        };

        if rename.old_name.is_empty() || rename.new_name.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Names not specified");
        }

        match self
            .files
            .rename_entry(&username, &rename.path, &rename.old_name, &rename.new_name)
            .await
        {
            Ok(()) => success_response(),
            Err(e) => fs_error_response(&e),
        }
    }

    /// Resolve the request's bearer token to a username.
    fn authenticate<B>(&self, req: &Request<B>) -> Result<String, HttpResponse> {
        let token = header_token(req)
            .or_else(|| query_params(req).remove("token"))
            .unwrap_or_default();

        self.sessions.validate_token(&token).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            error_response(StatusCode::UNAUTHORIZED, "Not authenticated")
        })
    }
}

/// HTTP status for a core error.
pub fn status_for(err: &FileboxError) -> StatusCode {
    match err {
        FileboxError::InvalidToken | FileboxError::TokenExpired => StatusCode::UNAUTHORIZED,
        FileboxError::PathEscape(_) => StatusCode::FORBIDDEN,
        FileboxError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fs_error_response(err: &FileboxError) -> HttpResponse {
    let status = status_for(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::warn!("File operation failed: {}", err);
    }
    error_response(status, &err.to_string())
}

/// The only method a single-method endpoint accepts.
fn expected_method(path: &str) -> Option<Method> {
    match path {
        "/api/login"
        | "/api/register"
        | "/api/logout"
        | "/api/files/upload"
        | "/api/files/folder"
        | "/api/files/rename" => Some(Method::POST),
        "/api/files/download" => Some(Method::GET),
        _ => None,
    }
}

fn method_not_allowed() -> HttpResponse {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Token from the `Authorization` header, with an optional `Bearer ` prefix.
fn header_token<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(strip_bearer)
}

fn strip_bearer(value: &str) -> String {
    value.strip_prefix("Bearer ").unwrap_or(value).to_string()
}

fn query_params<B>(req: &Request<B>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, BoxError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    Ok(Limited::new(body, limit).collect().await?.to_bytes())
}

async fn read_json<T, B>(req: Request<B>) -> Result<T, HttpResponse>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let bad_request = || error_response(StatusCode::BAD_REQUEST, "Error processing request");

    let data = read_body(req.into_body(), MAX_JSON_BODY_BYTES)
        .await
        .map_err(|_| bad_request())?;
    serde_json::from_slice(&data).map_err(|_| bad_request())
}

/// Collect every `files` part of a multipart form.
async fn read_multipart_files<B>(req: Request<B>, limit: usize) -> Result<Vec<IncomingFile>, BoxError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or("missing content type")?;
    let boundary = multer::parse_boundary(content_type)?;

    let data = read_body(req.into_body(), limit).await?;
    let stream = futures::stream::once(async move { Ok::<Bytes, std::convert::Infallible>(data) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(base_name) else {
            continue;
        };
        let data = field.bytes().await?;
        files.push(IncomingFile::new(file_name, data));
    }

    Ok(files)
}

/// Final component of a client-supplied file name.
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}
