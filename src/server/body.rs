//! Response bodies and builders shared by the HTTP handlers.

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tokio_util::io::ReaderStream;

/// Body type of every response the server produces.
pub type ResponseBody = BoxBody<Bytes, std::io::Error>;

/// Response type of every handler.
pub type HttpResponse = Response<ResponseBody>;

pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Stream a file from disk without buffering it.
pub fn file_body(file: tokio::fs::File) -> ResponseBody {
    let stream = ReaderStream::new(file).map_ok(Frame::data);
    BodyExt::boxed(StreamBody::new(stream))
}

/// Serialize `value` as a JSON response.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(data) => {
            let mut response = Response::new(full_body(data));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!("Failed to encode response: {}", e);
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    json_response(status, &serde_json::json!({ "error": message }))
}

/// `{"success": true}`.
pub fn success_response() -> HttpResponse {
    json_response(StatusCode::OK, &serde_json::json!({ "success": true }))
}

/// Bare status with an empty body.
pub fn status_response(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

/// `Content-Disposition` value offering `name` as a download.
///
/// Names that are not plain ASCII also get an RFC 5987 `filename*`.
pub fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    let value = if fallback == name {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(name, ATTR_CHAR)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// RFC 5987 `attr-char`: everything outside it is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_response() {
        let response = json_response(StatusCode::CREATED, &serde_json::json!({ "ok": 1 }));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"ok":1}"#);
    }

    #[test]
    fn test_content_disposition_plain() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_escapes() {
        assert_eq!(
            content_disposition("a\"b.txt"),
            "attachment; filename=\"a_b.txt\"; filename*=UTF-8''a%22b.txt"
        );
        assert_eq!(
            content_disposition("résumé.txt"),
            "attachment; filename=\"r_sum_.txt\"; filename*=UTF-8''r%C3%A9sum%C3%A9.txt"
        );
    }

    #[test]
    fn test_content_disposition_keeps_attr_chars() {
        assert_eq!(
            content_disposition("naïve v1+2~final.txt"),
            "attachment; filename=\"na_ve v1+2~final.txt\"; \
             filename*=UTF-8''na%C3%AFve%20v1+2~final.txt"
        );
    }

    #[tokio::test]
    async fn test_file_body_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![7u8; 100_000]).unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let body = file_body(file).collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), 100_000);
        assert!(body.iter().all(|b| *b == 7));
    }
}
