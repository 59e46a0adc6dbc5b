use crate::common::Boom;
use axum::{
    body::{self, Body, Bytes, HttpBody},
    extract::FromRequestParts,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header, request::Parts},
};
use std::collections::HashMap;

/// Read-only view of the inbound request, captured before it is handled.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path: String,
    pub method: Method,
    pub accept: Option<String>,
    pub payload: Option<Bytes>,
    pub query: HashMap<String, String>,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::from_head(request.method(), request.uri(), request.headers())
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::from_head(&parts.method, &parts.uri, &parts.headers)
    }

    fn from_head(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            path: uri.path().to_string(),
            method: method.clone(),
            accept: headers
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            payload: None,
            query,
        }
    }

    /// Capture the context and, when the body is known to fit in `limit`,
    /// buffer the payload and hand back an equivalent request.
    ///
    /// The body's own size hint decides, not the `Content-Length` header, so
    /// streamed or oversized bodies reach the handler untouched.
    pub async fn capture(request: Request<Body>, limit: Option<usize>) -> (Request<Body>, Self) {
        let mut context = Self::from_request(&request);

        let Some(limit) = limit else {
            return (request, context);
        };
        let upper = request
            .body()
            .size_hint()
            .upper()
            .and_then(|upper| usize::try_from(upper).ok());

        match upper {
            Some(len) if len > 0 && len <= limit => {
                let (parts, body) = request.into_parts();
                match body::to_bytes(body, limit).await {
                    Ok(bytes) => {
                        context.payload = Some(bytes.clone());
                        (Request::from_parts(parts, Body::from(bytes)), context)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, path = %context.path, "request body could not be read for error logging");
                        (Request::from_parts(parts, Body::empty()), context)
                    }
                }
            }
            _ => (request, context),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn payload_text(&self) -> Option<String> {
        self.payload
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// The error handed to the forward route as `?statusCode=&error=&message=`.
///
/// ```rust,no_run
/// use axum::response::Html;
/// use friendly_errors::ForwardedError;
///
/// async fn error_page(forwarded: ForwardedError) -> Html<String> {
///     Html(format!("<h1>{}</h1><p>{}</p>", forwarded.error, forwarded.message))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedError {
    pub status: StatusCode,
    pub error: String,
    pub message: String,
}

impl ForwardedError {
    pub fn from_context(context: &RequestContext) -> Result<Self, Boom> {
        let field = |key: &str| {
            context
                .query
                .get(key)
                .cloned()
                .ok_or_else(|| Boom::bad_request(format!("missing `{key}` query parameter")))
        };

        let status = field("statusCode")?
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| Boom::bad_request("invalid `statusCode` query parameter"))?;

        Ok(Self {
            status,
            error: field("error")?,
            message: field("message")?,
        })
    }
}

impl<S> FromRequestParts<S> for ForwardedError
where
    S: Send + Sync,
{
    type Rejection = Boom;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_context(&RequestContext::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request_reads_accept_and_query() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/error?statusCode=404&error=Not+Found&message=not%20found")
            .header(header::ACCEPT, "text/html")
            .body(())
            .unwrap();

        let context = RequestContext::from_request(&request);
        assert_eq!(context.path, "/error");
        assert_eq!(context.accept.as_deref(), Some("text/html"));
        assert_eq!(context.query["statusCode"], "404");
        assert_eq!(context.query["error"], "Not Found");
        assert_eq!(context.query["message"], "not found");
    }

    #[test]
    fn test_forwarded_error_from_query() {
        let request = Request::get("/error?statusCode=404&error=Not+Found&message=not+found+here")
            .body(())
            .unwrap();
        let forwarded = ForwardedError::from_context(&RequestContext::from_request(&request)).unwrap();
        assert_eq!(
            forwarded,
            ForwardedError {
                status: StatusCode::NOT_FOUND,
                error: "Not Found".to_string(),
                message: "not found here".to_string(),
            }
        );
    }

    #[test]
    fn test_forwarded_error_rejects_bad_query() {
        let request = Request::get("/error?statusCode=abc&error=x&message=y").body(()).unwrap();
        let err = ForwardedError::from_context(&RequestContext::from_request(&request)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let request = Request::get("/error?statusCode=500").body(()).unwrap();
        assert!(ForwardedError::from_context(&RequestContext::from_request(&request)).is_err());
    }

    #[tokio::test]
    async fn test_capture_buffers_small_payload() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/orders")
            .header(header::CONTENT_LENGTH, "13")
            .body(Body::from(r#"{"qty": 1234}"#))
            .unwrap();

        let (request, context) = RequestContext::capture(request, Some(1024)).await;
        assert_eq!(context.payload_text().as_deref(), Some(r#"{"qty": 1234}"#));

        let replayed = body::to_bytes(request.into_body(), 1024).await.unwrap();
        assert_eq!(&replayed[..], br#"{"qty": 1234}"#);
    }

    #[tokio::test]
    async fn test_capture_skips_oversized_or_disabled() {
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from(vec![0u8; 4096]))
            .unwrap();
        let (request, context) = RequestContext::capture(request, Some(1024)).await;
        assert!(context.payload.is_none());
        let untouched = body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(untouched.len(), 4096);

        let request = Request::builder()
            .uri("/orders")
            .body(Body::from("{}"))
            .unwrap();
        let (_, context) = RequestContext::capture(request, None).await;
        assert!(context.payload.is_none());
    }

    #[tokio::test]
    async fn test_capture_ignores_understated_content_length() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_LENGTH, "2")
            .body(Body::from(vec![7u8; 4096]))
            .unwrap();

        let (request, context) = RequestContext::capture(request, Some(1024)).await;
        assert!(context.payload.is_none());
        let untouched = body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(untouched.len(), 4096);
        assert!(untouched.iter().all(|b| *b == 7));
    }
}
