//! # 本地生成的响应
//!
//! 错误 JSON 与匿名 GET 的跳转页面。上游响应的回传见 `forwarding`。

use axum::{
    Json,
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ProxyError, Result};

/// `{"error": "<reason>"}`
#[must_use]
pub fn json_error(status: StatusCode, reason: &str) -> Response {
    (status, Json(json!({ "error": reason }))).into_response()
}

/// 302 跳转，正文为一个指向目标地址的链接
pub fn redirect(location: &str) -> Result<Response> {
    let location_value = HeaderValue::from_str(location)
        .map_err(|e| ProxyError::internal(format!("无效的跳转地址: {e}")))?;

    let mut response = Response::new(Body::from(format!(
        "<a href=\"{}\">Redirecting</a>",
        escape_html(location)
    )));
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location_value);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    Ok(response)
}

/// HTML 属性值转义
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn json_error_body() {
        let response = json_error(StatusCode::FORBIDDEN, "forbidden");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "forbidden" }));
    }

    #[tokio::test]
    async fn redirect_sets_location_and_escaped_link() {
        let response = redirect("https://f.example/t/1?a=1&b=2").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://f.example/t/1?a=1&b=2"
        );
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            &body[..],
            b"<a href=\"https://f.example/t/1?a=1&amp;b=2\">Redirecting</a>"
        );
    }

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html(r#"<"x" & 'y'>"#), "&lt;&quot;x&quot; &amp; &#039;y&#039;&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn redirect_rejects_control_characters() {
        assert!(redirect("https://f.example/\n").is_err());
    }
}
