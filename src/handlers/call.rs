//! # Call-control Webhook
//!
//! The telephony platform POSTs here when a call comes in. The response is
//! an XML instruction document telling the platform to open its media
//! stream against this server's WebSocket endpoint; the bridge itself takes
//! over only once that connection arrives.

use actix_web::{HttpRequest, HttpResponse};
use tracing::info;

/// Respond to an incoming-call webhook with a connect-and-stream document
/// pointing at `/media-stream` on whatever host this request reached.
pub async fn incoming_call(req: HttpRequest) -> HttpResponse {
    let host = req.connection_info().host().to_string();
    info!(host = %host, "incoming call, directing media stream to this host");

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Say>Please wait while we connect your call.</Say>
    <Connect>
        <Stream url="wss://{host}/media-stream" />
    </Connect>
</Response>"#
    );

    HttpResponse::Ok().content_type("text/xml").body(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn test_webhook_points_stream_at_request_host() {
        let req = TestRequest::default()
            .insert_header(("host", "bridge.example.com"))
            .to_http_request();
        let response = incoming_call(req).await;

        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
        let body = response.into_body().try_into_bytes().unwrap();
        let xml = std::str::from_utf8(&body).unwrap();
        assert!(xml.contains("wss://bridge.example.com/media-stream"));
        assert!(xml.starts_with("<?xml"));
    }
}
