//! Integration tests for the WebSocket connector.
//!
//! These tests spin up a real WebSocket server with `tokio-tungstenite`
//! and dial it with [`WebSocketConnector`] to check that handshake
//! headers go out and that text and binary frames stay distinct.

#[cfg(feature = "websocket")]
mod websocket {
    use comfylink_transport::{ConnectRequest, Connection, Connector, RawFrame, WebSocketConnector};
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn test_connect_sends_headers_and_receives_both_frame_kinds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().unwrap();
        let (header_tx, header_rx) = oneshot::channel::<(String, Option<String>)>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let _ = header_tx.send((req.uri().to_string(), auth));
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            ws.send(Message::Text(r#"{"type":"status","data":{}}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Binary(vec![0, 0, 0, 1, 0, 0, 0, 2, 9].into()))
                .await
                .unwrap();
            ws.send(Message::Close(None)).await.unwrap();
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let request = ConnectRequest::new(format!("ws://{addr}/ws?clientId=abc"))
            .header("Authorization", "Bearer secret");
        let conn = WebSocketConnector
            .connect(&request)
            .await
            .expect("client should connect");

        let (uri, auth) = header_rx.await.unwrap();
        assert_eq!(uri, "/ws?clientId=abc");
        assert_eq!(auth.as_deref(), Some("Bearer secret"));

        assert_eq!(
            conn.recv().await.unwrap(),
            Some(RawFrame::Text(r#"{"type":"status","data":{}}"#.to_string()))
        );
        assert_eq!(
            conn.recv().await.unwrap(),
            Some(RawFrame::Binary(vec![0, 0, 0, 1, 0, 0, 0, 2, 9]))
        );
        assert_eq!(conn.recv().await.unwrap(), None, "server close ends the stream");

        // Dropping the client ends the TCP stream the server is draining.
        drop(conn);
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("server should finish once the client is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Bind then drop to obtain a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let result = WebSocketConnector
            .connect(&ConnectRequest::new(format!("ws://{addr}/ws")))
            .await;

        assert!(result.is_err(), "dial to a closed port should fail");
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_header_name() {
        let request = ConnectRequest::new("ws://127.0.0.1:1/ws").header("bad header", "x");

        let result = WebSocketConnector.connect(&request).await;

        assert!(matches!(
            result,
            Err(comfylink_transport::TransportError::InvalidRequest(_))
        ));
    }
}
