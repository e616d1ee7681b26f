//! Integration tests for the WebSocket transport.
//!
//! A real listener on an OS-assigned port and a real client, so frames
//! actually cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use nightfall_transport::{
        Connection, FrameKind, Transport, WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, returns both ends.
    async fn pair(frame: FrameKind) -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_frame_kind(frame);
        let addr = transport.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_text_frames_by_default() {
        let (conn, mut client) = pair(FrameKind::Text).await;
        assert!(conn.id().into_inner() > 0);

        conn.send(br#"{"hello":"client"}"#).await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "expected a text frame, got {msg:?}");
        assert_eq!(msg.into_data().as_ref(), br#"{"hello":"client"}"#);
    }

    #[tokio::test]
    async fn test_websocket_binary_frames_when_configured() {
        let (conn, mut client) = pair(FrameKind::Binary).await;

        conn.send(&[0xff, 0x00, 0x10]).await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0x00, 0x10]);
    }

    #[tokio::test]
    async fn test_websocket_text_send_rejects_invalid_utf8() {
        let (conn, _client) = pair(FrameKind::Text).await;
        let result = conn.send(&[0xff, 0xfe]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_websocket_receives_text_and_binary() {
        let (conn, mut client) = pair(FrameKind::Text).await;

        client.send(Message::Text("from text".into())).await.unwrap();
        client
            .send(Message::Binary(b"from binary".to_vec().into()))
            .await
            .unwrap();

        assert_eq!(conn.recv().await.unwrap().unwrap(), b"from text");
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"from binary");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (conn, mut client) = pair(FrameKind::Text).await;

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }
}
