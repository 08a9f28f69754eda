//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a real tokio-tungstenite client to
//! verify that whole messages flow in both directions and that close is
//! observed as a clean end-of-stream.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use parlor_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on a random port and returns the transport plus its address.
    async fn bind_random() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_accept_and_send_receive_both_directions() {
        let (mut transport, addr) = bind_random().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("accept task");

        assert!(server_conn.id().into_inner() > 0);

        // Server → client.
        server_conn.send(b"hello from server").await.expect("send");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // Client → server.
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .expect("client send");
        let received = server_conn.recv().await.expect("recv");
        assert_eq!(received.as_deref(), Some(b"hello from client".as_ref()));
    }

    #[tokio::test]
    async fn test_text_frames_are_received_as_bytes() {
        let (mut transport, addr) = bind_random().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("accept task");

        client_ws
            .send(Message::Text(r#"{"type": "leave_room"}"#.into()))
            .await
            .expect("client send");

        let received = server_conn.recv().await.expect("recv");
        assert_eq!(
            received.as_deref(),
            Some(br#"{"type": "leave_room"}"#.as_ref())
        );
    }

    #[tokio::test]
    async fn test_client_close_is_clean_end_of_stream() {
        let (mut transport, addr) = bind_random().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("accept task");

        client_ws.close(None).await.expect("client close");

        let received = server_conn.recv().await.expect("recv");
        assert_eq!(received, None, "close should surface as Ok(None)");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique_across_accepts() {
        let (mut transport, addr) = bind_random().await;

        let server_handle = tokio::spawn(async move {
            let a = transport.accept().await.expect("accept a");
            let b = transport.accept().await.expect("accept b");
            (a, b)
        });

        let _client_a = connect_client(&addr).await;
        let _client_b = connect_client(&addr).await;
        let (conn_a, conn_b) = server_handle.await.expect("accept task");

        assert_ne!(conn_a.id(), conn_b.id());
    }

    #[tokio::test]
    async fn test_concurrent_send_while_recv_pending() {
        // A pending recv must not deadlock a send on the same connection —
        // the handler relies on this to select! over both directions.
        let (mut transport, addr) = bind_random().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = std::sync::Arc::new(server_handle.await.expect("accept task"));

        // Park a recv with nothing inbound.
        let recv_conn = std::sync::Arc::clone(&server_conn);
        let recv_task = tokio::spawn(async move { recv_conn.recv().await });

        // The send must complete while the recv is still pending.
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            server_conn.send(b"outbound"),
        )
        .await
        .expect("send should not deadlock")
        .expect("send");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"outbound");

        client_ws.close(None).await.expect("close");
        let received = recv_task.await.expect("join").expect("recv");
        assert_eq!(received, None);
    }
}
