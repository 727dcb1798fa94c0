//! Integration tests for the palaver library.
//! These tests run the HTTP client against a one-shot server on localhost.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use palaver::chat::{ChatSession, UNTERMINATED};
    use palaver::{
        Attachment, ChatClient, ChatConfig, DisplaySegment, FileData, MessageRole, MessageStatus,
        render_error, segment,
    };
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    struct CapturedRequest {
        head: String,
        body: Value,
    }

    /// Serve one HTTP request, answering with `status` and then each of
    /// `chunks` in turn before closing the connection.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        chunks: Vec<&'static str>,
    ) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = Vec::new();
            let mut scratch = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut scratch).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buffer.extend_from_slice(&scratch[..n]);
                if let Some(at) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                    break at + 4;
                }
            };
            let head = String::from_utf8(buffer[..header_end].to_vec()).unwrap();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            while buffer.len() < header_end + content_length {
                let n = socket.read(&mut scratch).await.unwrap();
                assert!(n > 0, "client closed before sending the body");
                buffer.extend_from_slice(&scratch[..n]);
            }
            let body =
                serde_json::from_slice(&buffer[header_end..header_end + content_length]).unwrap();

            let response_head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n"
            );
            socket.write_all(response_head.as_bytes()).await.unwrap();
            for chunk in chunks {
                socket.write_all(chunk.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = socket.shutdown().await;
            CapturedRequest { head, body }
        });
        (base_url, handle)
    }

    fn session_for(base_url: &str) -> ChatSession {
        let config = ChatConfig::new()
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(10));
        let client = ChatClient::from_config(&config).unwrap();
        ChatSession::new(Box::new(client))
    }

    #[tokio::test]
    async fn test_streaming_exchange() {
        let (base_url, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![
                "data: {\"text\": \"Try this:\\n\"}\n\n",
                "data: {\"text\": \"```py\\nprint(1)\\n``",
                "`\"}\n\ndata: {\"done\": true}\n\n",
            ],
        )
        .await;
        let mut session = session_for(&base_url);

        let outcome = session.send("hello", None).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.head.starts_with("POST /api/chat HTTP/1.1\r\n"));
        assert_eq!(request.body, json!({"message": "hello", "file_data": null}));

        assert_eq!(outcome.status, MessageStatus::Complete);
        let answer = session.conversation().get(outcome.assistant).unwrap();
        assert_eq!(answer.role, MessageRole::Assistant);
        assert_eq!(answer.text, "Try this:\n```py\nprint(1)\n```");
        assert_eq!(
            segment(&answer.text),
            vec![
                DisplaySegment::prose("Try this:\n"),
                DisplaySegment::code("py", "print(1)\n"),
            ]
        );
    }

    #[tokio::test]
    async fn test_in_band_error() {
        let (base_url, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![
                "data: {\"text\": \"Thinking\"}\n\n",
                "data: {\"error\": \"model overloaded\"}\n\n",
            ],
        )
        .await;
        let mut session = session_for(&base_url);

        let outcome = session.send("hello", None).await.unwrap();
        server.await.unwrap();

        assert_eq!(outcome.status, MessageStatus::Failed);
        let answer = session.conversation().get(outcome.assistant).unwrap();
        assert_eq!(answer.text, render_error("model overloaded"));
        assert!(session.conversation().active().is_none());
    }

    #[tokio::test]
    async fn test_error_status() {
        let (base_url, server) = serve_once(
            "503 Service Unavailable",
            "application/json",
            vec!["{\"error\": \"no capacity\"}"],
        )
        .await;
        let mut session = session_for(&base_url);

        let outcome = session.send("hello", None).await.unwrap();
        server.await.unwrap();

        assert_eq!(outcome.status, MessageStatus::Failed);
        let text = &session.conversation().get(outcome.assistant).unwrap().text;
        assert!(text.starts_with("Sorry, something went wrong: "));
        assert!(text.contains("503"));
        assert!(text.contains("no capacity"));
    }

    #[tokio::test]
    async fn test_unterminated_stream() {
        let (base_url, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec!["data: {\"text\": \"half an ans\"}\n\n"],
        )
        .await;
        let mut session = session_for(&base_url);

        let outcome = session.send("hello", None).await.unwrap();
        server.await.unwrap();

        assert_eq!(outcome.status, MessageStatus::Failed);
        assert_eq!(
            session.conversation().get(outcome.assistant).unwrap().text,
            render_error(UNTERMINATED)
        );
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let mut session = session_for(&base_url);

        let outcome = session.send("hello", None).await.unwrap();
        assert_eq!(outcome.status, MessageStatus::Failed);
        assert!(
            session
                .conversation()
                .get(outcome.assistant)
                .unwrap()
                .text
                .starts_with("Sorry, something went wrong: ")
        );

        // The failed exchange released the stream; the next one may start.
        assert!(session.conversation().active().is_none());
    }

    #[tokio::test]
    async fn test_attachment_is_sent() {
        let (base_url, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec!["data: {\"text\": \"Got it.\"}\ndata: {\"done\": true}\n"],
        )
        .await;
        let path = std::env::temp_dir().join(format!("palaver-it-{}.txt", std::process::id()));
        std::fs::write(&path, b"hello").unwrap();
        let attachment = Attachment::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let mut session = session_for(&base_url);

        let outcome = session.send("summarize", Some(&attachment)).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(outcome.status, MessageStatus::Complete);
        let expected = FileData::from_bytes("text/plain", b"hello");
        assert_eq!(
            request.body,
            json!({
                "message": "summarize",
                "file_data": {"mime_type": expected.mime_type, "data": "aGVsbG8="},
            })
        );
        let user = session.conversation().get(outcome.user).unwrap();
        assert_eq!(
            user.text,
            format!("summarize\n[Attached file: {}]", attachment.name)
        );
    }
}
