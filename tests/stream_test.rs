use futures_util::{SinkExt, StreamExt};
use idle_guard::{ActivityKey, EngineConfig, IngestLoop, MonitorConfig, StateStore, StreamSettings, ZoneConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

fn config_for(url: String) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.ws_url = url;
    config.ws_user = "viewer".into();
    config.ws_password = "secret".into();

    let mut monitor = MonitorConfig::default();
    monitor.zones.insert("Litter".into(), ZoneConfig::new("litter", 60.0));
    monitor.zones.insert("Drink".into(), ZoneConfig::new("drink", 60.0));
    config.monitors.insert("12".into(), monitor);
    config
}

/// 每个连接：读取认证帧，回复认证结果，推送一条事件，然后关闭连接
async fn serve(listener: TcpListener, causes: Vec<&'static str>, auth_frames: Arc<Mutex<Vec<String>>>) {
    for (i, cause) in causes.into_iter().enumerate() {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();

        if let Some(Ok(Message::Text(auth))) = ws.next().await {
            auth_frames.lock().unwrap().push(auth);
        }

        ws.send(Message::Text(r#"{"event":"auth","status":"Success"}"#.to_string()))
            .await
            .unwrap();
        // 格式错误的帧不应中断会话
        ws.send(Message::Text("{broken".to_string())).await.unwrap();
        let event = serde_json::json!({"events": [{"EventId": 100 + i, "MonitorId": "12", "Cause": cause}]});
        ws.send(Message::Text(event.to_string())).await.unwrap();
        ws.close(None).await.ok();
    }
}

async fn wait_for(store: &StateStore, key: &ActivityKey) -> bool {
    for _ in 0..200 {
        if store.last_seen(key).is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_ingest_reconnects_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let auth_frames = Arc::new(Mutex::new(Vec::new()));

    let server = tokio::spawn(serve(
        listener,
        vec!["Linked: Litter Zone, obj: motion", "Motion: Drink Bottle"],
        auth_frames.clone(),
    ));

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(config_for(url));
    let store = Arc::new(StateStore::open(dir.path().join("state.json")));

    let mut settings = StreamSettings::from_config(&config);
    settings.backoff_base = Duration::from_millis(20);
    settings.backoff_cap = Duration::from_millis(50);
    let ingest = tokio::spawn(IngestLoop::new(settings, config.clone(), store.clone()).run());

    let litter = ActivityKey::new("12", "Litter");
    let drink = ActivityKey::new("12", "Drink");
    assert!(wait_for(&store, &litter).await, "first session event not recorded");
    // 第二条事件只能在重连后收到
    assert!(wait_for(&store, &drink).await, "event after reconnect not recorded");

    ingest.abort();
    server.await.unwrap();

    let frames = auth_frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 2);
    for frame in frames {
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "auth");
        assert_eq!(value["data"]["user"], "viewer");
        assert_eq!(value["data"]["password"], "secret");
    }
}

#[tokio::test]
async fn test_ingest_survives_unreachable_upstream() {
    // 先占用再释放端口，保证连接被拒绝
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(config_for(format!("ws://{}", addr)));
    let store = Arc::new(StateStore::open(dir.path().join("state.json")));

    let mut settings = StreamSettings::from_config(&config);
    settings.backoff_base = Duration::from_millis(10);
    settings.backoff_cap = Duration::from_millis(20);
    let ingest = tokio::spawn(IngestLoop::new(settings, config, store.clone()).run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!ingest.is_finished(), "ingest loop must keep retrying");
    assert!(store.snapshot().is_empty());
    ingest.abort();
}

#[tokio::test]
async fn test_silent_stream_forces_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    // 接收认证帧后不再发送任何消息，连接保持打开
    let (accepted_tx, mut accepted_rx) = tokio::sync::mpsc::unbounded_channel();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            let _ = ws.next().await;
            accepted_tx.send(()).ok();
            held.push(ws);
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(config_for(url));
    let store = Arc::new(StateStore::open(dir.path().join("state.json")));

    let mut settings = StreamSettings::from_config(&config);
    settings.read_timeout = Duration::from_millis(200);
    settings.ping_interval = Duration::from_secs(60);
    settings.backoff_base = Duration::from_millis(10);
    settings.backoff_cap = Duration::from_millis(20);
    let ingest = tokio::spawn(IngestLoop::new(settings, config, store.clone()).run());

    for attempt in 1..=2 {
        let accepted = tokio::time::timeout(Duration::from_secs(3), accepted_rx.recv()).await;
        assert!(matches!(accepted, Ok(Some(()))), "connection {} not seen", attempt);
    }

    ingest.abort();
    server.abort();
    assert!(store.snapshot().is_empty());
}
