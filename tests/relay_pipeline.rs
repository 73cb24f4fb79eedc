//! End-to-end tests: real relay server, publisher and listeners over loopback.

use futures::StreamExt;
use skeleton_relay::config::{PublisherConfig, ServerConfig};
use skeleton_relay::{
    JOINT_COUNT, Joint, JointCoord, JointId, JointPayload, PayloadExtractor, PublishOutcome,
    Publisher, RelayConfig, RelayServerBuilder, RelayServerHandle, SkeletonCandidate,
    SkeletonFrame, SkeletonRelay, TrackingState,
};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

type Listener = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn loopback_server() -> ServerConfig {
    ServerConfig { listen: "127.0.0.1:0".parse().unwrap(), ..ServerConfig::default() }
}

/// Shoulder center at (0.1, 0.2, 0.5), head unresolved.
fn scenario_frame(frame_number: u32) -> SkeletonFrame {
    let mut joints = vec![Joint::default(); JOINT_COUNT];
    joints[JointId::SHOULDER_CENTER.index()] = Joint::new(0.1, 0.2, 0.5);
    joints[JointId::HIP_CENTER.index()] = Joint::new(0.01, -0.1, 2.1);
    SkeletonFrame::new(frame_number, vec![SkeletonCandidate::new(TrackingState::Tracked, joints)])
}

fn expected_payload() -> JointPayload {
    [(JointId::SHOULDER_CENTER, JointCoord::new(384, 144))].into_iter().collect()
}

async fn wait_for_clients(server: &RelayServerHandle, count: usize) {
    timeout(Duration::from_secs(2), async {
        while server.client_count() < count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("clients never connected");
}

async fn next_payload(listener: &mut Listener) -> JointPayload {
    loop {
        let message = timeout(Duration::from_secs(2), listener.next())
            .await
            .expect("no payload received")
            .expect("connection ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return JointPayload::from_json(&text).expect("listener received a non-payload message");
        }
    }
}

#[tokio::test]
async fn published_payload_reaches_every_listener() {
    let mut server = RelayServerBuilder::new(loopback_server()).spawn().await.unwrap();
    let (mut first, _) = connect_async(server.url()).await.unwrap();
    let (mut second, _) = connect_async(server.url()).await.unwrap();

    let mut publisher = Publisher::connect(&PublisherConfig::new(server.url())).await;
    wait_for_clients(&server, 3).await;

    let extractor = PayloadExtractor::default();
    let payload = extractor.extract(&scenario_frame(1).candidates[0]);
    assert_eq!(payload.to_json().unwrap(), r#"{"joint_2":{"x":384,"y":144}}"#);

    assert_eq!(publisher.publish(&payload).await.unwrap(), PublishOutcome::Sent);
    assert_eq!(next_payload(&mut first).await, expected_payload());
    assert_eq!(next_payload(&mut second).await, expected_payload());

    publisher.close().await;
    publisher.close().await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn publisher_recovers_when_relay_comes_up() {
    // Reserve a free port, then release it so the relay is initially down.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let url = format!("ws://{addr}/ws");

    let config = PublisherConfig { connect_timeout_ms: 200, ..PublisherConfig::new(url) };
    let mut publisher = Publisher::connect(&config).await;
    assert_eq!(publisher.publish(&expected_payload()).await.unwrap(), PublishOutcome::Dropped);

    let mut server =
        RelayServerBuilder::new(ServerConfig { listen: addr, ..ServerConfig::default() }).spawn().await.unwrap();
    let (mut listener, _) = connect_async(server.url()).await.unwrap();
    wait_for_clients(&server, 1).await;

    assert_eq!(publisher.publish(&expected_payload()).await.unwrap(), PublishOutcome::Sent);
    assert_eq!(next_payload(&mut listener).await, expected_payload());
    assert_eq!(publisher.stats().connects, 1);

    publisher.close().await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn sensor_frames_flow_through_to_listeners() {
    let mut relay = RelayConfig::default();
    relay.server = loopback_server();
    let mut server = SkeletonRelay::serve(&relay).await.unwrap();
    let (mut listener, _) = connect_async(server.url()).await.unwrap();
    wait_for_clients(&server, 1).await;

    relay.publisher.url = server.url();
    let (sensor, mut driver) = SkeletonRelay::live(&relay, 8);

    assert!(sensor.deliver(scenario_frame(1)));
    assert_eq!(next_payload(&mut listener).await, expected_payload());
    assert!(driver.detection().is_present);

    let report = driver.shutdown().await.unwrap();
    assert_eq!(report.frames, 1);
    assert_eq!(report.publisher.sent, 1);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn relay_that_stops_reading_does_not_block_publishing() {
    // Completes the handshake, then never reads from the socket.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let stalled = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _socket = accept_async(stream).await.unwrap();
        std::future::pending::<()>().await;
    });

    let config = PublisherConfig { send_timeout_ms: 100, ..PublisherConfig::new(url) };
    let mut publisher = Publisher::connect(&config).await;

    // Large payloads fill the socket buffers quickly.
    let payload: JointPayload =
        (0..=u8::MAX).map(|id| (JointId(id), JointCoord::new(i32::MAX, i32::MIN))).collect();

    let mut dropped = false;
    for _ in 0..100_000 {
        let started = Instant::now();
        let outcome = publisher.publish(&payload).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2), "publish blocked for {:?}", started.elapsed());
        if outcome == PublishOutcome::Dropped {
            dropped = true;
            break;
        }
    }
    assert!(dropped, "stalled relay never caused a drop");

    publisher.close().await;
    stalled.abort();
}
