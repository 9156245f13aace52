use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::{Duration, Instant};

use studio_intercom::protocol::{self, Command, HEADER_LEN};
use studio_intercom::{
    CommandRequest, IntercomClient, IntercomError, SchemaRegistry, SettingValue, Transactor,
    TransportConfig,
};
use tokio::net::UdpSocket;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn device_socket() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn config(port: u16, timeout: Duration) -> TransportConfig {
    TransportConfig::default()
        .with_port(port)
        .with_ack_timeout(timeout)
        .with_bind_addr(LOCALHOST)
}

#[tokio::test]
async fn silent_device_times_out() {
    // Bound but never answers
    let (_device, port) = device_socket().await;
    let transactor = Transactor::with_config(config(port, Duration::from_millis(200)));

    let started = Instant::now();
    let err = transactor
        .send_await_ack(
            CommandRequest::new("Model209", 13, LOCALHOST)
                .with_setting(0x0A)
                .with_value(SettingValue::Bool(true)),
        )
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    match err {
        IntercomError::Timeout { model, addr } => {
            assert_eq!(model, "Model209");
            assert_eq!(addr, SocketAddr::new(LOCALHOST, port));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(elapsed >= Duration::from_millis(190), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn first_reply_is_returned() {
    let (device, port) = device_socket().await;
    let server = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let (len, from) = device.recv_from(&mut buf).await.unwrap();
        device.send_to(b"ACK-1", from).await.unwrap();
        device.send_to(b"ACK-2", from).await.unwrap();
        buf[..len].to_vec()
    });

    let transactor = Transactor::with_config(config(port, Duration::from_secs(2)));
    let reply = transactor
        .send_await_ack(
            CommandRequest::new("Model209", 13, LOCALHOST)
                .with_setting(0x0A)
                .with_value(SettingValue::Bool(true)),
        )
        .await
        .unwrap();
    assert_eq!(reply, b"ACK-1");

    let sent = server.await.unwrap();
    assert_eq!(sent, protocol::build_packet(13, Some(0x0A), &[0x01], true));
    assert!(protocol::verify_frame(&sent).is_ok());
}

#[tokio::test]
async fn reply_from_any_source_counts_as_ack() {
    let (device, port) = device_socket().await;
    let server = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let (_, from) = device.recv_from(&mut buf).await.unwrap();
        let stranger = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        stranger.send_to(&[0x42], from).await.unwrap();
    });

    let transactor = Transactor::with_config(config(port, Duration::from_secs(2)));
    let reply = transactor
        .transact("Model209", SocketAddr::new(LOCALHOST, port), &Command::reset().encode())
        .await
        .unwrap();
    assert_eq!(reply, vec![0x42]);
    server.await.unwrap();
}

#[tokio::test]
async fn parameterless_helpers_send_bare_commands() {
    let (device, port) = device_socket().await;
    let server = tokio::spawn(async move {
        let mut packets = Vec::new();
        let mut buf = [0u8; 256];
        for _ in 0..2 {
            let (len, from) = device.recv_from(&mut buf).await.unwrap();
            packets.push(buf[..len].to_vec());
            device.send_to(&[0x00], from).await.unwrap();
        }
        packets
    });

    let transactor = Transactor::with_config(config(port, Duration::from_secs(2)));
    transactor.request_all_settings("Model209", LOCALHOST).await.unwrap();
    transactor.reset_device("Model209", LOCALHOST).await.unwrap();

    let packets = server.await.unwrap();
    assert_eq!(&packets[0][HEADER_LEN..HEADER_LEN + 2], &[0x5A, protocol::GET_ALL_SETTINGS_COMMAND]);
    assert_eq!(&packets[1][HEADER_LEN..HEADER_LEN + 2], &[0x5A, protocol::RESET_COMMAND]);
    assert!(packets.iter().all(|p| p.len() == HEADER_LEN + 3));
}

#[tokio::test]
async fn bind_failure_is_a_socket_error() {
    // TEST-NET-3 is never a local address
    let config = TransportConfig::default()
        .with_bind_addr("203.0.113.7".parse().unwrap())
        .with_ack_timeout(Duration::from_millis(100));
    let transactor = Transactor::with_config(config);

    let err = transactor
        .send_await_ack(CommandRequest::new("Model209", 13, LOCALHOST))
        .await
        .unwrap_err();
    assert!(matches!(err, IntercomError::Io(_)));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn client_invokes_schema_actions_over_udp() {
    let (device, port) = device_socket().await;
    let server = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let (len, from) = device.recv_from(&mut buf).await.unwrap();
        device.send_to(&[0xAA], from).await.unwrap();
        buf[..len].to_vec()
    });

    let registry = SchemaRegistry::load_dir(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/schemas"),
    )
    .unwrap();
    let client = IntercomClient::new(registry, config(port, Duration::from_secs(2)));

    let reply = client
        .invoke("Model209:33:1", LOCALHOST, SettingValue::Int(0x0000FF))
        .await
        .unwrap();
    assert_eq!(reply, vec![0xAA]);

    let sent = server.await.unwrap();
    let body = protocol::verify_frame(&sent).unwrap();
    assert_eq!(body, &[0x5A, 0x21, 0x05, 0x01, 0x00, 0x00, 0xFF]);

    let err = client
        .invoke("Model209:33:1", LOCALHOST, SettingValue::Bool(true))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
