use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use studio_intercom::protocol::discovery_probe;
use studio_intercom::{Discovery, TransportConfig};
use tokio::net::UdpSocket;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn config(port: u16) -> TransportConfig {
    TransportConfig::default()
        .with_port(port)
        .with_broadcast_addr(LOCALHOST)
        .with_bind_addr(LOCALHOST)
}

fn reply(text: &[u8], mac: [u8; 6]) -> Vec<u8> {
    let mut payload = vec![0xFF, 0xFF, 0x00, 0x40, 0x07, 0xE1, 0x00, 0x00];
    payload.extend_from_slice(text);
    payload.push(0x00);
    payload.extend_from_slice(&mac);
    payload
}

#[tokio::test]
async fn repeated_replies_from_one_address_collapse() {
    let device = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let port = device.local_addr().unwrap().port();

    let responder = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let (len, from) = device.recv_from(&mut buf).await.unwrap();
        device
            .send_to(&reply(b"Model209 v1.0.3", [0x00, 0x1D, 0xC1, 0x01, 0x02, 0x03]), from)
            .await
            .unwrap();
        device
            .send_to(&reply(b"Model5205 v2.4.0", [0x00, 0x1D, 0xC1, 0x04, 0x05, 0x06]), from)
            .await
            .unwrap();
        buf[..len].to_vec()
    });

    let devices = Discovery::with_config(config(port))
        .discover_for(Duration::from_millis(400))
        .await;

    let probe = responder.await.unwrap();
    assert_eq!(probe, discovery_probe());

    assert_eq!(devices.len(), 1);
    let device = &devices[0];
    assert_eq!(device.ip, LOCALHOST);
    assert_eq!(device.model, "Model5205");
    assert_eq!(device.firmware.as_deref(), Some("2.4.0"));
    assert_eq!(device.mac.as_deref(), Some("00:1D:C1:04:05:06"));
}

#[tokio::test]
async fn window_bounds_collection() {
    // Nothing answers: discovery returns empty once the window closes
    let silent = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let port = silent.local_addr().unwrap().port();

    let started = Instant::now();
    let devices = Discovery::with_config(config(port))
        .discover_for(Duration::from_millis(200))
        .await;
    let elapsed = started.elapsed();

    assert!(devices.is_empty());
    assert!(elapsed >= Duration::from_millis(190), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn socket_errors_end_discovery_quietly() {
    let config = TransportConfig::default()
        .with_bind_addr("203.0.113.7".parse().unwrap())
        .with_discovery_window(Duration::from_millis(100));

    let devices = Discovery::with_config(config).discover().await;
    assert!(devices.is_empty());
}
