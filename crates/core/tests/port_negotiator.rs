//! Integration tests for local port negotiation.

use lk_core::ports::{PortError, PortNegotiator};
use tokio::net::TcpListener;

const HOST: &str = "127.0.0.1";

/// Find `P` with `P` and `P + 1` held and `P + 2` free at the time of the call.
async fn two_adjacent_occupied() -> (u16, TcpListener, TcpListener) {
    for _ in 0..50 {
        let first = TcpListener::bind((HOST, 0)).await.unwrap();
        let port = first.local_addr().unwrap().port();
        if port > 65_000 {
            continue;
        }
        let Ok(second) = TcpListener::bind((HOST, port + 1)).await else {
            continue;
        };
        if TcpListener::bind((HOST, port + 2)).await.is_err() {
            continue;
        }
        return (port, first, second);
    }
    panic!("could not find three adjacent ports");
}

#[tokio::test]
async fn test_free_preferred_port_is_returned_unchanged() {
    let port = {
        let probe = TcpListener::bind((HOST, 0)).await.unwrap();
        probe.local_addr().unwrap().port()
    };

    let binding = PortNegotiator::default().reserve(HOST, port).await.unwrap();

    assert_eq!(binding.port, port);
    assert_eq!(binding.requested, port);
    assert_eq!(binding.host, HOST);
    assert!(!binding.was_relocated());
}

#[tokio::test]
async fn test_skips_occupied_ports() {
    let (preferred, _first, _second) = two_adjacent_occupied().await;

    let binding = PortNegotiator::default().reserve(HOST, preferred).await.unwrap();

    assert_eq!(binding.port, preferred + 2);
    assert_eq!(binding.requested, preferred);
    assert!(binding.was_relocated());
}

#[tokio::test]
async fn test_attempt_ceiling_is_respected() {
    let (preferred, _first, _second) = two_adjacent_occupied().await;

    let result = PortNegotiator::new(2).reserve(HOST, preferred).await;

    match result {
        Err(PortError::Exhausted { first, last, .. }) => {
            assert_eq!(first, preferred);
            assert_eq!(last, preferred + 1);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_range_never_wraps_past_65535() {
    // Only meaningful when the top port can be held by the test.
    let Ok(_top) = TcpListener::bind((HOST, u16::MAX)).await else {
        return;
    };

    let result = PortNegotiator::new(10).reserve(HOST, u16::MAX).await;

    assert!(matches!(
        result,
        Err(PortError::Exhausted { last: u16::MAX, .. })
    ));
}

#[tokio::test]
async fn test_reserved_port_is_released() {
    let port = {
        let probe = TcpListener::bind((HOST, 0)).await.unwrap();
        probe.local_addr().unwrap().port()
    };
    let binding = PortNegotiator::default().reserve(HOST, port).await.unwrap();
    TcpListener::bind((HOST, binding.port))
        .await
        .expect("negotiated port must be free for the consumer");
}
