//! STOMP session behavior against the fake broker.

use std::time::Duration;

use crate::helpers::*;
use stomp_probe::broker::{
    AckMode, BrokerError, BrokerSession, Connector, IncomingMessage, PublishOptions, Subscription,
    SubscriptionId, TEXT_PLAIN,
};
use stomp_probe::config::Credentials;
use stomp_probe::stomp::{StompConnector, StompSession};

async fn next_within(sub: &mut Subscription) -> Option<IncomingMessage> {
    tokio::time::timeout(Duration::from_secs(2), sub.next_message())
        .await
        .expect("subscription did not settle in time")
}

async fn connect(broker: &FakeBroker) -> StompSession {
    StompConnector::new()
        .connect(&broker.broker_config())
        .await
        .unwrap()
}

async fn wait_closed(session: &StompSession) {
    for _ in 0..200 {
        if session.is_closed() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never noticed the connection was gone");
}

#[tokio::test]
async fn test_handshake_sends_credentials() {
    let creds = Credentials::new("monitor", "hunter2");
    let broker = FakeBroker::start(Behavior {
        require_login: Some(creds.clone()),
        ..Behavior::default()
    })
    .await;

    let session = StompConnector::new()
        .connect(&broker.broker_config().with_credentials(creds))
        .await
        .unwrap();

    let connect = broker.connect_frame().expect("handshake frame");
    assert_eq!(connect.get("login"), Some("monitor"));
    assert_eq!(connect.get("passcode"), Some("hunter2"));
    assert!(!session.is_closed());
    assert_eq!(session.address(), broker.addr.to_string());

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_then_publish_round_trip() {
    let broker = FakeBroker::start(Behavior {
        echo: true,
        ..Behavior::default()
    })
    .await;
    let session = connect(&broker).await;

    let mut sub = session.subscribe("probe.q", AckMode::Auto).await.unwrap();
    session
        .publish("probe.q", TEXT_PLAIN, b"8675309", PublishOptions { durable: true })
        .await
        .unwrap();

    let msg = next_within(&mut sub).await.expect("echoed message");
    assert!(msg.is_text_plain());
    assert_eq!(msg.body_text(), "8675309");
    assert!(msg.error.is_none());

    let subscribe = &broker.frames_named("SUBSCRIBE")[0];
    assert_eq!(subscribe.get("id"), Some(sub.id().0.as_str()));
    assert_eq!(subscribe.get("ack"), Some("auto"));
    let send = &broker.frames_named("SEND")[0];
    assert_eq!(send.get("persistent"), Some("true"));
    assert_eq!(send.get("content-type"), Some("text/plain"));

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_closes_subscription_and_is_idempotent() {
    let broker = FakeBroker::start(Behavior::default()).await;
    let session = connect(&broker).await;

    let mut sub = session.subscribe("probe.q", AckMode::Auto).await.unwrap();
    let id = sub.id().clone();

    session.unsubscribe(&id).await.unwrap();
    session.unsubscribe(&id).await.unwrap();
    session
        .unsubscribe(&SubscriptionId("never-existed".into()))
        .await
        .unwrap();

    assert!(next_within(&mut sub).await.is_none());
    // Only one UNSUBSCRIBE went over the wire
    assert_eq!(broker.wait_for("UNSUBSCRIBE", 1).await.len(), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.frames_named("UNSUBSCRIBE").len(), 1);

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let broker = FakeBroker::start(Behavior::default()).await;
    let session = connect(&broker).await;
    let mut sub = session.subscribe("probe.q", AckMode::Auto).await.unwrap();

    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();

    assert!(session.is_closed());
    assert!(next_within(&mut sub).await.is_none());

    // Cleanup after disconnect must not fail either
    session.unsubscribe(sub.id()).await.unwrap();
}

#[tokio::test]
async fn test_publish_after_disconnect_fails() {
    let broker = FakeBroker::start(Behavior::default()).await;
    let session = connect(&broker).await;
    session.disconnect().await.unwrap();

    let err = session
        .publish("probe.q", TEXT_PLAIN, b"1", PublishOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Closed);

    let err = session
        .subscribe("probe.q", AckMode::Auto)
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Closed);
}

#[tokio::test]
async fn test_connection_loss_closes_subscriptions() {
    let broker = FakeBroker::start(Behavior {
        close_after_subscribe: true,
        ..Behavior::default()
    })
    .await;
    let session = connect(&broker).await;

    let mut sub = session.subscribe("probe.q", AckMode::Auto).await.unwrap();

    assert!(next_within(&mut sub).await.is_none());
    // Disconnect on a dead connection still returns
    let _ = tokio::time::timeout(Duration::from_secs(3), session.disconnect())
        .await
        .expect("disconnect hung");
}

#[tokio::test]
async fn test_operations_fail_after_connection_loss() {
    let broker = FakeBroker::start(Behavior {
        close_after_connected: true,
        ..Behavior::default()
    })
    .await;
    let session = connect(&broker).await;

    // Racing the reader: either refused, or opened and then closed
    match session.subscribe("probe.q", AckMode::Auto).await {
        Ok(mut sub) => assert!(next_within(&mut sub).await.is_none()),
        Err(e) => assert_eq!(e, BrokerError::Closed),
    }

    wait_closed(&session).await;

    let err = session
        .subscribe("probe.q", AckMode::Auto)
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Closed);
    let err = session
        .publish("probe.q", TEXT_PLAIN, b"1", PublishOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Closed);

    let _ = tokio::time::timeout(Duration::from_secs(3), session.disconnect())
        .await
        .expect("disconnect hung");
}

#[tokio::test]
async fn test_oversized_content_length_closes_session() {
    let broker = FakeBroker::start(Behavior {
        raw_after_subscribe: Some(
            format!(
                "MESSAGE\nsubscription:sub-0\ncontent-length:{}\n\n\0",
                u64::MAX
            )
            .into_bytes(),
        ),
        ..Behavior::default()
    })
    .await;
    let session = connect(&broker).await;

    let mut sub = session.subscribe("probe.q", AckMode::Auto).await.unwrap();

    assert!(next_within(&mut sub).await.is_none());
    wait_closed(&session).await;
    let _ = tokio::time::timeout(Duration::from_secs(3), session.disconnect())
        .await
        .expect("disconnect hung");
}

#[tokio::test]
async fn test_broker_error_reaches_subscription() {
    let broker = FakeBroker::start(Behavior {
        error_on_subscribe: Some("access denied".into()),
        ..Behavior::default()
    })
    .await;
    let session = connect(&broker).await;

    let mut sub = session.subscribe("probe.q", AckMode::Auto).await.unwrap();

    let msg = next_within(&mut sub).await.expect("error delivery");
    assert_eq!(msg.error.as_deref(), Some("access denied"));

    session.disconnect().await.unwrap();
}
