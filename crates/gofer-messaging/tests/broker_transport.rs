use gofer_messaging::{Document, InMemoryBroker, MessagingError, Reader, SharedKeyAuthenticator, Transport,
                      CODE_AUTHENTICATION};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SHORT: Duration = Duration::from_millis(50);

#[test]
fn send_receive_ack() {
    let broker = InMemoryBroker::new();
    let sn = broker.send("q", Some(Duration::from_secs(5)), Document::request("Dog", "bark")).unwrap();
    assert!(!sn.is_empty());

    let msg = broker.receive("q", SHORT).unwrap().expect("mensaje");
    assert_eq!(msg.document.sn, sn);
    assert_eq!(msg.document.ttl, Some(5.0));
    assert_eq!(broker.unacked(), 1);
    broker.ack(&msg).unwrap();
    assert_eq!(broker.unacked(), 0);
    assert!(broker.receive("q", SHORT).unwrap().is_none());
}

#[test]
fn reject_with_requeue_redelivers() {
    let broker = InMemoryBroker::new();
    broker.send("q", None, Document::request("Dog", "bark")).unwrap();
    let first = broker.receive("q", SHORT).unwrap().unwrap();
    broker.reject(&first, true).unwrap();
    let second = broker.receive("q", SHORT).unwrap().unwrap();
    assert_eq!(first.document.sn, second.document.sn);
    broker.reject(&second, false).unwrap();
    assert_eq!(broker.depth("q"), 0);
}

#[test]
fn receive_wakes_on_send() {
    let broker = Arc::new(InMemoryBroker::new());
    let sender = broker.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        sender.send("q", None, Document::request("Dog", "bark")).unwrap()
    });
    let msg = broker.receive("q", Duration::from_secs(2)).unwrap().expect("mensaje");
    assert_eq!(msg.document.sn, handle.join().unwrap());
}

#[test]
fn search_skips_other_serial_numbers() {
    let broker: Arc<dyn Transport> = Arc::new(InMemoryBroker::new());
    let mut other = Document::request("Dog", "bark");
    other.sn = "other".into();
    broker.send("reply", None, other).unwrap();
    let mut wanted = Document::request("Dog", "bark");
    wanted.sn = "wanted".into();
    broker.send("reply", None, wanted).unwrap();

    let reader = Reader::new(broker, "reply");
    let found = reader.search("wanted", SHORT).unwrap().expect("documento");
    assert_eq!(found.sn, "wanted");
    assert!(reader.search("wanted", SHORT).unwrap().is_none());
}

#[test]
fn signed_messages_validate_with_same_key() {
    let broker = InMemoryBroker::with_authenticator(Arc::new(SharedKeyAuthenticator::new("k1")));
    let sn = broker.send("q", None, Document::request("Dog", "bark")).unwrap();
    let msg = broker.receive("q", SHORT).unwrap().unwrap();
    assert_eq!(msg.document.sn, sn);
}

#[test]
fn tampered_or_unsigned_messages_fail_validation() {
    let broker = InMemoryBroker::with_authenticator(Arc::new(SharedKeyAuthenticator::new("k1")));
    broker.push_raw("q", r#"{"sn":"1","version":"2.0"}"#);
    match broker.receive("q", SHORT) {
        Err(MessagingError::InvalidDocument { code, .. }) => assert_eq!(code, CODE_AUTHENTICATION),
        other => panic!("se esperaba fallo de validación: {:?}", other.map(|m| m.map(|m| m.document.sn))),
    }

    let mut doc = Document::request("Dog", "bark");
    doc.sn = "2".into();
    let body = gofer_messaging::auth::sign(Some(&SharedKeyAuthenticator::new("k2")), &doc).unwrap();
    broker.push_raw("q", &body);
    assert!(broker.receive("q", SHORT).is_err());
    assert_eq!(broker.depth("q"), 0);
}
