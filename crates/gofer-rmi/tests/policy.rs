use gofer_messaging::{Document, InMemoryBroker, ManualClock, Message, MessagingError, Status, Transport};
use gofer_rmi::{Asynchronous, Catalog, Context, Dispatcher, Journal, Namespace, PolicyOptions, Progress, ProgressReport,
                Remote, Request, RmiError, Synchronous, Trigger, WatchDog};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const ROUTE: &str = "agent";

fn options() -> PolicyOptions {
    PolicyOptions { timeout: Duration::from_secs(2), wait: Duration::from_secs(2), ..Default::default() }
}

fn dispatcher() -> Dispatcher {
    let dog = Namespace::new("Dog").remote("bark", Remote::new(|_c, inv| Ok(json!(format!("woof {}", inv.arg::<String>(0)?)))))
                                   .remote("count", Remote::new(|ctx, _inv| {
                                       for i in 1..=3 {
                                           ctx.progress.report(3, i, json!({"step": i}));
                                       }
                                       Ok(json!(3))
                                   }));
    Dispatcher::new(Catalog::new().add(dog))
}

/// Agente mínimo: atiende `n` peticiones de la cola `ROUTE`.
fn serve(broker: Arc<InMemoryBroker>, n: usize) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let transport: Arc<dyn Transport> = broker.clone();
        let d = dispatcher();
        for _ in 0..n {
            let Some(msg) = broker.receive(ROUTE, Duration::from_secs(5)).unwrap() else { return };
            broker.ack(&msg).unwrap();
            let request = msg.document;
            let replyto = request.replyto.clone().unwrap();
            broker.send(&replyto, None, Document::status(&request.sn, request.data.clone(), Status::Started)).unwrap();
            let progress = Progress::new(&request.sn, request.data.clone(), Some(replyto.clone()), transport.clone());
            let ctx = Context::new(&request.sn, request.data.clone(), progress, Context::detached(&request.sn).cancelled);
            let result = d.dispatch_in(&ctx, &request);
            broker.send(&replyto, None, Document::reply(&request.sn, request.data.clone(), result)).unwrap();
        }
    })
}

#[test]
fn synchronous_round_trip() {
    let broker = Arc::new(InMemoryBroker::new());
    let agent = serve(broker.clone(), 1);
    let policy = Synchronous::new(broker.clone(), options());
    let value = policy.send(ROUTE, Request::new("Dog", "bark").arg("hi")).unwrap();
    assert_eq!(value, json!("woof hi"));
    agent.join().unwrap();
}

#[test]
fn synchronous_remote_errors_are_typed() {
    let broker = Arc::new(InMemoryBroker::new());
    let agent = serve(broker.clone(), 1);
    let policy = Synchronous::new(broker.clone(), options());
    match policy.send(ROUTE, Request::new("Cat", "meow")) {
        Err(RmiError::NamespaceNotFound(ns)) => assert_eq!(ns, "Cat"),
        other => panic!("se esperaba NamespaceNotFound: {:?}", other),
    }
    agent.join().unwrap();
}

#[test]
fn synchronous_progress_reaches_callback() {
    let broker = Arc::new(InMemoryBroker::new());
    let agent = serve(broker.clone(), 1);
    let seen: Arc<Mutex<Vec<ProgressReport>>> = Arc::default();
    let sink = seen.clone();
    let mut opts = options();
    opts.progress = Some(Arc::new(move |_sn: &str, report: &ProgressReport| sink.lock().unwrap().push(report.clone())));
    let value = Synchronous::new(broker.clone(), opts).send(ROUTE, Request::new("Dog", "count")).unwrap();
    assert_eq!(value, json!(3));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.iter().map(|r| r.completed).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(seen[0].details, json!({"step": 1}));
    agent.join().unwrap();
}

#[test]
fn synchronous_times_out_without_agent() {
    let broker = Arc::new(InMemoryBroker::new());
    let mut opts = options();
    opts.timeout = Duration::from_millis(50);
    match Synchronous::new(broker.clone(), opts).send(ROUTE, Request::new("Dog", "bark")) {
        Err(RmiError::RequestTimeout { .. }) => {}
        other => panic!("se esperaba RequestTimeout: {:?}", other),
    }
    assert_eq!(broker.depth(ROUTE), 1);
}

#[test]
fn synchronous_rejection_is_invalid_document() {
    let broker = Arc::new(InMemoryBroker::new());
    let rejecter = {
        let broker = broker.clone();
        thread::spawn(move || {
            let msg = broker.receive(ROUTE, Duration::from_secs(5)).unwrap().unwrap();
            broker.ack(&msg).unwrap();
            let replyto = msg.document.replyto.clone().unwrap();
            let doc = Document::rejected(&msg.document.sn, None, "model.version", "versión no válida", "x");
            broker.send(&replyto, None, doc).unwrap();
        })
    };
    match Synchronous::new(broker.clone(), options()).send(ROUTE, Request::new("Dog", "bark")) {
        Err(RmiError::InvalidDocument { code, .. }) => assert_eq!(code, "model.version"),
        other => panic!("se esperaba InvalidDocument: {:?}", other),
    }
    rejecter.join().unwrap();
}

#[test]
fn asynchronous_sends_and_returns_sn() {
    let broker = Arc::new(InMemoryBroker::new());
    let mut opts = options();
    opts.reply = Some("replies".into());
    opts.data = Some(json!({"job": 1}));
    opts.secret = Some("s".into());
    let sn = Asynchronous::new(broker.clone(), opts).send(ROUTE, Request::new("Dog", "bark").arg("x")).unwrap();
    let request = broker.receive(ROUTE, Duration::from_millis(50)).unwrap().unwrap().document;
    assert_eq!(request.sn, sn);
    assert_eq!(request.replyto.as_deref(), Some("replies"));
    assert_eq!(request.data, Some(json!({"job": 1})));
    assert_eq!(request.auth.and_then(|a| a.secret).as_deref(), Some("s"));
    assert_eq!(request.args, vec![json!("x")]);
}

#[test]
fn trigger_fires_once() {
    let broker = Arc::new(InMemoryBroker::new());
    let trigger = Trigger::new(Asynchronous::new(broker.clone(), options()), ROUTE, Request::new("Dog", "bark"));
    let sn = trigger.sn().to_string();
    assert_eq!(broker.depth(ROUTE), 0);
    assert_eq!(trigger.trigger().unwrap(), sn);
    assert_eq!(broker.depth(ROUTE), 1);
    assert!(matches!(trigger.trigger(), Err(RmiError::TriggerPulled(s)) if s == sn));
}

/// Transporte que anota, al enviar, si el watchdog ya vigilaba el sn; no
/// tiene ruta hacia `dead`.
struct Witness {
    broker: InMemoryBroker,
    watchdog: Arc<WatchDog>,
    tracked_at_send: Mutex<Vec<bool>>,
}

impl Transport for Witness {
    fn declare(&self, queue: &str) -> gofer_messaging::Result<()> {
        self.broker.declare(queue)
    }

    fn delete(&self, queue: &str) -> gofer_messaging::Result<()> {
        self.broker.delete(queue)
    }

    fn send(&self, destination: &str, ttl: Option<Duration>, document: Document) -> gofer_messaging::Result<String> {
        let tracked = self.watchdog.journal().find(&document.sn).map(|e| e.is_some()).unwrap_or(false);
        self.tracked_at_send.lock().unwrap().push(tracked);
        if destination == "dead" {
            return Err(MessagingError::Transport("no route".into()));
        }
        self.broker.send(destination, ttl, document)
    }

    fn receive(&self, queue: &str, timeout: Duration) -> gofer_messaging::Result<Option<Message>> {
        self.broker.receive(queue, timeout)
    }

    fn ack(&self, message: &Message) -> gofer_messaging::Result<()> {
        self.broker.ack(message)
    }

    fn reject(&self, message: &Message, requeue: bool) -> gofer_messaging::Result<()> {
        self.broker.reject(message, requeue)
    }
}

#[test]
fn asynchronous_tracks_before_sending() {
    let dir = tempfile::tempdir().unwrap();
    let broker = Arc::new(InMemoryBroker::new());
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let watchdog = Arc::new(WatchDog::new(Journal::open(dir.path()).unwrap(), broker, clock));
    let witness = Arc::new(Witness { broker: InMemoryBroker::new(),
                                     watchdog: watchdog.clone(),
                                     tracked_at_send: Mutex::new(Vec::new()) });
    let mut opts = options();
    opts.reply = Some("replies".into());
    let policy = Asynchronous::new(witness.clone(), opts).with_watchdog(watchdog.clone());

    let sn = policy.send(ROUTE, Request::new("Dog", "bark")).unwrap();
    assert!(watchdog.journal().find(&sn).unwrap().is_some());

    // un envío fallido no deja vigilancia huérfana
    assert!(matches!(policy.send("dead", Request::new("Dog", "bark")), Err(RmiError::Messaging(_))));
    assert_eq!(*witness.tracked_at_send.lock().unwrap(), vec![true, true]);
    assert_eq!(watchdog.journal().load().unwrap().len(), 1);
}
