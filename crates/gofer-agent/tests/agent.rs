use chrono::{Duration as Span, Utc};
use gofer_agent::{Agent, AgentConfig, CommitPolicy, PendingStore, PluginSpec, TaskContext, Transaction};
use gofer_messaging::{Document, InMemoryBroker, ManualClock, Reader, Status, Transport, Window};
use gofer_rmi::{marshal, Asynchronous, Catalog, Dispatcher, Namespace, PolicyOptions, Remote, Request, RmiError, Synchronous,
                Tracker};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const QUEUE: &str = "gofer";

fn dog() -> Namespace {
    Namespace::new("Dog").remote("bark", Remote::new(|_c, inv| Ok(json!(format!("woof {}", inv.arg::<String>(0)?)))))
                         .remote("boom", Remote::new(|_c, _inv| panic!("perro roto")))
                         .remote("wait", Remote::new(|ctx, _inv| {
                             let deadline = Instant::now() + Duration::from_secs(5);
                             while Instant::now() < deadline {
                                 if ctx.is_cancelled() {
                                     return Ok(json!("cancelled"));
                                 }
                                 thread::sleep(Duration::from_millis(10));
                             }
                             Ok(json!("finished"))
                         }))
}

fn start(dir: &tempfile::TempDir) -> (Agent, Arc<InMemoryBroker>) {
    start_with(dir, CommitPolicy::Handoff)
}

fn start_with(dir: &tempfile::TempDir, commit: CommitPolicy) -> (Agent, Arc<InMemoryBroker>) {
    let broker = Arc::new(InMemoryBroker::new());
    let mut config = AgentConfig::rooted(dir.path());
    config.queue = QUEUE.into();
    config.commit = commit;
    config.delayed_poll = Duration::from_millis(50);
    let agent = Agent::builder(config, broker.clone()).plugin(PluginSpec::new("dog").threads(2).namespace(dog()))
                                                       .start()
                                                       .unwrap();
    (agent, broker)
}

fn sync(broker: &Arc<InMemoryBroker>) -> Synchronous {
    Synchronous::new(broker.clone(), PolicyOptions { timeout: Duration::from_secs(5), wait: Duration::from_secs(10), ..Default::default() })
}

#[test]
fn synchronous_call_through_the_agent() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    let value = sync(&broker).send(QUEUE, Request::new("Dog", "bark").arg("hi")).unwrap();
    assert_eq!(value, json!("woof hi"));
    agent.shutdown();
    assert_eq!(fs::read_dir(dir.path().join("pending")).unwrap().count(), 0);
}

#[test]
fn panicking_method_still_replies_and_commits() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start_with(&dir, CommitPolicy::Reply);
    match sync(&broker).send(QUEUE, Request::new("Dog", "boom")) {
        Err(RmiError::ModelFailed(reason)) => assert!(reason.contains("perro roto")),
        other => panic!("se esperaba ModelFailed: {:?}", other),
    }
    // el worker sigue vivo
    let value = sync(&broker).send(QUEUE, Request::new("Dog", "bark").arg("again")).unwrap();
    assert_eq!(value, json!("woof again"));
    // con CommitPolicy::Reply el commit ocurre justo después de responder
    let deadline = Instant::now() + Duration::from_secs(5);
    while (!agent.tracker().is_empty() || agent.store().uncommitted() > 0) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(agent.tracker().is_empty());
    assert_eq!(agent.store().uncommitted(), 0);
    agent.shutdown();
    assert_eq!(fs::read_dir(dir.path().join("pending")).unwrap().count(), 0);
}

#[test]
fn unknown_classes_reply_namespace_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    match sync(&broker).send(QUEUE, Request::new("Cat", "meow")) {
        Err(RmiError::NamespaceNotFound(ns)) => assert_eq!(ns, "Cat"),
        other => panic!("se esperaba NamespaceNotFound: {:?}", other),
    }
    agent.shutdown();
}

#[test]
fn wrong_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    let mut request = Document::request("Dog", "bark");
    request.version = Some("1.0".into());
    request.replyto = Some("replies".into());
    let sn = broker.send(QUEUE, None, request).unwrap();

    let reply = Reader::new(broker.clone(), "replies").search(&sn, Duration::from_secs(5)).unwrap().expect("rechazo");
    assert_eq!(reply.status, Some(Status::Rejected));
    assert_eq!(reply.text("code"), "model.version");
    agent.shutdown();
}

#[test]
fn missed_windows_reply_and_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    let mut request = Document::request("Dog", "bark");
    request.args = vec![json!("late")];
    request.replyto = Some("replies".into());
    request.window = Some(Window::new(Some(Utc::now() - Span::seconds(20)), Some(Utc::now() - Span::seconds(10))).unwrap());
    let sn = broker.send(QUEUE, None, request).unwrap();

    let reply = Reader::new(broker.clone(), "replies").search(&sn, Duration::from_secs(5)).unwrap().expect("respuesta");
    match marshal::outcome(reply.result.unwrap()) {
        Err(RmiError::WindowMissed(missed)) => assert_eq!(missed, sn),
        other => panic!("se esperaba WindowMissed: {:?}", other),
    }
    agent.shutdown();
    assert_eq!(fs::read_dir(dir.path().join("pending")).unwrap().count(), 0);
}

#[test]
fn admin_cancels_running_requests_by_criteria() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    let options = PolicyOptions { reply: Some("replies".into()), data: Some(json!({"job": "x"})), ..Default::default() };
    let sn = Asynchronous::new(broker.clone(), options).send(QUEUE, Request::new("Dog", "wait")).unwrap();

    let reader = Reader::new(broker.clone(), "replies");
    let started = reader.search(&sn, Duration::from_secs(5)).unwrap().expect("started");
    assert_eq!(started.status, Some(Status::Started));
    assert_eq!(started.data, Some(json!({"job": "x"})));

    let cancelled = sync(&broker).send(QUEUE, Request::new("Admin", "cancel").kwarg("criteria", json!({"job": "x"}))).unwrap();
    assert_eq!(cancelled, json!([sn.clone()]));

    let reply = reader.search(&sn, Duration::from_secs(5)).unwrap().expect("respuesta");
    assert_eq!(marshal::outcome(reply.result.unwrap()).unwrap(), json!("cancelled"));
    agent.shutdown();
}

#[test]
fn admin_hello_and_help() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    assert_eq!(sync(&broker).send(QUEUE, Request::new("Admin", "hello")).unwrap(), json!("Hello, I am gofer agent"));
    let help = sync(&broker).send(QUEUE, Request::new("Admin", "help")).unwrap();
    assert_eq!(help["Dog"], json!(["bark", "wait"]));
    assert_eq!(help["Admin"], json!(["hello", "cancel", "help"]));
    assert_eq!(agent.registry().len(), 2);
    agent.shutdown();
}

// Ejecución directa de tareas, sin hilos del agente.

struct Bench {
    _dir: tempfile::TempDir,
    clock: Arc<ManualClock>,
    broker: Arc<InMemoryBroker>,
    store: Arc<PendingStore>,
}

fn bench() -> Bench {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = PendingStore::open(dir.path(), clock.clone()).unwrap();
    store.wait_open();
    Bench { _dir: dir, clock, broker: Arc::new(InMemoryBroker::new()), store }
}

impl Bench {
    fn tasks(&self, commit: CommitPolicy) -> TaskContext {
        TaskContext { store: self.store.clone(),
                      transport: self.broker.clone(),
                      tracker: Arc::new(Tracker::new()),
                      clock: self.clock.clone(),
                      commit }
    }

    fn submit(&self, method: &str, ttl: Option<f64>) -> Transaction {
        let mut request = Document::request("Meter", method);
        request.sn = "meter-1".into();
        request.replyto = Some("replies".into());
        request.ttl = ttl;
        self.store.put(request).unwrap();
        Transaction::new(self.store.clone(), self.store.get_timeout(Duration::from_secs(1)).unwrap())
    }
}

/// Cuenta los archivos pendientes en el momento de ejecutar.
fn meter(pending: PathBuf) -> Dispatcher {
    let ns = Namespace::new("Meter").remote("count", Remote::new(move |_c, _i| Ok(json!(fs::read_dir(&pending)?.count()))))
                                    .remote("boom", Remote::new(|_c, _i| panic!("medidor roto")));
    Dispatcher::new(Catalog::new().add(ns))
}

fn final_reply(broker: &InMemoryBroker) -> Option<serde_json::Value> {
    broker.drain("replies").into_iter().find_map(|d| d.result).map(|r| marshal::outcome(r).unwrap())
}

#[test]
fn handoff_commits_before_execution() {
    let b = bench();
    let tx = b.submit("count", None);
    b.tasks(CommitPolicy::Handoff).execute(tx, &meter(b.store.pending_dir().to_path_buf()));
    assert_eq!(final_reply(&b.broker), Some(json!(0)));
    assert_eq!(b.store.uncommitted(), 0);
}

#[test]
fn reply_policy_commits_after_replying() {
    let b = bench();
    let tx = b.submit("count", None);
    b.tasks(CommitPolicy::Reply).execute(tx, &meter(b.store.pending_dir().to_path_buf()));
    assert_eq!(final_reply(&b.broker), Some(json!(1)));
    assert_eq!(b.store.uncommitted(), 0);
}

#[test]
fn started_precedes_the_reply() {
    let b = bench();
    let tx = b.submit("count", None);
    b.tasks(CommitPolicy::Handoff).execute(tx, &meter(b.store.pending_dir().to_path_buf()));
    let replies = b.broker.drain("replies");
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].status, Some(Status::Started));
    assert!(replies[1].result.is_some());
}

#[test]
fn expired_requests_are_dropped_silently() {
    let b = bench();
    let tx = b.submit("count", Some(5.0));
    b.clock.advance(Span::seconds(6));
    b.tasks(CommitPolicy::Handoff).execute(tx, &meter(b.store.pending_dir().to_path_buf()));
    assert_eq!(b.broker.depth("replies"), 0);
    assert_eq!(b.store.uncommitted(), 0);
    assert_eq!(fs::read_dir(b.store.pending_dir()).unwrap().count(), 0);
}

#[test]
fn aborted_execution_releases_tracker_and_commits() {
    let b = bench();
    let tx = b.submit("boom", None);
    let tasks = b.tasks(CommitPolicy::Reply);
    tasks.execute(tx, &meter(b.store.pending_dir().to_path_buf()));
    let result = b.broker.drain("replies").into_iter().find_map(|d| d.result).unwrap();
    assert!(matches!(marshal::outcome(result), Err(RmiError::ModelFailed(_))));
    assert!(tasks.tracker.is_empty());
    assert_eq!(b.store.uncommitted(), 0);
    assert_eq!(fs::read_dir(b.store.pending_dir()).unwrap().count(), 0);
}

#[derive(Default)]
struct Collected {
    events: std::sync::Mutex<Vec<String>>,
}

impl gofer_rmi::Listener for Collected {
    fn succeeded(&self, reply: &gofer_rmi::AsyncReply, retval: &serde_json::Value) {
        self.events.lock().unwrap().push(format!("{} {}", reply.sn, retval));
    }
    fn started(&self, reply: &gofer_rmi::AsyncReply) {
        self.events.lock().unwrap().push(format!("{} started", reply.sn));
    }
}

#[test]
fn asynchronous_call_with_watchdog_through_the_agent() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, broker) = start(&dir);
    let journal = gofer_rmi::Journal::open(&dir.path().join("caller")).unwrap();
    let watchdog = Arc::new(gofer_rmi::WatchDog::new(journal, broker.clone(), Arc::new(gofer_messaging::SystemClock)));
    let options = PolicyOptions { reply: Some("replies".into()), ..Default::default() };
    let sn = Asynchronous::new(broker.clone(), options).with_watchdog(watchdog.clone())
                                                      .send(QUEUE, Request::new("Dog", "bark").arg("hi"))
                                                      .unwrap();

    let consumer = gofer_rmi::ReplyConsumer::new(Reader::new(broker.clone(), "replies")).with_watchdog(watchdog.clone());
    let listener = Collected::default();
    let deadline = Instant::now() + Duration::from_secs(5);
    while listener.events.lock().unwrap().len() < 2 && Instant::now() < deadline {
        consumer.consume(&listener, Duration::from_millis(100)).unwrap();
    }

    assert_eq!(*listener.events.lock().unwrap(), vec![format!("{} started", sn), format!("{} \"woof hi\"", sn)]);
    assert!(watchdog.journal().find(&sn).unwrap().is_none());
    assert!(watchdog.process().unwrap().is_empty());
    agent.shutdown();
}
