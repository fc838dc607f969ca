use gofer_agent::{Agent, AgentConfig, PluginSpec};
use gofer_messaging::{InMemoryBroker, Reader, SystemClock, Transport};
use gofer_rmi::{AsyncReply, Asynchronous, Journal, Listener, PolicyOptions, ProgressReport, ReplyConsumer, Request, RmiError,
                Synchronous, WatchDog};
use serde_json::Value;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

mod dog;

const REPLIES: &str = "goferd-replies";

/// Imprime las respuestas asíncronas a medida que llegan.
struct Printer;

impl Listener for Printer {
    fn succeeded(&self, reply: &AsyncReply, retval: &Value) {
        println!("[{}] ok: {}", reply.sn, retval);
    }
    fn failed(&self, reply: &AsyncReply, error: &RmiError) {
        println!("[{}] error: {}", reply.sn, error);
    }
    fn started(&self, reply: &AsyncReply) {
        println!("[{}] iniciada", reply.sn);
    }
    fn progress(&self, reply: &AsyncReply, report: &ProgressReport) {
        println!("[{}] progreso {}/{}", reply.sn, report.completed, report.total);
    }
}

/// Agente de demostración sobre un broker en memoria.
///
/// Opciones soportadas:
/// 1) Llamada síncrona Dog.bark
/// 2) Llamada asíncrona Dog.wag (con watchdog)
/// 3) Cancelar peticiones en curso (Admin.cancel)
/// 4) Ayuda del agente (Admin.help)
/// 5) Salir
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config = AgentConfig::from_env()?;
    let queue = config.queue.clone();
    let journal_dir = config.journal_dir();
    let broker = Arc::new(InMemoryBroker::new());
    let transport: Arc<dyn Transport> = broker.clone();

    let agent = Agent::builder(config, transport.clone()).plugin(PluginSpec::new("dog").namespace(dog::namespace()))
                                                          .start()?;
    log::info!("goferd: agente en \"{}\" sobre broker en memoria", queue);

    // prueba de humo
    let hello = Synchronous::new(transport.clone(), PolicyOptions::default()).send(&queue, Request::new("Admin", "hello"))?;
    println!("{}", hello);

    transport.declare(REPLIES)?;
    let watchdog = Arc::new(WatchDog::new(Journal::open(&journal_dir)?, transport.clone(), Arc::new(SystemClock)));
    let _watching = watchdog.start()?;
    let _replies = ReplyConsumer::new(Reader::new(transport.clone(), REPLIES)).with_watchdog(watchdog.clone())
                                                                              .start(Arc::new(Printer))?;

    loop {
        println!("\n== goferd ==");
        println!("1) Llamada síncrona Dog.bark");
        println!("2) Llamada asíncrona Dog.wag");
        println!("3) Cancelar peticiones en curso");
        println!("4) Ayuda del agente");
        println!("5) Salir");
        let choice = prompt("Elige una opción: ")?;
        match choice.trim() {
            "1" => {
                let words = prompt("Qué decir: ")?;
                let policy = Synchronous::new(transport.clone(), PolicyOptions::default());
                match policy.send(&queue, Request::new("Dog", "bark").arg(words.trim())) {
                    Ok(v) => println!("{}", v),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            "2" => {
                let n: u64 = prompt("Cuántas veces: ")?.trim().parse().unwrap_or(3);
                let options = PolicyOptions { reply: Some(REPLIES.into()),
                                              data: Some(serde_json::json!({"demo": "wag"})),
                                              ..Default::default() };
                let policy = Asynchronous::new(transport.clone(), options).with_watchdog(watchdog.clone());
                match policy.send(&queue, Request::new("Dog", "wag").arg(n)) {
                    Ok(sn) => println!("enviada: {}", sn),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            "3" => {
                let policy = Synchronous::new(transport.clone(), PolicyOptions::default());
                let request = Request::new("Admin", "cancel").kwarg("criteria", serde_json::json!({"demo": "wag"}));
                match policy.send(&queue, request) {
                    Ok(v) => println!("canceladas: {}", v),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            "4" => match Synchronous::new(transport.clone(), PolicyOptions::default()).send(&queue, Request::new("Admin", "help")) {
                Ok(v) => println!("{}", serde_json::to_string_pretty(&v)?),
                Err(e) => eprintln!("Error: {}", e),
            },
            "5" => break,
            other => println!("Opción desconocida: {}", other),
        }
    }
    agent.shutdown();
    Ok(())
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
