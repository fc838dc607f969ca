use gofer_messaging::Document;
use gofer_rmi::{marshal, Catalog, Dispatcher, Namespace, Remote};
use serde_json::json;

fn main() {
    let math = Namespace::new("Math").remote("add", Remote::new(|_ctx, inv| {
                                         let a: i64 = inv.arg(0)?;
                                         let b: i64 = inv.arg(1)?;
                                         Ok(json!(a + b))
                                     }));
    let dispatcher = Dispatcher::new(Catalog::new().add(math));

    let mut request = Document::request("Math", "add");
    request.args = vec![json!(2), json!(40)];
    match marshal::outcome(dispatcher.dispatch(&request)) {
        Ok(v) => println!("Math.add(2, 40) = {}", v),
        Err(e) => eprintln!("error: {}", e),
    }

    let missing = Document::request("Math", "mul");
    if let Err(e) = marshal::outcome(dispatcher.dispatch(&missing)) {
        println!("esperado: {}", e);
    }
}
