use gofer_messaging::{Document, MessagingError, Raised, Return, Status, CODE_VERSION, VERSION};
use serde_json::json;

#[test]
fn unknown_fields_survive_a_round_trip() {
    let raw = r#"{"sn":"42","version":"2.0","classname":"Dog","method":"bark",
                  "args":["hi"],"routing":["a","b"],"pam":{"x":1}}"#;
    let doc = Document::load(raw).unwrap();
    assert_eq!(doc.get("routing"), Some(&json!(["a", "b"])));
    let again = Document::load(&doc.dump().unwrap()).unwrap();
    assert_eq!(again, doc);
    assert_eq!(again.get("pam"), Some(&json!({"x": 1})));
}

#[test]
fn return_is_discriminated_by_shape() {
    let ok: Return = serde_json::from_value(json!({"retval": null})).unwrap();
    assert_eq!(ok, Return::Succeeded { retval: json!(null) });
    assert!(ok.succeeded());

    let failed: Return = serde_json::from_value(json!({
        "exval": "boom", "xmodule": "plugin", "xclass": "Boom", "xstate": {"n": 1}, "xargs": ["boom"]
    })).unwrap();
    match failed {
        Return::Failed(Raised { xclass, xstate, .. }) => {
            assert_eq!(xclass, "Boom");
            assert_eq!(xstate.get("n"), Some(&json!(1)));
        }
        other => panic!("se esperaba excepción: {:?}", other),
    }
}

#[test]
fn version_is_checked() {
    let mut doc = Document::request("Dog", "bark");
    assert_eq!(doc.version.as_deref(), Some(VERSION));
    doc.validate().unwrap();

    doc.version = Some("1.0".into());
    match doc.validate() {
        Err(MessagingError::InvalidDocument { code, .. }) => assert_eq!(code, CODE_VERSION),
        other => panic!("se esperaba InvalidDocument: {:?}", other),
    }
}

#[test]
fn status_serializes_lowercase() {
    let doc = Document::status("7", Some(json!({"k": "v"})), Status::Started);
    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value["status"], json!("started"));
    assert_eq!(value["data"], json!({"k": "v"}));
    assert!(value.get("result").is_none());
}
