use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use lineal::bind::{Binding, FromValue, export_by_type, object_from_serialize, to_json};
use lineal::{LinealError, Object, Root, Value, read_str};

#[derive(Debug, Default, PartialEq)]
struct Server {
    name: String,
    port: u16,
    hosts: Vec<String>,
    secure: bool,
}

fn binding() -> Binding<Server> {
    Binding::<Server>::new("server")
        .identity(|s| Some(s.name.clone()), |s, name| s.name = name)
        .getter("port", |s| i64::from(s.port))
        .setter("port", |s, port: u16| s.port = port)
        .member("hosts", |s| s.hosts.clone(), |s, hosts: Vec<String>| s.hosts = hosts)
        .setter("tls", |s, secure: bool| s.secure = secure)
}

fn setup() -> Root {
    read_str(
        r#"
        server { port = 80; hosts = ["localhost"]; tls = false; }
        server "public" : server { port += 363; hosts += ["example.org"]; tls = true; }
        server "internal" : server { port *= 100; comment = "unbound"; }
        "#,
    )
    .unwrap()
}

#[test]
fn records_are_created_from_resolved_fields() {
    let root = setup();
    let servers = binding().create_all(&root).unwrap();
    assert_eq!(servers.len(), 3);
    assert_eq!(servers[0].name, "");
    assert_eq!(
        servers[2],
        Server {
            name: "public".into(),
            port: 443,
            hosts: vec!["localhost".into(), "example.org".into()],
            secure: true,
        }
    );
    // unbound fields are skipped
    assert_eq!(servers[1].name, "internal");
    assert_eq!(servers[1].port, 8000);
}

#[test]
fn conversion_errors_name_the_member() {
    let root = read_str(r#"server "big" { port = 70000; }"#).unwrap();
    let object = root.get("server", Some("big")).unwrap();
    match binding().create(&object) {
        Err(LinealError::Conversion(message)) => {
            assert!(message.contains("member \"port\""), "{message}");
            assert!(message.contains("u16"), "{message}");
        }
        other => panic!("expected a conversion error, got {other:?}"),
    }
}

#[test]
fn records_export_back_to_objects() {
    let server = Server {
        name: "edge".into(),
        port: 8080,
        hosts: vec!["a".into(), "b".into()],
        secure: true,
    };
    let object = binding().export(&server);
    assert_eq!(object.type_name(), Some("server"));
    assert_eq!(object.identity(), Some("edge"));
    assert_eq!(object.get_field("port").unwrap(), Some(Value::Integer(8080)));
    // setter-only members are not exported
    assert!(!object.contains_local("tls"));

    let mut root = Root::new();
    root.keep(object).unwrap();
    let again = binding().create(&root.get("server", Some("edge")).unwrap()).unwrap();
    assert_eq!(again, Server { secure: false, ..server });
}

#[derive(Debug, Deserialize, PartialEq)]
struct Plan {
    id: String,
    seats: u32,
    #[serde(default)]
    features: Vec<String>,
}

#[test]
fn serde_records_from_a_type() {
    let root = read_str(
        r#"
        plan "basic" { seats = 1; }
        plan "team" <- plan "basic" { seats *= 10; features = <"sso", "audit">; }
        "#,
    )
    .unwrap();
    let plans: Vec<Plan> = export_by_type(&root, "plan", Some("id")).unwrap();
    assert_eq!(
        plans,
        [
            Plan { id: "basic".into(), seats: 1, features: vec![] },
            Plan {
                id: "team".into(),
                seats: 10,
                features: vec!["audit".into(), "sso".into()],
            },
        ]
    );
    assert!(export_by_type::<Plan>(&root, "plan", None).is_err());
}

#[derive(Serialize)]
struct Deployment {
    replicas: u8,
    regions: Vec<&'static str>,
    limits: BTreeMap<&'static str, f64>,
}

#[test]
fn serialized_records_become_objects() {
    let deployment = Deployment {
        replicas: 3,
        regions: vec!["eu", "us"],
        limits: BTreeMap::from([("cpu", 1.5), ("memory", 512.0)]),
    };
    let object = object_from_serialize("deployment", Some("web"), &deployment).unwrap();
    assert_eq!(object.identity(), Some("web"));
    assert_eq!(object.get_field("replicas").unwrap(), Some(Value::Integer(3)));
    assert_eq!(
        object.get_field("regions").unwrap(),
        Some(Value::list([Value::from("eu"), Value::from("us")]))
    );
    let limits = object.get_field("limits").unwrap().unwrap();
    assert_eq!(limits.as_object().unwrap().get_field("cpu").unwrap(), Some(Value::Float(1.5)));

    assert!(matches!(
        object_from_serialize("deployment", None, &[1, 2, 3]),
        Err(LinealError::Conversion(_))
    ));
    assert!(matches!(
        object_from_serialize("", Some("web"), &deployment),
        Err(LinealError::Registry(_))
    ));
}

#[test]
fn objects_render_as_json() {
    let root = read_str(
        r#"
        app { name = "svc"; ratio = 0.5; tags = <"b", "a">; nested = { depth = 1; }; missing = null; }
        app "child" : app { ratio *= 2; }
        "#,
    )
    .unwrap();
    let json = to_json(&root.get("app", Some("child")).unwrap()).unwrap();
    assert_eq!(
        json,
        json!({
            "name": "svc",
            "ratio": 1.0,
            "tags": ["a", "b"],
            "nested": { "depth": 1 },
            "missing": null,
        })
    );
}

#[test]
fn typed_field_access() {
    let root = setup();
    let public = root.get("server", Some("public")).unwrap();
    assert_eq!(public.get_as::<i64>("port").unwrap(), Some(443));
    assert_eq!(public.get_as::<f64>("port").unwrap(), Some(443.0));
    assert_eq!(public.get_as::<String>("port").unwrap(), Some("443".to_owned()));
    assert_eq!(public.get_as::<bool>("nothing").unwrap(), None);
    assert!(public.get_as::<bool>("port").is_err());
    assert_eq!(public.get_as::<Option<i64>>("port").unwrap(), Some(Some(443)));

    let mut object = Object::anonymous();
    object.set("limits", BTreeMap::from([("cpu".to_owned(), 2_i64)]));
    let limits: BTreeMap<String, u8> = object.get_as("limits").unwrap().unwrap();
    assert_eq!(limits["cpu"], 2);
    assert_eq!(char::from_value(&Value::from("x")).unwrap(), 'x');
    assert!(char::from_value(&Value::from("xy")).is_err());
}
