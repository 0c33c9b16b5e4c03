//! Position-aware type resolution across layers.

use strata_conformance::Fixture;
use strata_engine::Engine;
use strata_resolve::Resolved;

fn three_layers() -> (Fixture, Engine) {
    let fx = Fixture::new();
    fx.layer("app.base", "package_prefix = \"app\"", &[("Util.sc", "u\n")]);
    fx.layer("app.core", "extends = [\"app.base\"]", &[("Money.sc", "core\n")]);
    fx.layer("app.main", "extends = [\"app.core\"]", &[("Money.sc", "main\n")]);
    let mut engine = fx.engine();
    engine.init(&["app.main".to_string()]).unwrap();
    (fx, engine)
}

fn defining_layer(engine: &mut Engine, name: &str, from: Option<&str>) -> Option<String> {
    let from = from.map(|l| engine.layer_id(l).unwrap());
    match engine.resolve(name, from)? {
        Resolved::Source(id) => {
            let layer = engine.types().decl(id).unwrap().layer;
            Some(engine.stack().get(layer).unwrap().name.clone())
        }
        Resolved::Compiled(_) => Some("<compiled>".to_string()),
    }
}

#[test]
fn highest_layer_at_or_below_reference_wins() {
    let (_fx, mut engine) = three_layers();
    assert_eq!(defining_layer(&mut engine, "app.Money", None).as_deref(), Some("app.main"));
    assert_eq!(defining_layer(&mut engine, "app.Money", Some("app.main")).as_deref(), Some("app.main"));
    assert_eq!(defining_layer(&mut engine, "app.Money", Some("app.core")).as_deref(), Some("app.core"));
}

#[test]
fn reference_below_every_definition_finds_nothing() {
    let (_fx, mut engine) = three_layers();
    assert_eq!(defining_layer(&mut engine, "app.Money", Some("app.base")), None);
    assert_eq!(defining_layer(&mut engine, "app.Util", Some("app.base")).as_deref(), Some("app.base"));
}

#[test]
fn answers_are_stable_across_query_order() {
    let (_fx, mut engine) = three_layers();
    assert_eq!(defining_layer(&mut engine, "app.Money", Some("app.base")), None);
    assert_eq!(defining_layer(&mut engine, "app.Money", Some("app.core")).as_deref(), Some("app.core"));
    assert_eq!(defining_layer(&mut engine, "app.Money", None).as_deref(), Some("app.main"));
    assert_eq!(defining_layer(&mut engine, "app.Money", Some("app.base")), None);
}

#[test]
fn cached_answer_is_served_without_parsing() {
    let (_fx, mut engine) = three_layers();
    assert!(engine.peek("app.Money", None).is_none());
    let first = engine.resolve("app.Money", None).unwrap();
    assert_eq!(engine.peek("app.Money", None), Some(Some(first)));
}

#[test]
fn unknown_type_is_an_absence() {
    let (_fx, mut engine) = three_layers();
    assert!(engine.resolve("app.Nothing", None).is_none());
}
