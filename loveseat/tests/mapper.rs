use loveseat::{
    chrono::NaiveDate,
    memory::InMemoryTransport,
    prelude::*,
    serde_json::{Map, Value, json},
};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Mapper)]
#[mapper(schema = Person::declare)]
struct Person(Instance);

impl Person {
    const NAME: Property<Text> = Property::new("name");
    const AGE: Property<Integer> = Property::new("age");
    const BORN: Property<Date> = Property::new("born");
    const TAGS: Property<List> = Property::new("tags");

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .property(Self::NAME.describe().default("anonymous".to_string()))
            .property(Self::AGE)
            .property(Self::BORN)
            .property(Self::TAGS)
    }
}

static BADGES: AtomicI64 = AtomicI64::new(0);

fn next_badge() -> i64 {
    BADGES.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Mapper)]
#[mapper(name = "Staff", extends = Person, schema = Employee::declare)]
struct Employee {
    instance: Instance,
}

impl Employee {
    const BADGE: Property<Integer> = Property::new("badge");

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .property(Person::NAME.describe().default("new hire".to_string()))
            .property(Self::BADGE.describe().default_with(next_badge))
    }
}

#[derive(Mapper)]
#[mapper(schema = Ticket::declare)]
struct Ticket(Instance);

impl Ticket {
    const OWNER: Property<Identifier> = Property::new("owner");

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema.property(Self::OWNER)
    }
}

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn setup() -> (Server, Databases) {
    initialize(
        InMemoryTransport::new(),
        ServerConfig::default().with_uuid_cache_size(10),
        DatabaseSpec::new()
            .bind::<Person>("people")
            .bind::<Employee>("staff")
            .create_missing(true),
    )
    .await
    .unwrap()
}

#[test]
fn schemas_inherit_and_override() {
    assert_eq!(Person::type_name(), "Person");
    assert_eq!(Employee::type_name(), "Staff");
    assert_eq!(
        Person::schema().names().collect::<Vec<_>>(),
        vec!["_id", "_rev", "name", "age", "born", "tags"]
    );
    assert_eq!(
        Employee::schema().names().collect::<Vec<_>>(),
        vec!["_id", "_rev", "name", "age", "born", "tags", "badge"]
    );

    let default_name = |schema: &Schema| {
        schema.get("name").and_then(|p| p.default()).map(|d| d.realize())
    };
    assert_eq!(default_name(Person::schema()), Some(json!("anonymous")));
    assert_eq!(default_name(Employee::schema()), Some(json!("new hire")));
    assert_eq!(Employee::schema().get("badge").map(|p| p.kind()), Some(PropertyType::Integer));
}

#[test]
fn defaults_are_realized_once_and_stored() {
    let mut person = Person::new();
    assert!(person.document().is_empty());

    assert_eq!(person.get(&Person::NAME).unwrap().as_deref(), Some("anonymous"));
    assert_eq!(person.document().get("name"), Some(&json!("anonymous")));
    assert_eq!(person.get(&Person::AGE).unwrap(), None);
    assert_eq!(person.get(&Person::TAGS).unwrap(), Some(Vec::new()));

    let mut first = Employee::new();
    let badge = first.get(&Employee::BADGE).unwrap();
    assert!(badge.is_some());
    assert_eq!(first.get(&Employee::BADGE).unwrap(), badge);

    let mut second = Employee::new();
    assert_ne!(second.get(&Employee::BADGE).unwrap(), badge);
    assert_eq!(second.get(&Person::NAME).unwrap().as_deref(), Some("new hire"));
}

#[test]
fn typed_values_are_stored_as_json() {
    let born = NaiveDate::from_ymd_opt(1990, 7, 14).unwrap();
    let mut person = Person::new()
        .with(&Person::NAME, "Alice".to_string())
        .with(&Person::AGE, 34)
        .with(&Person::BORN, born);

    assert_eq!(person.document().get("born"), Some(&json!("1990-07-14")));
    assert_eq!(person.get(&Person::BORN).unwrap(), Some(born));
    assert_eq!(person.get(&Person::AGE).unwrap(), Some(34));
}

#[test]
fn identifiers_carry_the_type_prefix() {
    let mut person = Person::new().with(&ID, "custom".to_string());
    assert_eq!(person.document().id(), Some("Person:custom"));

    person.set(&ID, "Person:custom".to_string());
    assert_eq!(person.document().id(), Some("Person:custom"));

    let employee = Employee::from_fields(fields(json!({ "_id": "42" }))).unwrap();
    assert_eq!(employee.document().id(), Some("Staff:42"));
}

#[test]
fn loose_fields_are_converted() {
    let loose = fields(json!({ "name": 5, "age": "41", "nickname": "Al" }));
    let mut person = Person::from_fields(loose).unwrap();

    assert_eq!(person.get(&Person::NAME).unwrap().as_deref(), Some("5"));
    assert_eq!(person.get(&Person::AGE).unwrap(), Some(41));
    assert_eq!(person.document().get("nickname"), Some(&json!("Al")));

    let err = Person::from_fields(fields(json!({ "age": "old" })))
        .err()
        .unwrap();
    assert!(matches!(err, LoveseatError::Conversion { ref property, .. } if property == "age"));
}

#[test]
fn mismatched_stored_values_fail_on_read() {
    let document: Document = [("age", json!({ "years": 3 }))].into_iter().collect();
    let mut person = Person::from_document(document);

    assert!(matches!(
        person.get(&Person::AGE),
        Err(LoveseatError::Conversion { .. })
    ));
}

#[tokio::test]
async fn secondary_identifiers_are_allocated_on_demand() {
    let server = Server::new(InMemoryTransport::new(), &ServerConfig::default()).unwrap();
    let mut ticket = Ticket::new();

    assert_eq!(ticket.get(&Ticket::OWNER).unwrap(), None);

    let owner = ticket.identifier(&Ticket::OWNER, server.uuids()).await.unwrap();
    assert!(owner.starts_with("Ticket:"));
    assert_eq!(ticket.get(&Ticket::OWNER).unwrap(), Some(owner.clone()));
    assert_eq!(
        ticket.identifier(&Ticket::OWNER, server.uuids()).await.unwrap(),
        owner
    );
    assert!(ticket.document().id().is_none());
}

#[tokio::test]
async fn put_then_fetch() {
    let (server, databases) = setup().await;

    let mut alice = Person::new()
        .with(&Person::NAME, "Alice".to_string())
        .with(&Person::AGE, 30);
    alice.put(&databases).await.unwrap();

    let id = alice.id(server.uuids()).await.unwrap();
    assert!(id.starts_with("Person:"));
    assert!(alice.rev().unwrap().starts_with("1-"));
    assert_eq!(alice.document().get("tags"), Some(&json!([])));

    let mut loaded = Person::fetch(&databases, &id).await.unwrap();
    assert_eq!(loaded.get(&Person::NAME).unwrap().as_deref(), Some("Alice"));
    assert_eq!(loaded.get(&Person::AGE).unwrap(), Some(30));
    assert_eq!(loaded.rev(), alice.rev());

    assert!(Employee::fetch(&databases, &id).await.err().unwrap().is_not_found());
}

#[tokio::test]
async fn updates_advance_the_revision() {
    let (_, databases) = setup().await;

    let mut alice = Person::new().with(&Person::NAME, "Alice".to_string());
    alice.put(&databases).await.unwrap();
    let id = alice.document().id().unwrap().to_string();
    let mut stale = Person::fetch(&databases, &id).await.unwrap();

    alice.set(&Person::AGE, 31);
    alice.put(&databases).await.unwrap();
    assert!(alice.rev().unwrap().starts_with("2-"));

    stale.set(&Person::AGE, 99);
    assert!(stale.put(&databases).await.err().unwrap().is_conflict());

    let mut loaded = Person::fetch(&databases, &id).await.unwrap();
    assert_eq!(loaded.get(&Person::AGE).unwrap(), Some(31));
}

#[tokio::test]
async fn generated_defaults_survive_a_round_trip() {
    let (_, databases) = setup().await;

    let mut bob = Employee::new();
    bob.put(&databases).await.unwrap();
    let badge = bob.document().get("badge").cloned().unwrap();
    let id = bob.document().id().unwrap().to_string();
    assert!(id.starts_with("Staff:"));

    let mut loaded = Employee::fetch(&databases, &id).await.unwrap();
    assert_eq!(loaded.get(&Employee::BADGE).unwrap(), badge.as_i64());
    assert_eq!(loaded.get(&Person::NAME).unwrap().as_deref(), Some("new hire"));
}

#[tokio::test]
async fn explicit_database_and_resolution() {
    let (server, databases) = initialize(
        InMemoryTransport::new(),
        ServerConfig::default(),
        DatabaseSpec::names(["a", "b"]).create_missing(true),
    )
    .await
    .unwrap();

    let mut person = Person::new();
    assert!(matches!(
        person.put(&databases).await,
        Err(LoveseatError::DatabaseNotResolved(_))
    ));

    let b = databases.get("b").unwrap();
    person.put_to(b).await.unwrap();
    let id = person.id(server.uuids()).await.unwrap();
    assert!(Person::fetch_from(b, &id).await.is_ok());
    assert!(!databases.get("a").unwrap().contains(&id).await.unwrap());
}
