//! Integration tests over the school schema on a sled-backed database.

use ormguard_core::catalog::{
    DefaultValue, DeleteBehavior, EntityDef, EnumDef, FieldDef, RelationDef, ScalarType,
    SchemaBundle,
};
use ormguard_core::error::{Error, ReferentialError, ShapeError};
use ormguard_core::{CrudExecutor, Database, DatabaseConfig, RowKey, RowStore, SledStore, StorageConfig, Version};
use std::sync::Arc;
use ormguard_proto::{Filter, Predicate, Value};

struct TestContext {
    db: Database,
    executor: CrudExecutor,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
        let executor = db.register(school_schema()).unwrap();
        Self {
            db,
            executor,
            _dir: dir,
        }
    }

    fn create(&self, entity: &str, fields: Vec<(&str, Value)>) -> RowKey {
        self.executor.create(entity, owned(fields)).unwrap()
    }

    fn version(&self, entity: &str, key: &RowKey) -> Version {
        self.executor.read(entity, key.clone()).unwrap().1
    }

    fn count(&self, entity: &str) -> usize {
        self.executor.fetch_all(entity).unwrap().iter().count()
    }
}

fn owned(fields: Vec<(&str, Value)>) -> Vec<(String, Value)> {
    fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn int(v: i32) -> Value {
    Value::Int32(v)
}

fn school_schema() -> SchemaBundle {
    let gender = EnumDef::new("Gender")
        .with_member("MALE", "male")
        .with_member("FEMALE", "female");

    let student = EntityDef::new("Student", "id")
        .with_field(FieldDef::scalar("id", ScalarType::Int32).with_auto_increment())
        .with_field(FieldDef::scalar("name", ScalarType::String))
        .with_field(FieldDef::enumeration("gender", gender))
        .with_field(FieldDef::scalar("address", ScalarType::String))
        .with_field(FieldDef::scalar("score", ScalarType::Int32))
        .with_field(FieldDef::scalar("is_active", ScalarType::Bool).with_default(DefaultValue::Bool(true)))
        .with_version_field("updated_at");

    let email = EntityDef::with_composite_key("Email", ["email", "student_id"])
        .with_field(FieldDef::scalar("email", ScalarType::String))
        .with_field(FieldDef::scalar("student_id", ScalarType::Int32));

    let teacher = EntityDef::new("Teacher", "id")
        .with_field(FieldDef::scalar("id", ScalarType::Int32).with_auto_increment())
        .with_field(FieldDef::scalar("name", ScalarType::String));

    let clazz = EntityDef::new("Clazz", "id")
        .with_field(FieldDef::scalar("id", ScalarType::Int32).with_auto_increment())
        .with_field(FieldDef::scalar("name", ScalarType::String));

    let student_clazz = EntityDef::new("StudentClazz", "student_id")
        .with_field(FieldDef::scalar("student_id", ScalarType::Int32))
        .with_field(FieldDef::scalar("class_id", ScalarType::Int32));

    let teacher_clazz = EntityDef::with_composite_key("TeacherClazz", ["teacher_id", "class_id"])
        .with_field(FieldDef::scalar("teacher_id", ScalarType::Int32))
        .with_field(FieldDef::scalar("class_id", ScalarType::Int32));

    let club = EntityDef::new("Club", "id")
        .with_field(FieldDef::scalar("id", ScalarType::Int32).with_auto_increment())
        .with_field(FieldDef::scalar("name", ScalarType::String))
        .with_field(FieldDef::optional_scalar("teacher_id", ScalarType::Int32));

    let student_club = EntityDef::with_composite_key("StudentClub", ["student_id", "club_id"])
        .with_field(FieldDef::scalar("student_id", ScalarType::Int32))
        .with_field(FieldDef::scalar("club_id", ScalarType::Int32));

    SchemaBundle::new()
        .with_entity(student)
        .with_entity(email)
        .with_entity(teacher)
        .with_entity(clazz)
        .with_entity(student_clazz)
        .with_entity(teacher_clazz)
        .with_entity(club)
        .with_entity(student_club)
        .with_relation(
            RelationDef::one_to_many("emails", "Student", "id", "Email", "student_id")
                .with_on_delete(DeleteBehavior::Cascade),
        )
        .with_relation(
            RelationDef::one_to_one("student_clazz", "Student", "id", "StudentClazz", "student_id")
                .with_on_delete(DeleteBehavior::Cascade),
        )
        .with_relation(
            RelationDef::one_to_many("student_clazzes", "Clazz", "id", "StudentClazz", "class_id")
                .with_on_delete(DeleteBehavior::Restrict),
        )
        .with_relation(
            RelationDef::one_to_many("teacher_clazzes", "Teacher", "id", "TeacherClazz", "teacher_id")
                .with_on_delete(DeleteBehavior::Restrict),
        )
        .with_relation(
            RelationDef::one_to_many("clazz_teachers", "Clazz", "id", "TeacherClazz", "class_id")
                .with_on_delete(DeleteBehavior::Cascade),
        )
        .with_relation(
            RelationDef::one_to_one("club", "Teacher", "id", "Club", "teacher_id")
                .without_foreign_key()
                .with_on_delete(DeleteBehavior::Restrict),
        )
        .with_relation(
            RelationDef::one_to_many("student_clubs", "Student", "id", "StudentClub", "student_id")
                .with_on_delete(DeleteBehavior::Cascade),
        )
        .with_relation(
            RelationDef::one_to_many("members", "Club", "id", "StudentClub", "club_id")
                .with_on_delete(DeleteBehavior::Cascade),
        )
}

fn student(name: &'static str, gender: &'static str, score: i32) -> Vec<(&'static str, Value)> {
    vec![
        ("name", name.into()),
        ("gender", gender.into()),
        ("address", "Tokyo".into()),
        ("score", int(score)),
    ]
}

fn taro() -> Vec<(&'static str, Value)> {
    let mut fields = student("Taro", "male", 80);
    fields.push(("is_active", true.into()));
    fields
}

fn without(mut fields: Vec<(&'static str, Value)>, name: &str) -> Vec<(&'static str, Value)> {
    fields.retain(|(n, _)| *n != name);
    fields
}

#[test]
fn test_taro_scenario() {
    let ctx = TestContext::new();

    let key = ctx.create("Student", taro());
    assert_eq!(key, RowKey::single(int(1)));

    let (row, v0) = ctx.executor.read("Student", key.clone()).unwrap();
    assert_eq!(row.get("score"), Some(&int(80)));
    assert_eq!(row.get("updated_at"), Some(&Value::Timestamp(v0.as_timestamp())));

    let v1 = ctx
        .executor
        .update("Student", key.clone(), v0, owned(vec![("score", int(90))]))
        .unwrap();
    assert_ne!(v0, v1);

    let err = ctx
        .executor
        .update("Student", key.clone(), v0, owned(vec![("score", int(50))]))
        .unwrap_err();
    assert!(err.is_conflict());

    let (row, version) = ctx.executor.read("Student", key).unwrap();
    assert_eq!(version, v1);
    assert_eq!(row.get("score"), Some(&int(90)));
}

#[test]
fn test_versions_distinct_across_updates() {
    let ctx = TestContext::new();
    let key = ctx.create("Student", taro());

    let mut seen = vec![ctx.version("Student", &key)];
    for score in 0..25 {
        let current = *seen.last().unwrap();
        let next = ctx
            .executor
            .update("Student", key.clone(), current, owned(vec![("score", int(score))]))
            .unwrap();
        assert!(!seen.contains(&next), "version {next} reused");
        assert!(next > current);
        seen.push(next);
    }
}

#[test]
fn test_concurrent_updates_single_winner() {
    let ctx = TestContext::new();
    let key = ctx.create("Student", taro());
    let v0 = ctx.version("Student", &key);

    let results: Vec<Result<Version, Error>> = std::thread::scope(|s| {
        let handles: Vec<_> = [91, 92]
            .into_iter()
            .map(|score| {
                let executor = ctx.executor.clone();
                let key = key.clone();
                s.spawn(move || executor.update("Student", key, v0, vec![("score".into(), int(score))]))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_ok())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(winners.len(), 1);
    let loser = &results[1 - winners[0]];
    assert!(loser.as_ref().unwrap_err().is_conflict());

    let (row, version) = ctx.executor.read("Student", key).unwrap();
    assert_eq!(&version, results[winners[0]].as_ref().unwrap());
    let expected = if winners[0] == 0 { 91 } else { 92 };
    assert_eq!(row.get("score"), Some(&int(expected)));
}

#[test]
fn test_write_after_delete_conflicts() {
    let ctx = TestContext::new();
    let key = ctx.create("Student", taro());
    let v0 = ctx.version("Student", &key);

    ctx.executor.delete("Student", key.clone(), v0).unwrap();
    let err = ctx
        .executor
        .update("Student", key.clone(), v0, owned(vec![("score", int(90))]))
        .unwrap_err();
    match err {
        Error::Conflict { expected, actual, .. } => {
            assert_eq!(expected, v0);
            assert_eq!(actual, None);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(ctx.executor.delete("Student", key.clone(), v0).unwrap_err().is_conflict());

    // Reads of a missing row still report it as absent.
    assert!(ctx.executor.read("Student", key.clone()).unwrap_err().is_not_found());
    assert!(ctx.executor.plan_delete("Student", key).unwrap_err().is_not_found());
}

#[test]
fn test_update_races_cascade_delete_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn RowStore> = Arc::new(SledStore::open(&StorageConfig::new(dir.path())).unwrap());
    let first = Database::with_store(store.clone());
    let second = Database::with_store(store.clone());
    let writer = first.register(school_schema()).unwrap();
    let deleter = second.register(school_schema()).unwrap();

    for round in 0..20 {
        let name = if round % 2 == 0 { "Taro" } else { "Jiro" };
        let key = writer.create("Student", owned(student(name, "male", 80))).unwrap();
        for addr in ["a@x.com", "b@x.com"] {
            writer
                .create(
                    "Email",
                    owned(vec![("email", addr.into()), ("student_id", key.values()[0].clone())]),
                )
                .unwrap();
        }
        let v0 = writer.read("Student", key.clone()).unwrap().1;

        let (updated, deleted) = std::thread::scope(|s| {
            let update = s.spawn(|| {
                writer.update("Student", key.clone(), v0, vec![("score".into(), int(90))])
            });
            let delete = s.spawn(|| deleter.delete("Student", key.clone(), v0));
            (update.join().unwrap(), delete.join().unwrap())
        });

        match (updated, deleted) {
            (Ok(_), Err(err)) => {
                assert!(err.is_conflict(), "unexpected delete error {err:?}");
                let (row, _) = deleter.read("Student", key.clone()).unwrap();
                assert_eq!(row.get("score"), Some(&int(90)));
            }
            (Err(err), Ok(removed)) => {
                assert!(err.is_conflict(), "unexpected update error {err:?}");
                assert_eq!(removed.len(), 3);
                assert!(writer.read("Student", key.clone()).unwrap_err().is_not_found());
            }
            other => panic!("expected exactly one winner, got {other:?}"),
        }

        // No email outlives its student.
        for email in writer.fetch_all("Email").unwrap().iter() {
            let email = email.unwrap();
            let owner = email.get("student_id").unwrap().clone();
            assert!(writer.read("Student", owner).is_ok());
        }
    }
}

#[test]
fn test_child_create_races_cascade_delete_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn RowStore> = Arc::new(SledStore::open(&StorageConfig::new(dir.path())).unwrap());
    let first = Database::with_store(store.clone());
    let second = Database::with_store(store);
    let writer = first.register(school_schema()).unwrap();
    let deleter = second.register(school_schema()).unwrap();

    let key = writer.create("Student", owned(taro())).unwrap();
    let v0 = writer.read("Student", key.clone()).unwrap().1;

    // The plan is computed before the new email exists.
    let plan = deleter.plan_delete("Student", key.clone()).unwrap();
    assert_eq!(plan.len(), 1);
    writer
        .create(
            "Email",
            owned(vec![("email", "late@x.com".into()), ("student_id", key.values()[0].clone())]),
        )
        .unwrap();

    assert!(second.store().apply(&plan.to_batch()).unwrap_err().is_conflict());
    assert_eq!(writer.fetch_all("Email").unwrap().iter().count(), 1);

    // Re-planning picks the email up and removes both rows.
    let removed = deleter.delete("Student", key, v0).unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(writer.fetch_all("Email").unwrap().iter().count(), 0);
}

#[test]
fn test_stale_delete_conflicts() {
    let ctx = TestContext::new();
    let key = ctx.create("Student", taro());
    let v0 = ctx.version("Student", &key);
    ctx.executor
        .update("Student", key.clone(), v0, owned(vec![("score", int(70))]))
        .unwrap();

    assert!(ctx.executor.delete("Student", key.clone(), v0).unwrap_err().is_conflict());
    assert_eq!(ctx.count("Student"), 1);
}

#[test]
fn test_student_delete_cascades() {
    let ctx = TestContext::new();
    let taro = ctx.create("Student", taro());
    let jiro = ctx.create("Student", student("Jiro", "male", 70));
    let clazz = ctx.create("Clazz", vec![("name", "1-A".into())]);
    let club = ctx.create("Club", vec![("name", "Chess".into())]);

    for (addr, owner) in [("a@x.com", &taro), ("b@x.com", &taro), ("c@x.com", &jiro)] {
        ctx.create("Email", vec![("email", addr.into()), ("student_id", owner.values()[0].clone())]);
    }
    ctx.create(
        "StudentClazz",
        vec![("student_id", taro.values()[0].clone()), ("class_id", clazz.values()[0].clone())],
    );
    ctx.create(
        "StudentClub",
        vec![("student_id", taro.values()[0].clone()), ("club_id", club.values()[0].clone())],
    );

    let version = ctx.version("Student", &taro);
    let removed = ctx.executor.delete("Student", taro.clone(), version).unwrap();

    assert_eq!(removed.len(), 5);
    assert_eq!(removed.last().unwrap().entity, "Student");
    assert_eq!(removed.last().unwrap().key, taro);
    assert_eq!(ctx.count("Email"), 1);
    assert_eq!(ctx.count("StudentClazz"), 0);
    assert_eq!(ctx.count("StudentClub"), 0);
    assert_eq!(ctx.count("Clazz"), 1);
    assert_eq!(ctx.count("Club"), 1);
    assert!(ctx.executor.read("Student", taro).unwrap_err().is_not_found());
}

#[test]
fn test_clazz_delete_restricted() {
    let ctx = TestContext::new();
    let student = ctx.create("Student", taro());
    let clazz = ctx.create("Clazz", vec![("name", "1-A".into())]);
    let enrolment = ctx.create(
        "StudentClazz",
        vec![("student_id", student.values()[0].clone()), ("class_id", clazz.values()[0].clone())],
    );

    let version = ctx.version("Clazz", &clazz);
    let err = ctx.executor.delete("Clazz", clazz.clone(), version).unwrap_err();
    match err {
        Error::ReferentialIntegrity(ReferentialError::Restricted {
            blocking_entity,
            blocking_key,
            ..
        }) => {
            assert_eq!(blocking_entity, "StudentClazz");
            assert_eq!(blocking_key, enrolment);
        }
        other => panic!("expected restrict, got {other:?}"),
    }

    assert_eq!(ctx.version("Clazz", &clazz), version);
    assert_eq!(ctx.count("StudentClazz"), 1);

    // Once the dependent is gone the same delete goes through.
    let enrolment_version = ctx.version("StudentClazz", &enrolment);
    ctx.executor.delete("StudentClazz", enrolment, enrolment_version).unwrap();
    ctx.executor.delete("Clazz", clazz, version).unwrap();
}

#[test]
fn test_clazz_delete_cascades_teacher_links() {
    let ctx = TestContext::new();
    let teacher = ctx.create("Teacher", vec![("name", "Sato".into())]);
    let clazz = ctx.create("Clazz", vec![("name", "1-A".into())]);
    ctx.create(
        "TeacherClazz",
        vec![("teacher_id", teacher.values()[0].clone()), ("class_id", clazz.values()[0].clone())],
    );

    // The teacher link restricts deleting the teacher...
    let teacher_version = ctx.version("Teacher", &teacher);
    let err = ctx.executor.delete("Teacher", teacher.clone(), teacher_version).unwrap_err();
    assert!(err.is_referential());

    // ...but cascades away with the class.
    let plan = ctx.executor.plan_delete("Clazz", clazz.clone()).unwrap();
    assert_eq!(plan.len(), 2);
    let version = ctx.version("Clazz", &clazz);
    ctx.executor.delete("Clazz", clazz, version).unwrap();
    assert_eq!(ctx.count("TeacherClazz"), 0);
    ctx.executor.delete("Teacher", teacher, teacher_version).unwrap();
}

#[test]
fn test_custom_join_club_restricts_teacher() {
    let ctx = TestContext::new();
    let teacher = ctx.create("Teacher", vec![("name", "Sato".into())]);
    let club = ctx.create(
        "Club",
        vec![("name", "Chess".into()), ("teacher_id", teacher.values()[0].clone())],
    );

    let clubs = ctx.executor.fetch_related("Teacher", teacher.clone(), "club").unwrap();
    assert_eq!(clubs.len(), 1);
    assert_eq!(clubs[0].key, club);

    let owners = ctx.executor.fetch_related("Club", club.clone(), "teacher").unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].key, teacher);

    let version = ctx.version("Teacher", &teacher);
    let err = ctx.executor.delete("Teacher", teacher.clone(), version).unwrap_err();
    assert!(err.is_referential());
    assert_eq!(ctx.count("Club"), 1);

    // Custom joins are not enforced on write.
    ctx.create("Club", vec![("name", "Go".into()), ("teacher_id", int(99))]);
}

#[test]
fn test_fetch_related_both_directions() {
    let ctx = TestContext::new();
    let taro = ctx.create("Student", taro());
    ctx.create("Email", vec![("email", "a@x.com".into()), ("student_id", taro.values()[0].clone())]);
    ctx.create("Email", vec![("email", "b@x.com".into()), ("student_id", taro.values()[0].clone())]);

    let emails = ctx.executor.fetch_related("Student", taro.clone(), "emails").unwrap();
    assert_eq!(emails.len(), 2);
    assert!(emails.iter().all(|e| e.entity == "Email"));

    let owner = ctx
        .executor
        .fetch_related("Email", RowKey::new(vec!["a@x.com".into(), int(1)]), "student")
        .unwrap();
    assert_eq!(owner.len(), 1);
    assert_eq!(owner[0].get("name"), Some(&Value::String("Taro".into())));

    let err = ctx.executor.fetch_related("Student", taro, "clubs").unwrap_err();
    assert!(matches!(err, Error::Shape(ShapeError::UnknownRelation { .. })));
}

#[test]
fn test_enum_round_trip() {
    let ctx = TestContext::new();
    let key = ctx.create("Student", taro());
    let (row, _) = ctx.executor.read("Student", key.clone()).unwrap();
    assert_eq!(row.get("gender"), Some(&Value::enum_member("MALE")));

    let mut hanako = student("Hanako", "female", 92);
    hanako[1].1 = Value::enum_member("FEMALE");
    let other = ctx.create("Student", hanako);
    let (row, version) = ctx.executor.read("Student", other.clone()).unwrap();
    assert_eq!(row.get("gender"), Some(&Value::enum_member("FEMALE")));

    let err = ctx
        .executor
        .create("Student", owned(student("Jiro", "MALE", 65)))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Shape(ShapeError::UnknownEnumRepresentation { .. })
    ));

    let err = ctx
        .executor
        .update("Student", other, version, owned(vec![("gender", Value::enum_member("OTHER"))]))
        .unwrap_err();
    assert!(err.is_shape());

    let males = ctx
        .executor
        .fetch("Student", Predicate::eq("gender", "male").into())
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(males.len(), 1);
    assert_eq!(males[0].key, key);
}

#[test]
fn test_composite_key_uniqueness() {
    let ctx = TestContext::new();
    ctx.create("Student", taro());
    ctx.create("Student", student("Jiro", "male", 65));

    let email = |student_id: i32| owned(vec![("email", "a@x.com".into()), ("student_id", int(student_id))]);
    ctx.executor.create("Email", email(1)).unwrap();
    assert!(ctx.executor.create("Email", email(1)).unwrap_err().is_uniqueness());
    ctx.executor.create("Email", email(2)).unwrap();
    assert_eq!(ctx.count("Email"), 2);
}

#[test]
fn test_shape_errors() {
    let ctx = TestContext::new();

    let err = ctx.executor.create("Student", owned(vec![("score", int(10))])).unwrap_err();
    assert!(matches!(err, Error::Shape(ShapeError::MissingField { .. })));

    for required in ["gender", "address", "score"] {
        let err = ctx
            .executor
            .create("Student", owned(without(taro(), required)))
            .unwrap_err();
        match err {
            Error::Shape(ShapeError::MissingField { field, .. }) => assert_eq!(field, required),
            other => panic!("expected missing {required}, got {other:?}"),
        }
    }
    let mut nulled = without(taro(), "address");
    nulled.push(("address", Value::Null));
    assert!(ctx.executor.create("Student", owned(nulled)).unwrap_err().is_shape());
    assert_eq!(ctx.count("Student"), 0);

    let mut high = without(taro(), "score");
    high.push(("score", "high".into()));
    let err = ctx.executor.create("Student", owned(high)).unwrap_err();
    assert!(matches!(err, Error::Shape(ShapeError::TypeMismatch { .. })));

    let key = ctx.create("Student", taro());
    let version = ctx.version("Student", &key);
    let err = ctx
        .executor
        .update("Student", key.clone(), version, owned(vec![("updated_at", Value::Timestamp(0))]))
        .unwrap_err();
    assert!(matches!(err, Error::Shape(ShapeError::VersionFieldWrite { .. })));

    let err = ctx
        .executor
        .update("Student", key, version, owned(vec![("id", int(5))]))
        .unwrap_err();
    assert!(matches!(err, Error::Shape(ShapeError::KeyFieldUpdate { .. })));

    assert!(ctx.executor.fetch_all("Pupil").unwrap_err().is_shape());
}

#[test]
fn test_foreign_key_enforced_on_create_and_update() {
    let ctx = TestContext::new();
    let err = ctx
        .executor
        .create("Email", owned(vec![("email", "a@x.com".into()), ("student_id", int(7))]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ReferentialIntegrity(ReferentialError::MissingParent { .. })
    ));

    let student = ctx.create("Student", taro());
    let clazz = ctx.create("Clazz", vec![("name", "1-A".into())]);
    let enrolment = ctx.create(
        "StudentClazz",
        vec![("student_id", student.values()[0].clone()), ("class_id", clazz.values()[0].clone())],
    );
    let version = ctx.version("StudentClazz", &enrolment);
    let err = ctx
        .executor
        .update("StudentClazz", enrolment, version, owned(vec![("class_id", int(42))]))
        .unwrap_err();
    assert!(err.is_referential());
}

#[test]
fn test_fetch_is_lazy_and_restartable() {
    let ctx = TestContext::new();
    for (name, gender, score) in [
        ("Taro", "male", 80),
        ("Jiro", "male", 65),
        ("Hanako", "female", 92),
        ("Yuki", "female", 71),
    ] {
        ctx.create("Student", student(name, gender, score));
    }

    let fetch = ctx
        .executor
        .fetch("Student", Filter::all(vec![Predicate::ge("score", int(70))]))
        .unwrap();

    // Rows written after the fetch is built are seen by the next pass.
    assert_eq!(fetch.iter().count(), 3);
    ctx.create("Student", student("Ken", "male", 99));
    assert_eq!(fetch.iter().count(), 4);

    let limited = fetch.clone().limit(2);
    assert_eq!(limited.rows().unwrap().len(), 2);

    let none = ctx
        .executor
        .fetch("Student", Predicate::is_null("score").into())
        .unwrap();
    assert!(none.rows().unwrap().is_empty());

    assert!(ctx
        .executor
        .fetch("Student", Predicate::eq("nickname", "T").into())
        .unwrap_err()
        .is_shape());
}

#[test]
fn test_fetch_include_loads_only_requested_relations() {
    let ctx = TestContext::new();
    let taro = ctx.create("Student", taro());
    ctx.create("Email", vec![("email", "a@x.com".into()), ("student_id", taro.values()[0].clone())]);

    let plain = ctx.executor.fetch_all("Student").unwrap().rows().unwrap();
    assert!(plain[0].related.is_empty());

    let loaded = ctx
        .executor
        .fetch_all("Student")
        .unwrap()
        .include("emails")
        .unwrap()
        .include("student_clazz")
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(loaded[0].related("emails").map(<[_]>::len), Some(1));
    assert_eq!(loaded[0].related("student_clazz").map(<[_]>::len), Some(0));
}

#[test]
fn test_create_many_rolls_back_on_failure() {
    let ctx = TestContext::new();
    let rows = vec![
        owned(student("Taro", "male", 80)),
        owned(student("Jiro", "unknown", 65)),
    ];
    assert!(ctx.executor.create_many("Student", rows).unwrap_err().is_shape());
    assert_eq!(ctx.count("Student"), 0);

    let keys = ctx
        .executor
        .create_many(
            "Student",
            vec![owned(student("Taro", "male", 80)), owned(student("Jiro", "male", 65))],
        )
        .unwrap();
    assert_eq!(keys.len(), 2);
    ctx.db.flush().unwrap();
}
