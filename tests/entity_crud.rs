mod common;

use apiframe::{AppError, EntityHooks, Settings};
use apiframe::config::EntitySchema;
use apiframe::store::Row;
use common::{app, app_with, attrs};
use serde_json::{json, Map, Value};

#[test]
fn create_then_find_returns_fillable_fields() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    let created = posts
        .create(attrs(json!({"title": "Hello", "user_id": 1, "status": "draft", "extra": "ignored"})))
        .unwrap();
    let id = created["id"].clone();
    assert_eq!(id, json!(1));

    let found = posts.find(&id).unwrap();
    assert_eq!(found["title"], json!("Hello"));
    assert_eq!(found["user_id"], json!(1));
    assert_eq!(found["status"], json!("draft"));
    assert!(!found.contains_key("extra"));
    assert_eq!(found["author"], json!({"name": "Ann"}));
    assert_eq!(found["tags"], json!([]));
    assert_eq!(found["comments"], json!([]));
    assert_eq!(found["images"], json!([]));
}

#[test]
fn missing_required_field_is_a_validation_error() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    match posts.create(attrs(json!({"user_id": "abc"}))) {
        Err(AppError::Validation(errors)) => {
            assert_eq!(errors.get("title"), Some("required"));
            assert_eq!(errors.get("user_id"), Some("numeric"));
        }
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(posts.count().unwrap(), 0);
}

#[test]
fn search_pages_and_counts_across_pages() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    for n in 0..7 {
        posts.create(attrs(json!({"title": format!("Post {}", n)}))).unwrap();
    }
    posts.create(attrs(json!({"title": "Other"}))).unwrap();

    let params = attrs(json!({"title": "Post", "limit": 5}));
    let rows = posts.search(&params).unwrap().get().unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r["title"].as_str().unwrap().starts_with("Post")));
    assert_eq!(posts.search(&params).unwrap().count().unwrap(), 7);

    let page = posts
        .search(&attrs(json!({"title": "Post", "limit": "5", "offset": "5"})))
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(posts.pagination().offset, 5);
    assert_eq!(posts.pagination().limit, Some(5));
}

#[test]
fn search_rejects_unsafe_order() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    let err = posts
        .search(&attrs(json!({"order": "id; DROP TABLE posts"})))
        .err()
        .unwrap();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    posts.create(attrs(json!({"title": "a"}))).unwrap();
    posts.create(attrs(json!({"title": "b"}))).unwrap();
    let rows = posts
        .search(&attrs(json!({"order": "title DESC"})))
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(rows[0]["title"], json!("b"));
}

#[test]
fn first_and_equality_filter() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    assert!(posts.first().unwrap().is_none());
    posts.create(attrs(json!({"title": "a", "status": "draft"}))).unwrap();
    posts.create(attrs(json!({"title": "b", "status": "live"}))).unwrap();
    let live = posts
        .search(&attrs(json!({"status": "live"})))
        .unwrap()
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(live["title"], json!("b"));
}

#[test]
fn first_follows_the_current_page() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    for title in ["a", "b", "c"] {
        posts.create(attrs(json!({"title": title}))).unwrap();
    }
    let second = posts
        .search(&attrs(json!({"offset": 1})))
        .unwrap()
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(second["title"], json!("b"));
}

#[test]
fn concurrent_creates_return_their_own_records() {
    let app = app();
    let workers: Vec<_> = (0..4)
        .map(|t| {
            let app = app.clone();
            std::thread::spawn(move || {
                let mut posts = app.entity("posts").unwrap();
                let mut mismatched = 0;
                for n in 0..50 {
                    let title = format!("t{}-{}", t, n);
                    let created = posts
                        .create(attrs(json!({"title": title.clone(), "tags": [t + 1]})))
                        .unwrap();
                    if created["title"] != json!(title) || created["tags"] != json!([t + 1]) {
                        mismatched += 1;
                    }
                }
                mismatched
            })
        })
        .collect();
    let mismatched: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(mismatched, 0);
    assert_eq!(app.entity("posts").unwrap().count().unwrap(), 200);
}

#[test]
fn update_of_missing_id_writes_nothing() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    let err = posts
        .update(
            &json!(4242),
            attrs(json!({"title": "Ghost", "tags": [1, 2], "images": [{"url": "g.png"}]})),
        )
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mut q = apiframe::QueryBuilder::new(app.executor());
    assert_eq!(q.use_table("post_tag").count("post_id").unwrap(), 0);
    assert_eq!(q.use_table("images").count("id").unwrap(), 0);
    assert_eq!(app.entity("comments").unwrap().count().unwrap(), 0);
}

#[test]
fn find_reports_missing_and_undefined_ids() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    assert!(matches!(posts.find(&json!(9999)), Err(AppError::NotFound(_))));
    assert!(matches!(posts.find(&Value::Null), Err(AppError::InvalidArgument(_))));
    assert!(matches!(posts.destroy(&Value::Null), Err(AppError::InvalidArgument(_))));
}

#[test]
fn update_changes_only_fillable_fields() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    let id = posts.create(attrs(json!({"title": "Old", "user_id": 1})))
        .unwrap()["id"]
        .clone();
    let updated = posts
        .update(&id, attrs(json!({"title": "New", "user_id": 2, "id": 77})))
        .unwrap();
    assert_eq!(updated["id"], id);
    assert_eq!(updated["title"], json!("New"));
    assert_eq!(updated["author"], json!({"name": "Bob"}));

    let err = posts.update(&json!(4242), attrs(json!({"title": "Ghost"}))).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn destroy_removes_row_and_fails_on_zero_rows() {
    let app = app();
    let mut posts = app.entity("posts").unwrap();
    let id = posts.create(attrs(json!({"title": "Gone"}))).unwrap()["id"].clone();
    assert_eq!(posts.destroy(&id).unwrap(), id);
    assert!(matches!(posts.find(&id), Err(AppError::NotFound(_))));
    assert!(matches!(posts.destroy(&id), Err(AppError::Execution(_))));
}

#[test]
fn unknown_entity_is_not_found() {
    assert!(matches!(app().entity("nope"), Err(AppError::NotFound(_))));
}

struct StampHooks;

impl EntityHooks for StampHooks {
    fn after_get(&self, _schema: &EntitySchema, rows: &mut Vec<Row>) -> Result<(), AppError> {
        for row in rows.iter_mut() {
            row.insert("seen".into(), json!(true));
        }
        Ok(())
    }

    fn before_create(
        &self,
        _schema: &EntitySchema,
        mut attributes: Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        attributes.insert("status".into(), json!("hooked"));
        Ok(attributes)
    }

    fn before_destroy(&self, _schema: &EntitySchema, _id: &Value) -> Result<(), AppError> {
        Err(AppError::InvalidArgument("posts are permanent".into()))
    }
}

#[test]
fn hooks_shape_reads_and_writes() {
    let app = app().with_hooks("posts", StampHooks);
    let mut posts = app.entity("posts").unwrap();
    let created = posts.create(attrs(json!({"title": "Hooked"}))).unwrap();
    assert_eq!(created["status"], json!("hooked"));
    assert_eq!(created["seen"], json!(true));

    let id = created["id"].clone();
    assert!(matches!(posts.destroy(&id), Err(AppError::InvalidArgument(_))));
    assert!(posts.find(&id).is_ok());

    let mut users = app.entity("users").unwrap();
    let user = users.find(&json!(1)).unwrap();
    assert!(!user.contains_key("seen"));
}

#[test]
fn statements_are_appended_to_the_query_log() {
    let path = std::env::temp_dir().join(format!("apiframe-queries-{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let app = app_with(Settings::default().with("debug.queries", path.to_string_lossy()));
    let mut users = app.entity("users").unwrap();
    users.find(&json!(1)).unwrap();
    assert!(users.last_query().starts_with("SELECT users.* FROM users"));

    let log = std::fs::read_to_string(&path).unwrap();
    assert!(log.lines().any(|l| l.ends_with(users.last_query()) && l.contains(" - ")));
    let _ = std::fs::remove_file(&path);
}
