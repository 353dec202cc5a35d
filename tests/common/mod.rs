#![allow(dead_code)]

use apiframe::{resolve, AppState, Connection, FullConfig, Settings, SqliteConnection};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL);
CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT NOT NULL, user_id INTEGER, status TEXT);
CREATE TABLE post_tag (post_id INTEGER NOT NULL, tag_id INTEGER NOT NULL);
CREATE TABLE comments (id INTEGER PRIMARY KEY, post_id INTEGER NOT NULL, body TEXT NOT NULL);
CREATE TABLE images (id INTEGER PRIMARY KEY, post_id INTEGER NOT NULL, url TEXT NOT NULL, position INTEGER);
CREATE TABLE albums (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE photos (id INTEGER PRIMARY KEY, album_id INTEGER NOT NULL, url TEXT NOT NULL);

INSERT INTO users (id, name, email) VALUES (1, 'Ann', 'ann@example.com'), (2, 'Bob', 'bob@example.com');
INSERT INTO tags (id, label) VALUES (1, 'rust'), (2, 'sql'), (3, 'web');
";

pub fn entities() -> FullConfig {
    serde_json::from_value(json!({ "entities": [
        {
            "name": "users",
            "table": "users",
            "fillable": ["name", "email"],
            "validate": { "name": ["required"], "email": ["email"] }
        },
        {
            "name": "comments",
            "table": "comments",
            "fillable": ["post_id", "body"],
            "validate": { "body": ["required"] },
            "order_by": "id"
        },
        {
            "name": "posts",
            "table": "posts",
            "fillable": ["title", "user_id", "status"],
            "validate": { "title": ["required"], "user_id": ["numeric"] },
            "filters": {
                "title": { "column": "title", "operator": "contains" },
                "status": { "column": "status" },
                "tags": { "column": "tags" }
            },
            "relationships": [
                { "kind": "has_one", "table": "users", "local_key": "user_id", "foreign_key": "id",
                  "alias": "author", "columns": ["name"] },
                { "kind": "has_many", "model": "comments", "local_key": "id", "foreign_key": "post_id",
                  "alias": "comments", "order_by": "id", "sync": ["insert", "update", "overwrite"] },
                { "kind": "has_many", "table": "images", "local_key": "id", "foreign_key": "post_id",
                  "alias": "images", "columns": ["id", "url"], "limit": 2, "order_by": "position",
                  "sync": ["insert", "update"] },
                { "kind": "belongs_to_many", "pivot": "post_tag", "local_key": "post_id",
                  "foreign_key": "tag_id", "alias": "tags", "sync": true }
            ],
            "order_by": "posts.id"
        },
        {
            "name": "albums",
            "table": "albums",
            "fillable": ["name"],
            "relationships": [
                { "kind": "has_many", "table": "photos", "local_key": "id", "foreign_key": "album_id",
                  "alias": "photos", "columns": ["id", "url"], "order_by": "id",
                  "sync": ["insert", "update", "overwrite"] }
            ]
        }
    ]}))
    .expect("fixture config")
}

pub fn connection() -> Arc<dyn Connection> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let conn = SqliteConnection::open_in_memory().expect("open sqlite");
    conn.execute_batch(SCHEMA).expect("schema");
    Arc::new(conn)
}

pub fn app() -> AppState {
    app_with(Settings::default())
}

pub fn app_with(settings: Settings) -> AppState {
    let model = resolve(&entities()).expect("resolve fixture");
    AppState::new(connection(), model, settings)
}

pub fn attrs(v: Value) -> Map<String, Value> {
    v.as_object().expect("object").clone()
}
