//! Flows that need Postgres. Run with `DATABASE_URL=... cargo test -- --ignored`.

use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    Router,
};
use image::ImageFormat;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::{
    app::{
        build_app,
        testing::{bearer, send, send_multipart},
    },
    images::services::fixtures,
    state::AppState,
    storage::memory::MemoryStorage,
    users::tests::create_user,
};

struct Ctx {
    app: Router,
    auth: String,
    other_auth: String,
    storage: Arc<MemoryStorage>,
}

async fn setup(pool: PgPool) -> Ctx {
    let me = create_user(&pool, "test@server.com", "pass123").await;
    let other = create_user(&pool, "other@server.com", "pass123").await;
    let storage = Arc::new(MemoryStorage::default());
    let state = AppState::from_parts(pool, Arc::new(AppState::test_config()), storage.clone());
    Ctx {
        auth: bearer(&state, me.id),
        other_auth: bearer(&state, other.id),
        app: build_app(state),
        storage,
    }
}

impl Ctx {
    async fn post(&self, auth: &str, uri: &str, body: Value) -> Value {
        let (status, body) = send(&self.app, Method::POST, uri, Some(auth), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{uri}: {body}");
        body
    }

    async fn get(&self, uri: &str) -> Value {
        let (status, body) = send(&self.app, Method::GET, uri, Some(&self.auth), None).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        body
    }

    async fn tag(&self, auth: &str, name: &str) -> i64 {
        self.post(auth, "/recipe/tags", json!({ "name": name })).await["id"]
            .as_i64()
            .unwrap()
    }

    async fn ingredient(&self, auth: &str, name: &str) -> i64 {
        self.post(auth, "/recipe/ingredients", json!({ "name": name })).await["id"]
            .as_i64()
            .unwrap()
    }

    async fn recipe(&self, auth: &str, title: &str, tags: &[i64], ingredients: &[i64]) -> i64 {
        self.post(
            auth,
            "/recipe/recipes",
            json!({
                "title": title,
                "time_minutes": 10,
                "price": "5.00",
                "tags": tags,
                "ingredients": ingredients,
            }),
        )
        .await["id"]
            .as_i64()
            .unwrap()
    }
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect()
}

fn names(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["name"].as_str().unwrap())
        .collect()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn tags_listed_by_name_desc_and_scoped_to_owner(pool: PgPool) {
    let ctx = setup(pool).await;
    ctx.tag(&ctx.auth, "Vegan").await;
    ctx.tag(&ctx.auth, "Dessert").await;
    ctx.tag(&ctx.other_auth, "Fruity").await;

    let list = ctx.get("/recipe/tags").await;
    assert_eq!(names(&list), ["Vegan", "Dessert"]);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn ingredients_scoped_to_owner(pool: PgPool) {
    let ctx = setup(pool).await;
    ctx.ingredient(&ctx.other_auth, "Tofu").await;
    let soya = ctx.ingredient(&ctx.auth, "Soya").await;

    let list = ctx.get("/recipe/ingredients").await;
    assert_eq!(list, json!([{ "id": soya, "name": "Soya" }]));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn assigned_only_returns_linked_entities_once(pool: PgPool) {
    let ctx = setup(pool).await;
    let breakfast = ctx.tag(&ctx.auth, "Breakfast").await;
    ctx.tag(&ctx.auth, "Lunch").await;
    ctx.recipe(&ctx.auth, "Pancakes", &[breakfast], &[]).await;
    ctx.recipe(&ctx.auth, "Porridge", &[breakfast], &[]).await;

    let list = ctx.get("/recipe/tags?assigned_only=1").await;
    assert_eq!(ids(&list), [breakfast]);

    let eggs = ctx.ingredient(&ctx.auth, "Eggs").await;
    ctx.ingredient(&ctx.auth, "Cheese").await;
    ctx.recipe(&ctx.auth, "Omelette", &[], &[eggs]).await;
    ctx.recipe(&ctx.auth, "Frittata", &[], &[eggs]).await;
    let list = ctx.get("/recipe/ingredients?assigned_only=1").await;
    assert_eq!(ids(&list), [eggs]);

    let all = ctx.get("/recipe/ingredients?assigned_only=0").await;
    assert_eq!(ids(&all).len(), 2);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn recipes_newest_first_and_scoped(pool: PgPool) {
    let ctx = setup(pool).await;
    let first = ctx.recipe(&ctx.auth, "recipe1", &[], &[]).await;
    let second = ctx.recipe(&ctx.auth, "recipe2", &[], &[]).await;
    ctx.recipe(&ctx.other_auth, "theirs", &[], &[]).await;

    let list = ctx.get("/recipe/recipes").await;
    assert_eq!(ids(&list), [second, first]);
    assert_eq!(list[0]["price"], "5.00");
    assert_eq!(list[0]["tags"], json!([]));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn filter_by_tags_is_a_union(pool: PgPool) {
    let ctx = setup(pool).await;
    let vegan = ctx.tag(&ctx.auth, "Vegan").await;
    let veggie = ctx.tag(&ctx.auth, "Vegetarian").await;
    let curry = ctx.recipe(&ctx.auth, "Thai curry", &[vegan], &[]).await;
    let tahini = ctx.recipe(&ctx.auth, "Aubergine with tahini", &[veggie], &[]).await;
    let both = ctx.recipe(&ctx.auth, "Salad", &[vegan, veggie], &[]).await;
    ctx.recipe(&ctx.auth, "Fish and chips", &[], &[]).await;

    let list = ctx.get(&format!("/recipe/recipes?tags={vegan},{veggie}")).await;
    assert_eq!(ids(&list), [both, tahini, curry]);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn filter_by_ingredients(pool: PgPool) {
    let ctx = setup(pool).await;
    let feta = ctx.ingredient(&ctx.auth, "Feta").await;
    let chicken = ctx.ingredient(&ctx.auth, "Chicken").await;
    let beans = ctx.recipe(&ctx.auth, "Beans on toast", &[], &[feta]).await;
    let stew = ctx.recipe(&ctx.auth, "Stew", &[], &[chicken]).await;
    ctx.recipe(&ctx.auth, "Mushrooms", &[], &[]).await;

    let list = ctx.get(&format!("/recipe/recipes?ingredients={feta},%20{chicken}")).await;
    assert_eq!(ids(&list), [stew, beans]);

    // blank value means no filter
    let list = ctx.get("/recipe/recipes?ingredients=").await;
    assert_eq!(ids(&list).len(), 3);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn detail_nests_relations_and_hides_other_users(pool: PgPool) {
    let ctx = setup(pool).await;
    let tag = ctx.tag(&ctx.auth, "Dinner").await;
    let ing = ctx.ingredient(&ctx.auth, "Salt").await;
    let id = ctx.recipe(&ctx.auth, "Steak", &[tag], &[ing]).await;

    let detail = ctx.get(&format!("/recipe/recipes/{id}")).await;
    assert_eq!(detail["tags"], json!([{ "id": tag, "name": "Dinner" }]));
    assert_eq!(detail["ingredients"], json!([{ "id": ing, "name": "Salt" }]));

    let (status, _) = send(&ctx.app, Method::GET, &format!("/recipe/recipes/{id}"), Some(&ctx.other_auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn foreign_tag_ids_are_rejected(pool: PgPool) {
    let ctx = setup(pool).await;
    let theirs = ctx.tag(&ctx.other_auth, "Secret").await;

    let (status, body) = send(
        &ctx.app,
        Method::POST,
        "/recipe/recipes",
        Some(&ctx.auth),
        Some(json!({ "title": "Soup", "time_minutes": 5, "price": 1.5, "tags": [theirs] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["tags"][0].as_str().unwrap().contains(&theirs.to_string()));
    assert_eq!(ctx.get("/recipe/recipes").await, json!([]));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn patch_keeps_tags_put_clears_them(pool: PgPool) {
    let ctx = setup(pool).await;
    let tag = ctx.tag(&ctx.auth, "Curry").await;
    let id = ctx.recipe(&ctx.auth, "Chicken tikka", &[tag], &[]).await;
    let uri = format!("/recipe/recipes/{id}");

    let (status, body) = send(&ctx.app, Method::PATCH, &uri, Some(&ctx.auth), Some(json!({ "title": "Chicken masala" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Chicken masala");
    assert_eq!(ids(&body["tags"]), [tag]);
    assert_eq!(body["price"], "5.00");

    let (status, body) = send(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(&ctx.auth),
        Some(json!({ "title": "Spaghetti", "time_minutes": 25, "price": "5.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Spaghetti");
    assert_eq!(body["time_minutes"], 25);
    assert_eq!(body["tags"], json!([]));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_tag_unlinks_it(pool: PgPool) {
    let ctx = setup(pool).await;
    let tag = ctx.tag(&ctx.auth, "Temp").await;
    let id = ctx.recipe(&ctx.auth, "Toast", &[tag], &[]).await;

    let (status, _) = send(&ctx.app, Method::DELETE, &format!("/recipe/tags/{tag}"), Some(&ctx.other_auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&ctx.app, Method::DELETE, &format!("/recipe/tags/{tag}"), Some(&ctx.auth), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let detail = ctx.get(&format!("/recipe/recipes/{id}")).await;
    assert_eq!(detail["tags"], json!([]));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn image_upload_lifecycle(pool: PgPool) {
    let ctx = setup(pool).await;
    let id = ctx.recipe(&ctx.auth, "Pizza", &[], &[]).await;
    let uri = format!("/recipe/recipes/{id}/upload-image");

    let (status, body) = send_multipart(&ctx.app, &uri, &ctx.auth, "image", b"notimage").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["image"].is_array());
    assert_eq!(ctx.get(&format!("/recipe/recipes/{id}")).await["image"], Value::Null);
    assert!(ctx.storage.objects.lock().unwrap().is_empty());

    let png = fixtures::encoded(ImageFormat::Png);
    let (status, body) = send_multipart(&ctx.app, &uri, &ctx.auth, "image", &png).await;
    assert_eq!(status, StatusCode::OK);
    let first = body["image"].as_str().unwrap().to_string();
    assert!(first.starts_with("uploads/recipe/") && first.ends_with(".png"));
    assert!(ctx.storage.objects.lock().unwrap().contains_key(&first));

    // replacing drops the old blob
    let jpg = fixtures::encoded(ImageFormat::Jpeg);
    let (_, body) = send_multipart(&ctx.app, &uri, &ctx.auth, "image", &jpg).await;
    let second = body["image"].as_str().unwrap().to_string();
    {
        let objects = ctx.storage.objects.lock().unwrap();
        assert!(!objects.contains_key(&first));
        assert!(objects.contains_key(&second));
    }

    let (status, _) = send(&ctx.app, Method::DELETE, &uri, Some(&ctx.auth), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.storage.objects.lock().unwrap().is_empty());
    assert_eq!(ctx.get(&format!("/recipe/recipes/{id}")).await["image"], Value::Null);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_recipe_removes_its_image(pool: PgPool) {
    let ctx = setup(pool).await;
    let id = ctx.recipe(&ctx.auth, "Cake", &[], &[]).await;
    let png = fixtures::encoded(ImageFormat::Png);
    let (status, _) = send_multipart(&ctx.app, &format!("/recipe/recipes/{id}/upload-image"), &ctx.auth, "image", &png).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&ctx.app, Method::DELETE, &format!("/recipe/recipes/{id}"), Some(&ctx.auth), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.storage.objects.lock().unwrap().is_empty());
    let (status, _) = send(&ctx.app, Method::GET, &format!("/recipe/recipes/{id}"), Some(&ctx.auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn upload_without_image_field(pool: PgPool) {
    let ctx = setup(pool).await;
    let id = ctx.recipe(&ctx.auth, "Bread", &[], &[]).await;
    let png = fixtures::encoded(ImageFormat::Png);
    let (status, body) = send_multipart(&ctx.app, &format!("/recipe/recipes/{id}/upload-image"), &ctx.auth, "file", &png).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["image"][0], "No file was submitted.");
}
