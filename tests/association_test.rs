use jsonapi_orm::framework::mock::MockTransport;
use jsonapi_orm::{into_params, Api, Attribute, Fetched, Method, OrmError, TypeBuilder};
use serde_json::json;

fn setup() -> (MockTransport, Api) {
    let mock = MockTransport::new();
    let api = Api::builder(mock.transport())
        .register(
            TypeBuilder::new("User")
                .has_many("comments")
                .has_one("role")
                .accepts_nested_attributes_for("comments"),
        )
        .register(
            TypeBuilder::new("Comment")
                .collection_path("users/:user_id/comments")
                .has_many("replies"),
        )
        .register(TypeBuilder::new("Reply"))
        .register(TypeBuilder::new("Role"))
        .build()
        .expect("Failed to build api");
    (mock, api)
}

#[tokio::test]
async fn test_unfiltered_fetch_is_memoized() {
    let (mut mock, api) = setup();
    mock.expect(Method::Get, "users/1/comments").respond(
        200,
        json!({ "data": [
            { "id": 2, "attributes": { "body": "Tobias, you blow hard!" } },
            { "id": 3, "attributes": { "body": "I wasn't there" } }
        ] }),
    );

    let mut user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let comments = user.association("comments").unwrap();

    let first = comments.fetch(&mut user).await.unwrap().into_many();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].type_name(), "Comment");

    // Served from the memo; a second request would panic the mock
    let second = user.fetch_association("comments").await.unwrap();
    assert_eq!(second.into_many(), first);
    mock.verify();
}

#[tokio::test]
async fn test_filtered_fetch_is_never_memoized() {
    let (mut mock, api) = setup();
    mock.expect(Method::Get, "users/1/comments")
        .respond(200, json!({ "data": [{ "id": 2 }] }));
    mock.expect(Method::Get, "users/1/comments")
        .respond(200, json!({ "data": [{ "id": 2 }] }));

    let mut user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let comments = user.association("comments").unwrap();
    let approved = comments.filter(into_params(json!({ "approved": 1 })));
    let recent = comments.filter(into_params(json!({ "recent": true })));

    assert!(comments.params().is_empty());
    assert_eq!(approved.params().len(), 1);
    assert!(!recent.params().contains_key("approved"));

    approved.fetch(&mut user).await.unwrap();
    approved.fetch(&mut user).await.unwrap();
    assert_eq!(mock.last_request().unwrap().params["approved"], json!(1));
    mock.verify();
}

#[tokio::test]
async fn test_all_keeps_accumulated_params() {
    let (mut mock, api) = setup();
    mock.expect(Method::Get, "users/1/comments")
        .respond(200, json!({ "data": [{ "id": 2 }] }));
    mock.expect(Method::Get, "users/1/comments")
        .respond(200, json!({ "data": [{ "id": 2 }] }));

    let mut user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let approved = user
        .association("comments")
        .unwrap()
        .filter(into_params(json!({ "approved": 1 })))
        .all();
    assert_eq!(approved.params()["approved"], json!(1));

    // Still filtered, so each fetch goes to the service and nothing is memoized
    approved.fetch(&mut user).await.unwrap();
    assert_eq!(mock.last_request().unwrap().params["approved"], json!(1));
    approved.fetch(&mut user).await.unwrap();
    mock.verify();
}

#[tokio::test]
async fn test_embedded_and_empty_values_need_no_request() {
    let (mock, api) = setup();
    let users = api.model("User").unwrap();

    let mut with_data = users.instantiate(into_params(json!({
        "id": 1,
        "comments": [{ "id": 2, "attributes": { "body": "Hi" } }],
        "role": { "id": 4, "attributes": { "name": "Admin" } }
    })));
    let comments = with_data.fetch_association("comments").await.unwrap().into_many();
    assert_eq!(comments[0].value("body"), Some(&json!("Hi")));
    let role = with_data.fetch_association("role").await.unwrap().into_one().unwrap();
    assert_eq!(role.value("name"), Some(&json!("Admin")));

    let mut empty = users.instantiate(into_params(json!({ "id": 1, "comments": [] })));
    let fetched = empty.fetch_association("comments").await.unwrap();
    assert_eq!(fetched, Fetched::Many(Vec::new()));

    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_unsaved_parent_is_not_memoized() {
    let (mut mock, api) = setup();
    mock.expect(Method::Post, "users")
        .respond(201, json!({ "data": { "id": 5, "attributes": { "name": "Gob" } } }));
    mock.expect(Method::Get, "users/5/comments")
        .respond(200, json!({ "data": [{ "id": 9 }] }));

    let mut user = api
        .model("User")
        .unwrap()
        .new_resource(into_params(json!({ "name": "Gob" })));
    let before = user.fetch_association("comments").await.unwrap();
    assert!(before.is_empty());

    assert!(user.save().await.unwrap());
    let after = user.fetch_association("comments").await.unwrap();
    assert_eq!(after.len(), 1);
    mock.verify();
}

#[tokio::test]
async fn test_has_one_fetch() {
    let (mut mock, api) = setup();
    mock.expect(Method::Get, "users/1/role")
        .respond(200, json!({ "data": { "id": 4, "attributes": { "name": "Admin" } } }));

    let mut user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let role = user.fetch_association("role").await.unwrap().into_one();
    assert_eq!(role.unwrap().type_name(), "Role");
    mock.verify();
}

#[tokio::test]
async fn test_find_under_parent_path() {
    let (mut mock, api) = setup();
    mock.expect(Method::Get, "users/1/comments/3")
        .respond(200, json!({ "data": { "id": 3, "attributes": { "body": "Hi" } } }));

    let user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let comments = user.association("comments").unwrap();

    let found = comments.find(&user, 3).await.unwrap().unwrap();
    assert_eq!(found.value("body"), Some(&json!("Hi")));
    assert!(comments.find(&user, "").await.unwrap().is_none());
    assert!(comments.find(&user, json!(null)).await.unwrap().is_none());
    mock.verify();
}

#[tokio::test]
async fn test_unbuildable_parent_path_yields_nothing() {
    let (mock, api) = setup();
    // No user_id, so the comment's own path can't be built
    let mut comment = api
        .model("Comment")
        .unwrap()
        .instantiate(into_params(json!({ "id": 3 })));
    let replies = comment.association("replies").unwrap();

    assert!(replies.find(&comment, 1).await.unwrap().is_none());
    assert!(replies.fetch(&mut comment).await.unwrap().is_empty());
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_create_attaches_child_with_parent_key() {
    let (mut mock, api) = setup();
    mock.expect(Method::Post, "users/1/comments").respond(
        201,
        json!({ "data": { "id": 9, "attributes": { "body": "Hi", "user_id": 1 } } }),
    );

    let mut user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let comments = user.association("comments").unwrap();
    assert_eq!(comments.foreign_key(), "user_id");

    let child = comments
        .create(&mut user, into_params(json!({ "body": "Hi" })))
        .await
        .unwrap();
    assert_eq!(child.id(), Some(&json!(9)));
    assert_eq!(
        mock.last_request().unwrap().params["data"]["attributes"],
        json!({ "body": "Hi", "user_id": 1 })
    );

    let attached = user.get("comments").and_then(Attribute::as_resources).unwrap();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id(), Some(&json!(9)));
    mock.verify();
}

#[tokio::test]
async fn test_association_rejects_unrelated_parent() {
    let (_mock, api) = setup();
    let user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let mut role = api
        .model("Role")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));

    let comments = user.association("comments").unwrap();
    assert!(matches!(
        comments.fetch(&mut role).await,
        Err(OrmError::UnknownAssociation { .. })
    ));
}

#[test]
fn test_nested_single_assignment_builds_then_merges() {
    let (_mock, api) = setup();
    let mut user = api
        .model("User")
        .unwrap()
        .instantiate(into_params(json!({ "id": 1 })));
    let role = user.association("role").unwrap();

    role.assign_single_nested_attributes(&mut user, into_params(json!({ "name": "Admin" })))
        .unwrap();
    role.assign_single_nested_attributes(&mut user, into_params(json!({ "level": 2 })))
        .unwrap();

    let child = user.get("role").and_then(Attribute::as_resource).unwrap();
    assert_eq!(child.value("name"), Some(&json!("Admin")));
    assert_eq!(child.value("level"), Some(&json!(2)));
}
