use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{AppState, routes};

pub mod auth;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::checklists::router(&state))
        .merge(routes::items::router(&state))
        .merge(routes::templates::router(&state))
        .layer(from_fn_with_state(state.clone(), auth::require_api_auth));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, Request, StatusCode, header};
    use chrono::{Duration, SecondsFormat, Utc};
    use serde_json::{Value, json};

    use crate::test_support::{TEST_USER_ID, TestApp};

    fn in_days(days: i64) -> String {
        (Utc::now() + Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn checklist_body(object_id: Value, items: &[&str]) -> Value {
        json!({
            "data": {
                "attributes": {
                    "object_domain": "contact",
                    "object_id": object_id,
                    "description": "Onboarding",
                    "due": in_days(7),
                    "items": items,
                }
            }
        })
    }

    async fn create_checklist(app: &TestApp, items: &[&str]) -> Value {
        let (status, body) = app.post("/checklists", checklist_body(json!("1"), items)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    fn item_ids(checklist: &Value) -> Vec<i64> {
        checklist["attributes"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_remains_public_in_token_mode() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(Request::builder().uri("/health"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_requires_known_token() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send(Request::builder().uri("/checklists"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], 401);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = app
            .send(
                Request::builder()
                    .uri("/checklists")
                    .header(header::AUTHORIZATION, "Bearer wrong"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(
                Request::builder()
                    .uri("/checklists")
                    .header("x-api-token", crate::test_support::TEST_TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unauthorized_before_missing_checklist() {
        let app = TestApp::new().await;
        let (status, _) = app
            .send(Request::builder().uri("/checklists/999"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_checklist_returns_items_and_audit_fields() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post("/checklists", checklist_body(json!(42), &["Call", "Email"]))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let data = &body["data"];
        assert_eq!(data["type"], "checklists");
        let id = data["id"].as_i64().unwrap();
        assert_eq!(
            data["links"]["self"],
            format!("http://localhost/checklists/{id}")
        );

        let attributes = &data["attributes"];
        assert_eq!(attributes["object_id"], "42");
        assert_eq!(attributes["is_completed"], false);
        assert_eq!(attributes["completed_at"], Value::Null);
        assert_eq!(attributes["created_by"], TEST_USER_ID);

        let items = attributes["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["description"], "Call");
        assert_eq!(items[0]["checklist_id"], id);
        assert_eq!(items[1]["is_completed"], false);
    }

    #[tokio::test]
    async fn get_checklist_includes_items_on_request() {
        let app = TestApp::new().await;
        let checklist = create_checklist(&app, &["Call"]).await;
        let id = checklist["id"].as_i64().unwrap();

        let (status, body) = app.get(&format!("/checklists/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["attributes"].get("items").is_none());

        let (status, body) = app.get(&format!("/checklists/{id}?include=items")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["attributes"]["items"].as_array().unwrap().len(), 1);

        let (status, body) = app.get("/checklists/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
    }

    #[tokio::test]
    async fn create_checklist_reports_field_errors() {
        let app = TestApp::new().await;
        let body = json!({
            "data": {
                "attributes": {
                    "object_domain": "contact",
                    "object_id": true,
                    "due": in_days(-1),
                    "items": [],
                }
            }
        });

        let (status, body) = app.post("/checklists", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], 422);
        let errors = &body["errors"];
        assert!(errors.get("data.attributes.description").is_some(), "{errors}");
        assert!(errors.get("data.attributes.object_id").is_some(), "{errors}");
        assert!(errors.get("data.attributes.due").is_some(), "{errors}");
        assert!(errors.get("data.attributes.items").is_some(), "{errors}");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = TestApp::new().await;
        let (status, _) = app
            .send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/checklists")
                    .header(header::AUTHORIZATION, "Bearer sekrit")
                    .header(header::CONTENT_TYPE, "application/json"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_and_delete_checklist() {
        let app = TestApp::new().await;
        let checklist = create_checklist(&app, &["Call"]).await;
        let id = checklist["id"].as_i64().unwrap();

        let (status, body) = app
            .patch(
                &format!("/checklists/{id}"),
                json!({"data": {"attributes": {"description": "Renamed", "due": null}}}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["attributes"]["description"], "Renamed");
        assert_eq!(body["data"]["attributes"]["due"], Value::Null);
        assert_eq!(body["data"]["attributes"]["updated_by"], TEST_USER_ID);

        let (status, body) = app.delete(&format!("/checklists/{id}")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = app.get(&format!("/checklists/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_checklists_paginates_with_links() {
        let app = TestApp::new().await;
        for _ in 0..3 {
            create_checklist(&app, &["Call"]).await;
        }

        let (status, body) = app.get("/checklists?page%5Blimit%5D=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["meta"]["count"], 2);
        assert_eq!(body["meta"]["total"], 3);
        assert_eq!(body["links"]["prev"], Value::Null);
        assert_eq!(
            body["links"]["next"],
            "http://localhost/checklists?page%5Blimit%5D=2&page%5Boffset%5D=2"
        );
        assert_eq!(body["links"]["last"], body["links"]["next"]);

        let (status, body) = app
            .get("/checklists?page%5Blimit%5D=2&page%5Boffset%5D=2&sort=-id")
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["links"]["next"], Value::Null);
        assert!(body["links"]["prev"].as_str().unwrap().contains("sort=-id"));

        let (status, body) = app.get("/checklists?filter%5Bnope%5D%5Bis%5D=1").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }

    #[tokio::test]
    async fn item_crud_is_scoped_to_its_checklist() {
        let app = TestApp::new().await;
        let first = create_checklist(&app, &["Call"]).await;
        let second = create_checklist(&app, &["Email"]).await;
        let first_id = first["id"].as_i64().unwrap();
        let foreign_item = item_ids(&second)[0];

        let (status, body) = app
            .post(
                &format!("/checklists/{first_id}/items"),
                json!({"data": {"attributes": {"description": "Visit", "due": in_days(2), "urgency": 2}}}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let item_id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["type"], "items");
        assert_eq!(body["data"]["attributes"]["urgency"], 2);

        let (status, body) = app
            .post(
                &format!("/checklists/{first_id}/items"),
                json!({"data": {"attributes": {"description": "Late", "due": in_days(30)}}}),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"].get("data.attributes.due").is_some());

        let (status, body) = app.get(&format!("/checklists/{first_id}/items")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 2);

        let (status, _) = app
            .get(&format!("/checklists/{first_id}/items/{foreign_item}"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .patch(
                &format!("/checklists/{first_id}/items/{item_id}"),
                json!({"data": {"attributes": {"description": "Visit twice", "urgency": null}}}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["attributes"]["description"], "Visit twice");
        assert_eq!(body["data"]["attributes"]["urgency"], Value::Null);

        let (status, _) = app
            .delete(&format!("/checklists/{first_id}/items/{item_id}"))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app
            .get(&format!("/checklists/{first_id}/items/{item_id}"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn complete_and_incomplete_drive_checklist_completion() {
        let app = TestApp::new().await;
        let checklist = create_checklist(&app, &["Call", "Email"]).await;
        let id = checklist["id"].as_i64().unwrap();
        let ids = item_ids(&checklist);

        let (status, body) = app
            .post(
                "/checklists/complete",
                json!({"data": [{"item_id": ids[0]}, {"item_id": ids[1]}, {"item_id": 999}]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let entries = body["data"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["item_id"], ids[0]);
        assert_eq!(entries[0]["is_completed"], true);
        assert_eq!(entries[0]["status"], 200);
        assert_eq!(entries[2]["status"], 404);
        assert_eq!(entries[2]["action"], "complete");

        let (_, body) = app.get(&format!("/checklists/{id}")).await;
        assert_eq!(body["data"]["attributes"]["is_completed"], true);
        assert!(body["data"]["attributes"]["completed_at"].is_string());

        let (status, body) = app
            .post("/checklists/incomplete", json!({"data": [{"item_id": ids[1]}]}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["is_completed"], false);
        assert_eq!(body["data"][0]["action"], "incomplete");

        let (_, body) = app.get(&format!("/checklists/{id}?include=items")).await;
        assert_eq!(body["data"]["attributes"]["is_completed"], false);
        assert_eq!(body["data"]["attributes"]["completed_at"], Value::Null);
        assert_eq!(
            body["data"]["attributes"]["items"][1]["completed_at"],
            Value::Null
        );

        let (status, _) = app.post("/checklists/complete", json!({"data": []})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn completing_a_subset_leaves_siblings_open() {
        let app = TestApp::new().await;
        let checklist = create_checklist(&app, &["Call", "Email", "Visit"]).await;
        let id = checklist["id"].as_i64().unwrap();
        let ids = item_ids(&checklist);

        let (status, body) = app
            .post(
                "/checklists/complete",
                json!({"data": [{"item_id": ids[0]}, {"item_id": ids[1]}]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (_, body) = app
            .get(&format!("/checklists/{id}/items/{}", ids[2]))
            .await;
        assert_eq!(body["data"]["attributes"]["is_completed"], false);
        assert_eq!(body["data"]["attributes"]["completed_at"], Value::Null);

        let (_, body) = app.get(&format!("/checklists/{id}")).await;
        assert_eq!(body["data"]["attributes"]["is_completed"], false);
        assert_eq!(body["data"]["attributes"]["completed_at"], Value::Null);
    }

    #[tokio::test]
    async fn bulk_update_reports_each_entry() {
        let app = TestApp::new().await;
        let first = create_checklist(&app, &["Call"]).await;
        let second = create_checklist(&app, &["Email"]).await;
        let first_id = first["id"].as_i64().unwrap();
        let own_item = item_ids(&first)[0];
        let foreign_item = item_ids(&second)[0];

        let entry = |id: i64| {
            json!({"id": id, "action": "update", "attributes": {"description": "Bulk"}})
        };
        let (status, body) = app
            .post(
                &format!("/checklists/{first_id}/items/_bulk"),
                json!({"data": [entry(own_item), entry(foreign_item), entry(999)]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let statuses: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["status"].as_u64().unwrap())
            .collect();
        assert_eq!(statuses, vec![200, 403, 404]);

        let (_, body) = app
            .get(&format!("/checklists/{first_id}/items/{own_item}"))
            .await;
        assert_eq!(body["data"]["attributes"]["description"], "Bulk");

        let second_id = second["id"].as_i64().unwrap();
        let (_, body) = app
            .get(&format!("/checklists/{second_id}/items/{foreign_item}"))
            .await;
        assert_eq!(body["data"]["attributes"]["description"], "Email");

        let (status, body) = app
            .post(
                &format!("/checklists/{first_id}/items/_bulk"),
                json!({"data": [{"id": own_item, "action": "delete", "attributes": {}}]}),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"].get("data.0.action").is_some(), "{body}");
    }

    #[tokio::test]
    async fn template_lifecycle_and_assigns() {
        let app = TestApp::new().await;
        let template = json!({
            "data": {
                "attributes": {
                    "name": "Onboarding",
                    "checklist": {"description": "Welcome", "due_interval": 3, "due_unit": "day"},
                    "items": [
                        {"description": "Call", "due_interval": 1, "due_unit": "hour", "urgency": 2},
                        {"description": "Email"},
                    ],
                }
            }
        });
        let (status, body) = app.post("/checklists/templates", template).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let template_id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["type"], "templates");
        assert_eq!(body["data"]["checklist"]["due_unit"], "day");
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

        let (status, body) = app
            .post(
                "/checklists/templates",
                json!({"data": {"attributes": {
                    "name": "Broken",
                    "checklist": {"description": "x", "due_interval": 3},
                    "items": [{"description": "y", "due_unit": "fortnight"}],
                }}}),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"].get("data.attributes.checklist.due_unit").is_some(), "{body}");
        assert!(body["errors"].get("data.attributes.items.0.due_unit").is_some(), "{body}");

        let (status, body) = app
            .post(
                &format!("/checklists/templates/{template_id}/assigns"),
                json!({"data": [
                    {"attributes": {"object_domain": "deals", "object_id": 1}},
                    {"attributes": {"object_domain": "deals", "object_id": 2}},
                ]}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["meta"]["count"], 2);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data[0]["attributes"]["object_id"], "1");
        assert_eq!(data[1]["attributes"]["object_id"], "2");
        assert_eq!(data[0]["attributes"]["description"], "Welcome");
        assert!(data[0]["attributes"]["due"].is_string());
        assert_eq!(body["includes"].as_array().unwrap().len(), 4);
        assert_eq!(body["includes"][0]["urgency"], 2);
        assert_eq!(body["includes"][1]["due"], Value::Null);

        let (_, body) = app.get("/checklists").await;
        assert_eq!(body["meta"]["total"], 2);

        let (status, _) = app
            .post("/checklists/templates/999/assigns", json!({"data": []}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .patch(
                &format!("/checklists/templates/{template_id}"),
                json!({"data": {"attributes": {
                    "name": "Offboarding",
                    "checklist": {"description": "Goodbye"},
                    "items": [{"description": "Return laptop"}],
                }}}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Offboarding");
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

        let (status, body) = app.get("/checklists/templates").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);

        let (status, _) = app
            .delete(&format!("/checklists/templates/{template_id}"))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app
            .get(&format!("/checklists/templates/{template_id}"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.get("/checklists?include=items").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 2);
        for checklist in body["data"].as_array().unwrap() {
            assert_eq!(checklist["attributes"]["description"], "Welcome");
            let items = checklist["attributes"]["items"].as_array().unwrap();
            let descriptions: Vec<_> = items
                .iter()
                .map(|item| item["description"].as_str().unwrap())
                .collect();
            assert_eq!(descriptions, ["Call", "Email"]);
        }
    }

    #[tokio::test]
    async fn item_summaries_bucket_incomplete_items() {
        let app = TestApp::new().await;
        let day = (Utc::now() + Duration::days(3)).date_naive();
        let due = day.and_hms_opt(12, 0, 0).unwrap().and_utc();
        let body = json!({
            "data": {
                "attributes": {
                    "object_domain": "contact",
                    "object_id": "1",
                    "description": "Onboarding",
                    "items": ["Undated"],
                }
            }
        });
        let (_, body) = app.post("/checklists", body).await;
        let id = body["data"]["id"].as_i64().unwrap();
        let (status, _) = app
            .post(
                &format!("/checklists/{id}/items"),
                json!({"data": {"attributes": {
                    "description": "Dated",
                    "due": due.to_rfc3339_opts(SecondsFormat::Secs, true),
                }}}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let date = day.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let uri = format!(
            "/checklists/items/summaries?date={}",
            date.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let (status, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let summary = &body["data"];
        assert_eq!(summary["today"], 1);
        assert_eq!(summary["past_due"], 0);
        assert_eq!(summary["this_week"], 1);
        assert_eq!(summary["this_month"], 1);
        assert_eq!(summary["total"], 2);

        let (_, body) = app
            .get(&format!("{uri}&object_domain=deals"))
            .await;
        assert_eq!(body["data"]["total"], 0);

        let (status, _) = app.get("/checklists/items/summaries?date=yesterday").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
