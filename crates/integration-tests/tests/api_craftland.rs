//! Craftland routes exercised end to end through the axum router.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use domains::voting::EngineRules;
use domains::Role;
use integration_tests::http::{request, send};
use integration_tests::{rules_without_cooldown, Harness, PNG};
use serde_json::json;

#[tokio::test]
async fn health_needs_no_token() {
    let h = Harness::new(EngineRules::default());
    let reply = send(&h.router(), request(Method::GET, "/health", None, None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({ "status": "ok" }));
    assert!(reply.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let h = Harness::new(EngineRules::default());
    let app = h.router();

    let reply = send(&app, request(Method::GET, "/craftland-codes", None, None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);

    let reply = send(
        &app,
        request(Method::GET, "/craftland-codes", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_returns_camel_case_code() {
    let h = Harness::new(EngineRules::default());
    let owner = h.user("maker", Role::User, 0).await;
    let token = h.token(&owner);

    let reply = send(
        &h.router(),
        request(
            Method::POST,
            "/craftland-codes",
            Some(&token),
            Some(json!({ "code": "FFCL-API1", "title": "Sky Run", "region": "IND" })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["code"], "FFCL-API1");
    assert_eq!(reply.body["netVotes"], 0);
    assert_eq!(reply.body["isVerified"], false);
    assert_eq!(reply.body["status"], "pending");
    assert_eq!(reply.body["likedByMe"], false);
    assert!(reply.body.get("reports").is_none());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let h = Harness::new(EngineRules::default());
    let owner = h.user("maker", Role::User, 0).await;
    let token = h.token(&owner);

    let reply = send(
        &h.router(),
        request(
            Method::POST,
            "/craftland-codes",
            Some(&token),
            Some(json!({ "title": "no code" })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn second_vote_within_cooldown_sets_retry_after() {
    let h = Harness::new(EngineRules::default());
    let owner = h.user("maker", Role::User, 0).await;
    let code = h.submit(&owner, "FFCL-API2").await;
    let app = h.router();
    let uri = format!("/craftland-codes/{}/vote", code.id);

    let first = h.token(&h.voter());
    let reply = send(
        &app,
        request(Method::POST, &uri, Some(&first), Some(json!({ "direction": "up" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["netVotes"], 1);
    assert_eq!(reply.body["isNowVerified"], false);

    let second = h.token(&h.voter());
    let reply = send(
        &app,
        request(Method::POST, &uri, Some(&second), Some(json!({ "direction": "up" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = reply.headers[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=300).contains(&retry));

    let metrics = send(&app, request(Method::GET, "/metrics", None, None)).await;
    let text = metrics.body.as_str().unwrap().to_owned();
    assert!(text.contains("fanhub_votes_total"));
}

#[tokio::test]
async fn moderation_is_admin_only() {
    let h = Harness::new(EngineRules::default());
    let owner = h.user("maker", Role::User, 0).await;
    let admin = h.user("admin", Role::Admin, 0).await;
    let code = h.submit(&owner, "FFCL-API3").await;
    let app = h.router();
    let uri = format!("/admin/craftland-codes/{}", code.id);

    let reply = send(
        &app,
        request(
            Method::PATCH,
            &uri,
            Some(&h.token(&owner)),
            Some(json!({ "isVerified": true })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(
        &app,
        request(
            Method::PATCH,
            &uri,
            Some(&h.token(&admin)),
            Some(json!({ "isVerified": true })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["isVerified"], true);
    assert_eq!(reply.body["status"], "approved");
}

#[tokio::test]
async fn reports_are_visible_to_admins_only() {
    let h = Harness::new(rules_without_cooldown());
    let owner = h.user("maker", Role::User, 0).await;
    let admin = h.user("admin", Role::Admin, 0).await;
    let code = h.submit(&owner, "FFCL-API4").await;
    let app = h.router();
    let reporter = h.token(&h.voter());

    let reply = send(
        &app,
        request(
            Method::POST,
            &format!("/craftland-codes/{}/report", code.id),
            Some(&reporter),
            Some(json!({ "reason": "wrong code", "category": "broken" })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body, json!({ "reportCount": 1, "isFraudulent": false }));

    let again = send(
        &app,
        request(
            Method::POST,
            &format!("/craftland-codes/{}/report", code.id),
            Some(&reporter),
            Some(json!({ "reason": "wrong code", "category": "broken" })),
        ),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let uri = format!("/craftland-codes/{}", code.id);
    let as_owner = send(&app, request(Method::GET, &uri, Some(&h.token(&owner)), None)).await;
    assert_eq!(as_owner.body["reportCount"], 1);
    assert!(as_owner.body.get("reports").is_none());

    let as_admin = send(&app, request(Method::GET, &uri, Some(&h.token(&admin)), None)).await;
    let reports = as_admin.body["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["status"], "pending");

    let report_id = reports[0]["id"].as_str().unwrap();
    let resolved = send(
        &app,
        request(
            Method::PATCH,
            &format!("/admin/craftland-codes/{}/reports/{report_id}", code.id),
            Some(&h.token(&admin)),
            Some(json!({ "status": "resolved" })),
        ),
    )
    .await;
    assert_eq!(resolved.status, StatusCode::OK);
    assert_eq!(resolved.body["reportCount"], 0);
}

#[tokio::test]
async fn rejected_owner_finds_notice_in_inbox() {
    let h = Harness::new(rules_without_cooldown());
    let owner = h.user("maker", Role::User, 0).await;
    let code = h.submit(&owner, "FFCL-API5").await;
    let app = h.router();

    for _ in 0..5 {
        let reply = send(
            &app,
            request(
                Method::POST,
                &format!("/craftland-codes/{}/report", code.id),
                Some(&h.token(&h.voter())),
                Some(json!({ "reason": "scam", "category": "fraud" })),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let inbox = send(
        &app,
        request(Method::GET, "/profile/notifications", Some(&h.token(&owner)), None),
    )
    .await;
    assert_eq!(inbox.status, StatusCode::OK);
    let entries = inbox.body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "code_rejected");
    assert_eq!(entries[0]["read"], false);
}

#[tokio::test]
async fn like_toggles_and_list_filters_by_status() {
    let h = Harness::new(EngineRules::default());
    let owner = h.user("maker", Role::User, 0).await;
    let admin = h.user("admin", Role::Admin, 0).await;
    let code = h.submit(&owner, "FFCL-API6").await;
    h.submit(&owner, "FFCL-API7").await;
    let app = h.router();
    let fan = h.token(&h.voter());

    let reply = send(
        &app,
        request(
            Method::POST,
            &format!("/craftland-codes/{}/like", code.id),
            Some(&fan),
            None,
        ),
    )
    .await;
    assert_eq!(reply.body, json!({ "liked": true, "likeCount": 1 }));

    let reply = send(
        &app,
        request(
            Method::PATCH,
            &format!("/admin/craftland-codes/{}", code.id),
            Some(&h.token(&admin)),
            Some(json!({ "isVerified": true })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let approved = send(
        &app,
        request(Method::GET, "/craftland-codes?status=approved", Some(&fan), None),
    )
    .await;
    assert_eq!(approved.body["total"], 1);
    assert_eq!(approved.body["items"][0]["likedByMe"], true);

    let all = send(&app, request(Method::GET, "/craftland-codes?limit=1", Some(&fan), None)).await;
    assert_eq!(all.body["total"], 2);
    assert_eq!(all.body["items"].as_array().unwrap().len(), 1);

    let past_end = send(
        &app,
        request(
            Method::GET,
            "/craftland-codes?offset=18446744073709551615",
            Some(&fan),
            None,
        ),
    )
    .await;
    assert_eq!(past_end.status, StatusCode::OK);
    assert_eq!(past_end.body["total"], 2);
    assert_eq!(past_end.body["items"], json!([]));
}

#[tokio::test]
async fn cover_upload_checks_type_and_owner() {
    let h = Harness::new(EngineRules::default());
    let owner = h.user("maker", Role::User, 0).await;
    let code = h.submit(&owner, "FFCL-API8").await;
    let app = h.router();
    let uri = format!("/craftland-codes/{}/cover", code.id);

    let upload = |token: String, content_type: &str, data: &'static [u8]| {
        Request::builder()
            .method(Method::PUT)
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(data))
            .unwrap()
    };

    let reply = send(&app, upload(h.token(&owner), "text/plain", b"hello")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, upload(h.token(&h.voter()), "image/png", PNG)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(&app, upload(h.token(&owner), "image/png", PNG)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let blob_id = reply.body["coverImageId"].as_str().unwrap();
    assert!(h.blobs.contains(blob_id));

    let deleted = send(
        &app,
        request(
            Method::DELETE,
            &format!("/craftland-codes/{}", code.id),
            Some(&h.token(&owner)),
            None,
        ),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(h.blobs.is_empty());
}
