//! Invitation lifecycle: issue, validate, accept, resend.

mod common;
use common::*;

use rusqlite::params;

async fn invite(app: &Router, owner: &TestUser, email: &str, role: &str) -> (StatusCode, Value) {
    post(app, "/team/invites", Some(&owner.token), json!({ "email": email, "role": role })).await
}

fn expire_invite(state: &AppState, member_id: &str) {
    let conn = state.db.get().unwrap();
    conn.execute(
        "UPDATE team_members SET invite_expires_at = ?1 WHERE id = ?2",
        params![now() - 60, member_id],
    )
    .unwrap();
}

#[tokio::test]
async fn test_issue_then_validate_invite() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (status, body) = invite(&app, &owner, "a@b.com", "Member").await;
    assert_eq!(status, StatusCode::OK, "invite failed: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["member"]["status"], "pending");
    assert_eq!(body["member"]["organization_id"], owner.id());
    assert!(body["member"]["invite_expires_at"].as_i64().unwrap() > now());
    assert!(body["member"].get("invite_token_hash").is_none(), "token hash must not leak");
    assert!(body["warning"].is_string(), "unconfigured email should surface a warning");

    let token = body["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());
    assert!(body["invite_url"].as_str().unwrap().contains(&token));

    let (status, body) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["data"]["email"], "a@b.com");
    assert_eq!(body["data"]["role"], "Member");
    assert_eq!(body["data"]["organization_id"], owner.id());

    // Validation does not consume the token
    let (_, body) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn test_invite_email_is_normalized() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (status, body) = invite(&app, &owner, "  New.Person@Example.COM ", "Viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member"]["email"], "new.person@example.com");
}

#[tokio::test]
async fn test_expired_invite_is_never_valid() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (_, body) = invite(&app, &owner, "late@example.com", "Member").await;
    let token = body["token"].as_str().unwrap().to_string();
    expire_invite(&state, body["member"]["id"].as_str().unwrap());

    let (status, body) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK, "expected failures are 200 responses");
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "expired");
    assert!(body["error"].as_str().unwrap().contains("expired"));

    let (status, body) = post(
        &app,
        "/invites/accept",
        None,
        json!({ "token": token, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "expired");
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let state = create_test_app_state();
    let app = test_app(&state);

    for token in ["", "not a token!", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"] {
        let (status, body) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false, "token {:?} should be invalid", token);
        assert_eq!(body["reason"], "not_found");
    }
}

#[tokio::test]
async fn test_accept_provisions_account_and_is_idempotent() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (_, body) = invite(&app, &owner, "newbie@example.com", "Member").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app,
        "/invites/accept",
        None,
        json!({ "token": token, "password": TEST_PASSWORD, "full_name": "New Bie" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["member"]["status"], "active");
    assert!(body.get("already_accepted").is_none());
    let activated_at = body["member"]["activated_at"].as_i64().unwrap();
    let session = body["session_token"].as_str().unwrap().to_string();

    // The provisioned account is confirmed and can use its session
    let (status, me) = get(&app, "/auth/me", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "newbie@example.com");
    assert_eq!(me["full_name"], "New Bie");
    assert_eq!(me["email_confirmed"], true);

    // Replaying the token succeeds without touching the row
    let (status, replay) = post(&app, "/invites/accept", None, json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["success"], true);
    assert_eq!(replay["already_accepted"], true);
    assert_eq!(replay["member"]["activated_at"].as_i64().unwrap(), activated_at);

    let (_, validated) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
    assert_eq!(validated["valid"], false);
    assert_eq!(validated["reason"], "already_accepted");
}

#[tokio::test]
async fn test_accept_links_existing_account() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");
    let existing = create_test_client(&state, "existing@example.com");

    let (_, body) = invite(&app, &owner, "existing@example.com", "Admin").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app,
        "/invites/accept",
        Some(&existing.token),
        json!({ "token": token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["member"]["user_id"], existing.id());
    assert!(body.get("session_token").is_none());

    // The owner hears about it
    let (_, notifications) = get(&app, "/notifications", Some(&owner.token)).await;
    let titles: Vec<&str> = notifications
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["title"].as_str())
        .collect();
    assert!(titles.contains(&"Invitation accepted"));
}

#[tokio::test]
async fn test_accept_requires_password_for_new_account() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (_, body) = invite(&app, &owner, "nopass@example.com", "Member").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = post(&app, "/invites/accept", None, json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    // Still pending afterwards
    let (_, validated) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
    assert_eq!(validated["valid"], true);
}

#[tokio::test]
async fn test_accept_rejects_signed_in_user_with_other_email() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");
    let other = create_test_client(&state, "other@example.com");

    let (_, body) = invite(&app, &owner, "invited@example.com", "Member").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app,
        "/invites/accept",
        Some(&other.token),
        json!({ "token": token, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_duplicate_pending_invite_conflicts() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (status, _) = invite(&app, &owner, "twice@example.com", "Member").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = invite(&app, &owner, "TWICE@example.com", "Viewer").await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
}

#[tokio::test]
async fn test_reinvite_allowed_after_expiry() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (_, body) = invite(&app, &owner, "again@example.com", "Member").await;
    expire_invite(&state, body["member"]["id"].as_str().unwrap());

    let (status, _) = invite(&app, &owner, "again@example.com", "Member").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cannot_invite_self() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (status, _) = invite(&app, &owner, "Owner@Example.com", "Admin").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invite_for_foreign_organization_is_forbidden_regardless_of_payload() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");
    let intruder = create_test_client(&state, "intruder@example.com");

    let payloads = [
        json!({ "organization_id": owner.id(), "email": "x@example.com", "role": "Member" }),
        json!({ "organization_id": owner.id(), "email": "not-an-email", "role": "Nope" }),
        json!({ "organization_id": owner.id() }),
        json!({ "organization_id": 5, "email": "x@example.com", "role": "Member" }),
        json!({ "organization_id": [owner.id()], "email": "x@example.com", "role": "Member" }),
    ];
    for payload in payloads {
        let (status, _) = post(&app, "/team/invites", Some(&intruder.token), payload.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "payload {} should be refused", payload);
    }
}

#[tokio::test]
async fn test_invite_requires_session() {
    let state = create_test_app_state();
    let app = test_app(&state);

    let (status, _) = post(
        &app,
        "/team/invites",
        None,
        json!({ "email": "a@b.com", "role": "Member" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(
        &app,
        "/team/invites",
        Some("not-a-session"),
        json!({ "email": "a@b.com", "role": "Member" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resend_rotates_token() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (_, body) = invite(&app, &owner, "resend@example.com", "Member").await;
    let old_token = body["token"].as_str().unwrap().to_string();
    let member_id = body["member"]["id"].as_str().unwrap().to_string();
    expire_invite(&state, &member_id);

    let (status, body) = post(
        &app,
        &format!("/team/members/{}/resend", member_id),
        Some(&owner.token),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let new_token = body["token"].as_str().unwrap().to_string();
    assert_ne!(old_token, new_token);

    let (_, old) = post(&app, "/invites/validate", None, json!({ "token": old_token })).await;
    assert_eq!(old["valid"], false);
    let (_, new) = post(&app, "/invites/validate", None, json!({ "token": new_token })).await;
    assert_eq!(new["valid"], true);
}

#[tokio::test]
async fn test_existing_account_must_be_signed_in_to_accept() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");
    let admin = create_test_admin(&state, "admin@example.com");

    let (_, body) = invite(&app, &owner, "admin@example.com", "Member").await;
    let token = body["token"].as_str().unwrap().to_string();

    // Holding the token is not enough to link someone else's account
    let (status, body) = post(
        &app,
        "/invites/accept",
        None,
        json!({ "token": token, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("sign in"));

    let (status, body) = post(&app, "/invites/accept", Some(&owner.token), json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (_, validated) = post(&app, "/invites/validate", None, json!({ "token": token })).await;
    assert_eq!(validated["valid"], true, "invite must stay pending");

    let (_, body) = post(&app, "/invites/accept", Some(&admin.token), json!({ "token": token })).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["member"]["user_id"], admin.id());
}

#[tokio::test]
async fn test_removing_member_never_deletes_admin_account() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");
    let admin = create_test_admin(&state, "admin@example.com");

    let (_, body) = invite(&app, &owner, "admin@example.com", "Member").await;
    let token = body["token"].as_str().unwrap().to_string();
    let (_, body) = post(&app, "/invites/accept", Some(&admin.token), json!({ "token": token })).await;
    let member_id = body["member"]["id"].as_str().unwrap().to_string();

    let (status, _) = delete(&app, &format!("/team/members/{}", member_id), Some(&owner.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let conn = state.db.get().unwrap();
    assert!(queries::get_user_by_id(&conn, admin.id()).unwrap().is_some());
    assert_eq!(queries::count_admins(&conn).unwrap(), 1);
    assert!(queries::get_team_member(&conn, &member_id).unwrap().is_some(), "removal rolled back");
}

#[tokio::test]
async fn test_concurrent_duplicate_invites_create_one_row() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");

    let (first, second) = tokio::join!(
        invite(&app, &owner, "race@example.com", "Member"),
        invite(&app, &owner, "race@example.com", "Viewer"),
    );
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let (_, members) = get(&app, "/team/members", Some(&owner.token)).await;
    assert_eq!(members.as_array().unwrap().len(), 1);
}
