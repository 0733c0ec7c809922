//! HTTP integration tests for the `/mcp` endpoints.
//!
//! Each test spawns a real server on a random port with a seeded in-memory
//! store bound to the owner context.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use gateway_service::store::OwnerStore;
use gateway_test_utils::fixtures::{self, at, ALICE, BOB, GHOST, OWNER};
use gateway_test_utils::TestGatewayServer;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;

fn availability_body(attendees: &[&str]) -> Value {
    json!({
        "request_id": "avail-1",
        "attendees": attendees,
        "start_date_utc": at(0, 0, 0),
        "end_date_utc": at(1, 0, 0),
        "meeting_duration_minutes": 60
    })
}

fn slot_starting(body: &Value, start: &str) -> Option<Value> {
    body["suggested_slots"]
        .as_array()
        .unwrap()
        .iter()
        .find(|slot| slot["start_time_utc"] == start)
        .cloned()
}

// ============================================================================
// Availability
// ============================================================================

#[tokio::test]
async fn test_availability_suggests_working_hour_slots() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json("/mcp/getAvailability", &availability_body(&[OWNER, ALICE, BOB]))
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["request_id"], "avail-1");
    assert_eq!(body["provider_id"], "OwnerGateway/test");
    assert_eq!(body["free_busy_interval_minutes"], 30);
    assert!(body["errors"].as_array().unwrap().is_empty());

    // 09:00-16:00 starts, minus the owner's standup (2) and Bob's offsite (3).
    let slots = body["suggested_slots"].as_array().unwrap();
    assert_eq!(slots.len(), 10);
    assert_eq!(slots[0]["start_time_utc"], "2025-03-03T10:00:00Z");
    assert_eq!(slots[9]["start_time_utc"], "2025-03-03T16:00:00Z");

    // Tentative counts toward the quorum but not toward "all free".
    let tentative = slot_starting(&body, "2025-03-03T10:00:00Z").unwrap();
    assert_eq!(tentative["attendee_availability"][ALICE], "Tentative");
    assert_eq!(tentative["all_required_attendees_free"], false);
    assert_eq!(tentative["percentage_free"], 100.0);

    let clear = slot_starting(&body, "2025-03-03T11:00:00Z").unwrap();
    assert_eq!(clear["end_time_utc"], "2025-03-03T12:00:00Z");
    assert_eq!(clear["all_required_attendees_free"], true);

    assert!(slot_starting(&body, "2025-03-03T13:00:00Z").is_none());

    let owner_codes = body["attendee_free_busy_details"][OWNER].as_str().unwrap();
    assert_eq!(owner_codes.len(), 48);
    assert_eq!(&owner_codes[16..22], "002200");

    Ok(())
}

#[tokio::test]
async fn test_availability_reports_unresolved_attendee() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let mut request = availability_body(&[ALICE, GHOST]);
    request["minimum_percentage_of_attendees_free"] = json!(50);
    let (status, body) = server.post_json("/mcp/getAvailability", &request).await?;

    assert_eq!(status, 200);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "ResolutionFailed");
    assert_eq!(errors[0]["message"], format!("Could not resolve: {GHOST}"));

    assert!(body["attendee_free_busy_details"].get(GHOST).is_none());
    assert!(body["attendee_free_busy_details"].get(ALICE).is_some());

    let slots = body["suggested_slots"].as_array().unwrap();
    assert!(!slots.is_empty());
    for slot in slots {
        assert_eq!(slot["attendee_availability"][GHOST], "Unknown");
        assert_eq!(slot["percentage_free"], 50.0);
        assert_eq!(slot["all_required_attendees_free"], false);
    }

    Ok(())
}

#[tokio::test]
async fn test_availability_with_only_unresolved_attendees_is_empty() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json("/mcp/getAvailability", &availability_body(&[GHOST]))
        .await?;

    assert_eq!(status, 200);
    assert!(body["suggested_slots"].as_array().unwrap().is_empty());
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_availability_rejects_invalid_parameters() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json("/mcp/getAvailability", &availability_body(&[]))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let mut zero_duration = availability_body(&[ALICE]);
    zero_duration["meeting_duration_minutes"] = json!(0);
    let (status, _) = server
        .post_json("/mcp/getAvailability", &zero_duration)
        .await?;
    assert_eq!(status, 400);

    let mut inverted = availability_body(&[ALICE]);
    inverted["end_date_utc"] = json!(at(-1, 0, 0));
    let (status, _) = server.post_json("/mcp/getAvailability", &inverted).await?;
    assert_eq!(status, 400);

    Ok(())
}

#[tokio::test]
async fn test_availability_rejects_range_beyond_limit() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let mut unbounded = availability_body(&[GHOST]);
    unbounded["start_date_utc"] = json!("0001-01-01T00:00:00Z");
    unbounded["end_date_utc"] = json!("9999-12-31T00:00:00Z");
    unbounded["minimum_percentage_of_attendees_free"] = json!(0);
    let (status, body) = server.post_json("/mcp/getAvailability", &unbounded).await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // The default limit still admits a two-month query.
    let mut two_months = availability_body(&[OWNER, ALICE]);
    two_months["end_date_utc"] = json!(at(62, 0, 0));
    let (status, _) = server.post_json("/mcp/getAvailability", &two_months).await?;
    assert_eq!(status, 200);

    Ok(())
}

#[tokio::test]
async fn test_availability_range_limit_is_configurable() -> Result<()> {
    let server = TestGatewayServer::spawn_with(
        Some(fixtures::seeded_store()),
        HashMap::from([(
            "GATEWAY_MAX_AVAILABILITY_DAYS".to_string(),
            "1".to_string(),
        )]),
    )
    .await?;

    let (status, _) = server
        .post_json("/mcp/getAvailability", &availability_body(&[ALICE]))
        .await?;
    assert_eq!(status, 200);

    let mut two_days = availability_body(&[ALICE]);
    two_days["end_date_utc"] = json!(at(2, 0, 0));
    let (status, _) = server.post_json("/mcp/getAvailability", &two_days).await?;
    assert_eq!(status, 400);

    Ok(())
}

#[tokio::test]
async fn test_availability_attendees_differing_in_case_count_once() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let mut request = availability_body(&[ALICE, " ALICE@Example.COM ", GHOST]);
    request["minimum_percentage_of_attendees_free"] = json!(50);
    let (status, body) = server.post_json("/mcp/getAvailability", &request).await?;

    assert_eq!(status, 200);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["attendee_free_busy_details"].as_object().unwrap().len(),
        1
    );

    let slots = body["suggested_slots"].as_array().unwrap();
    assert!(!slots.is_empty());
    for slot in slots {
        let availability = slot["attendee_availability"].as_object().unwrap();
        assert_eq!(availability.len(), 2);
        assert!(availability.contains_key(ALICE));
        assert_eq!(slot["percentage_free"], 50.0);
    }

    Ok(())
}

// ============================================================================
// Context
// ============================================================================

#[tokio::test]
async fn test_context_defaults_to_emails_and_calendar() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json(
            "/mcp/getContext",
            &json!({
                "request_id": "ctx-1",
                "query": "budget",
                "time_range_start": at(0, 0, 0),
                "time_range_end": at(7, 0, 0)
            }),
        )
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["request_id"], "ctx-1");
    let items = body["context_items"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let email = items.iter().find(|i| i["type"] == "email_document").unwrap();
    assert_eq!(email["id"], "mail-1");
    assert_eq!(email["subject"], "Quarterly budget");
    assert_eq!(email["source_detail"], format!("Mailbox/Inbox/{OWNER}"));

    let event = items.iter().find(|i| i["type"] == "calendar_event").unwrap();
    assert_eq!(event["id"], "evt-review");
    assert_eq!(event["location"], "Room 4");
    assert_eq!(event["source_detail"], format!("Mailbox/Calendar/{OWNER}"));

    assert!(items.iter().all(|i| i["type"] != "contact_profile"));
    assert!(body["summary"].as_str().unwrap().contains("2 item(s)"));

    Ok(())
}

#[tokio::test]
async fn test_context_filter_selects_contacts() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json(
            "/mcp/getContext",
            &json!({
                "query": "fabrikam",
                "context_types_filter": ["contact_profile"]
            }),
        )
        .await?;

    assert_eq!(status, 200);
    let items = body["context_items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "contact_profile");
    assert_eq!(items[0]["full_name"], "Bob Jones");
    assert_eq!(items[0]["email_addresses"][0], BOB);

    Ok(())
}

#[tokio::test]
async fn test_context_respects_max_items() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (_, body) = server
        .post_json(
            "/mcp/getContext",
            &json!({
                "context_types_filter": ["email_document"],
                "max_items_per_type": 1
            }),
        )
        .await?;

    let items = body["context_items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    // Newest first.
    assert_eq!(items[0]["id"], "mail-2");

    Ok(())
}

// ============================================================================
// Create meeting
// ============================================================================

#[tokio::test]
async fn test_create_meeting_partial_success_and_invites_resolved() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json(
            "/mcp/createMeeting",
            &json!({
                "request_id": "mtg-1",
                "meeting_details": {
                    "subject": "Planning",
                    "start_time_utc": at(1, 14, 0),
                    "end_time_utc": at(1, 15, 0),
                    "location": "Room 2",
                    "required_attendees": [ALICE, GHOST]
                },
                "send_invitations": true
            }),
        )
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["request_id"], "mtg-1");
    assert_eq!(body["status"], "partial_success");
    assert_eq!(body["message"], "Meeting invitation sent.");
    assert!(body["meeting_id"].as_str().is_some());
    assert_eq!(body["errors"][0]["code"], "UnresolvedRecipient");

    // The booking shows up in free/busy: organizer busy, invitee tentative.
    let (_, availability) = server
        .post_json(
            "/mcp/getAvailability",
            &json!({
                "attendees": [OWNER, ALICE],
                "start_date_utc": at(1, 14, 0),
                "end_date_utc": at(1, 15, 0),
                "meeting_duration_minutes": 60,
                "minimum_percentage_of_attendees_free": 0
            }),
        )
        .await?;
    let slot = &availability["suggested_slots"][0];
    assert_eq!(slot["attendee_availability"][OWNER], "Busy");
    assert_eq!(slot["attendee_availability"][ALICE], "Tentative");

    Ok(())
}

#[tokio::test]
async fn test_create_meeting_without_invitations_is_saved() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json(
            "/mcp/createMeeting",
            &json!({
                "meeting_details": {
                    "subject": "Focus time",
                    "start_time_utc": at(1, 9, 0),
                    "end_time_utc": at(1, 11, 0)
                },
                "send_invitations": false
            }),
        )
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Meeting saved to calendar.");
    assert!(body["errors"].as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_create_meeting_input_errors() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let (status, body) = server
        .post_json("/mcp/createMeeting", &json!({ "request_id": "mtg-2" }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["request_id"], "mtg-2");
    assert_eq!(body["status"], "failure");
    assert_eq!(body["errors"][0]["code"], "InputError");
    assert!(body["meeting_id"].is_null());

    let (status, body) = server
        .post_json(
            "/mcp/createMeeting",
            &json!({
                "meeting_details": {
                    "subject": "Backwards",
                    "start_time_utc": at(1, 15, 0),
                    "end_time_utc": at(1, 14, 0)
                }
            }),
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["status"], "failure");

    Ok(())
}

// ============================================================================
// Errors and lifecycle
// ============================================================================

#[tokio::test]
async fn test_unknown_path_and_wrong_method() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/mcp/doesNotExist", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let response = client
        .get(format!("{}/mcp/getAvailability", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 405);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");

    Ok(())
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let response = reqwest::Client::new()
        .post(format!("{}/mcp/getContext", server.url()))
        .header("content-type", "application/json")
        .body("{\"query\": ")
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    Ok(())
}

#[tokio::test]
async fn test_unbound_owner_returns_service_unavailable() -> Result<()> {
    let server = TestGatewayServer::spawn_unbound().await?;

    let (status, body) = server
        .post_json("/mcp/getAvailability", &availability_body(&[ALICE]))
        .await?;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    Ok(())
}

#[tokio::test]
async fn test_stopped_owner_returns_service_unavailable() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;
    server.dispatcher().unbind().await;

    let (status, _) = server
        .post_json("/mcp/getContext", &json!({}))
        .await?;
    assert_eq!(status, 503);

    let health: Value = reqwest::get(format!("{}/mcp/health", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(health["status"], "OK");
    assert_eq!(health["dispatcher_state"], "stopped");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_owner_returns_gateway_timeout() -> Result<()> {
    let overrides = HashMap::from([(
        "GATEWAY_DISPATCH_TIMEOUT_SECONDS".to_string(),
        "1".to_string(),
    )]);
    let server =
        TestGatewayServer::spawn_with(Some(fixtures::seeded_store()), overrides).await?;

    // Hold the owner until the request has timed out.
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let dispatcher = std::sync::Arc::clone(server.dispatcher());
    let blocker = tokio::spawn(async move {
        dispatcher
            .submit("hold", move |_: &mut OwnerStore| {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
                Ok::<_, Infallible>(())
            })
            .await
    });
    started_rx.await?;

    let (status, body) = server
        .post_json("/mcp/getAvailability", &availability_body(&[ALICE]))
        .await?;
    assert_eq!(status, 504);
    assert_eq!(body["error"]["code"], "TIMEOUT");

    release_tx.send(())?;
    blocker.await??;

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_served() -> Result<()> {
    let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}
