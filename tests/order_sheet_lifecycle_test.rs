//! End-to-end tests for the order-sheet lifecycle:
//! issue → submit → (revision → resubmit)* → confirm, plus the guards
//! around every transition.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{active_actor, box_item, kg_item, pending_actor, TestApp};
use meatflow_api::errors::ServiceError;
use meatflow_api::events::Event;
use meatflow_api::models::{ActorRole, OrderSheetStatus};
use meatflow_api::services::order_sheets::{
    ConfirmOrderSheetRequest, SubmitOrderSheetRequest,
};
use meatflow_api::store::{Collection, EntityStore, Filter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn submit_request(items: Vec<meatflow_api::models::LineItemInput>) -> SubmitOrderSheetRequest {
    SubmitOrderSheetRequest {
        items,
        customer_comment: None,
    }
}

fn confirm_request(discount: Decimal) -> ConfirmOrderSheetRequest {
    ConfirmOrderSheetRequest {
        discount_amount: discount,
        change_reason: None,
    }
}

// ==================== Issue ====================

#[tokio::test]
async fn issue_moves_draft_to_sent() {
    let app = TestApp::new();
    let sheet = app.draft_sheet(vec![]).await;
    assert_eq!(sheet.status, OrderSheetStatus::Draft);

    let issued = app
        .services
        .order_sheets
        .issue_order_sheet(sheet.id)
        .await
        .unwrap();
    assert_eq!(issued.status, OrderSheetStatus::Sent);
}

#[tokio::test]
async fn issuing_twice_is_rejected() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let err = app
        .services
        .order_sheets
        .issue_order_sheet(sheet.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });
}

// ==================== Submit ====================

#[tokio::test]
async fn submit_from_sent_computes_totals() {
    // Scenario A: one 50 kg line at 1000/kg.
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let submitted = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(vec![kg_item("pork belly", dec!(50), dec!(1000))]),
        )
        .await
        .unwrap();

    assert_eq!(submitted.status, OrderSheetStatus::Submitted);
    assert_eq!(submitted.total_kg, dec!(50));
    assert_eq!(submitted.total_amount, dec!(50000));
    assert_eq!(submitted.submitted_items.len(), 1);
}

#[tokio::test]
async fn box_lines_convert_through_the_weight_factor() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let submitted = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(vec![box_item("ribs", dec!(3), dec!(20), dec!(5000))]),
        )
        .await
        .unwrap();

    assert_eq!(submitted.items[0].estimated_kg, dec!(60));
    assert_eq!(submitted.items[0].amount, dec!(300000));
    assert_eq!(submitted.total_amount, dec!(300000));
}

#[tokio::test]
async fn submit_requires_a_positive_weight() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let err = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(vec![kg_item("pork belly", dec!(0), dec!(1000))]),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(vec![]),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn submit_from_draft_is_rejected_and_leaves_state_untouched() {
    let app = TestApp::new();
    let sheet = app.draft_sheet(vec![]).await;

    let err = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(vec![kg_item("pork belly", dec!(50), dec!(1000))]),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });

    let unchanged = app
        .services
        .order_sheets
        .get_order_sheet(sheet.id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, OrderSheetStatus::Draft);
    assert!(unchanged.items.is_empty());
}

// ==================== Activation gate ====================

#[tokio::test]
async fn guest_sheets_bypass_activation() {
    let app = TestApp::new();
    let sheet = app.guest_sheet(vec![]).await;

    // Pending actor and anonymous access both pass on a guest sheet.
    let submitted = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&pending_actor()),
            submit_request(vec![kg_item("pork belly", dec!(10), dec!(1000))]),
        )
        .await
        .unwrap();
    assert_eq!(submitted.status, OrderSheetStatus::Submitted);
}

#[tokio::test]
async fn guest_sheet_accepts_anonymous_submission() {
    let app = TestApp::new();
    let sheet = app.guest_sheet(vec![]).await;

    let submitted = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            None,
            submit_request(vec![kg_item("pork belly", dec!(10), dec!(1000))]),
        )
        .await
        .unwrap();
    assert_eq!(submitted.status, OrderSheetStatus::Submitted);
}

#[tokio::test]
async fn pending_actor_is_blocked_on_member_sheets() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let err = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&pending_actor()),
            submit_request(vec![kg_item("pork belly", dec!(10), dec!(1000))]),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::ActivationRequired { invite_token: Some(_) }
    );
}

// ==================== Revision loop ====================

#[tokio::test]
async fn revision_loop_preserves_the_admin_comment() {
    // Scenario C: revision comment survives the resubmission.
    let app = TestApp::new();
    let items = vec![kg_item("pork belly", dec!(50), dec!(1000))];
    let sheet = app.submitted_sheet(items.clone()).await;

    let revised = app
        .services
        .order_sheets
        .request_revision(sheet.id, "fix qty")
        .await
        .unwrap();
    assert_eq!(revised.status, OrderSheetStatus::Revision);
    assert_eq!(revised.admin_comment.as_deref(), Some("fix qty"));

    let resubmitted = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(items),
        )
        .await
        .unwrap();
    assert_eq!(resubmitted.status, OrderSheetStatus::Submitted);
    assert_eq!(resubmitted.admin_comment.as_deref(), Some("fix qty"));
}

#[tokio::test]
async fn revision_requires_a_comment() {
    let app = TestApp::new();
    let sheet = app
        .submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;

    for comment in ["", "   "] {
        let err = app
            .services
            .order_sheets
            .request_revision(sheet.id, comment)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}

#[tokio::test]
async fn revision_is_only_reachable_from_submitted() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let err = app
        .services
        .order_sheets
        .request_revision(sheet.id, "fix qty")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });
}

// ==================== Confirm ====================

#[tokio::test]
async fn confirm_applies_the_discount() {
    // Scenario B: 50000 gross, 5000 discount.
    let app = TestApp::new();
    let sheet = app
        .submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;

    let confirmation = app
        .services
        .order_sheets
        .confirm_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Admin)),
            confirm_request(dec!(5000)),
        )
        .await
        .unwrap();

    assert_eq!(confirmation.sheet.status, OrderSheetStatus::Confirmed);
    assert_eq!(confirmation.sheet.total_amount, dec!(45000));
    assert_eq!(confirmation.sales_order.total_amount, dec!(45000));
    assert_eq!(confirmation.sales_order.source_order_sheet_id, sheet.id);
}

#[tokio::test]
async fn confirm_is_rejected_outside_submitted() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))]).await;

    let err = app
        .services
        .order_sheets
        .confirm_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Admin)),
            confirm_request(Decimal::ZERO),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });

    let unchanged = app
        .services
        .order_sheets
        .get_order_sheet(sheet.id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, OrderSheetStatus::Sent);
}

#[tokio::test]
async fn confirm_twice_yields_exactly_one_sales_order() {
    let app = TestApp::new();
    let sheet = app
        .submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;
    let admin = active_actor(ActorRole::Admin);

    let first = app
        .services
        .order_sheets
        .confirm_order_sheet(sheet.id, Some(&admin), confirm_request(Decimal::ZERO))
        .await
        .unwrap();
    let second = app
        .services
        .order_sheets
        .confirm_order_sheet(sheet.id, Some(&admin), confirm_request(Decimal::ZERO))
        .await
        .unwrap();

    assert_eq!(first.sales_order.id, second.sales_order.id);

    let sales_orders = app
        .store
        .query(Collection::SalesOrders, Filter::BySourceId(sheet.id))
        .await
        .unwrap();
    assert_eq!(sales_orders.len(), 1);
}

#[tokio::test]
async fn concurrent_confirms_agree_on_one_sales_order() {
    let app = TestApp::new();
    let sheet = app
        .submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;
    let admin = active_actor(ActorRole::Admin);

    let (a, b) = tokio::join!(
        app.services.order_sheets.confirm_order_sheet(
            sheet.id,
            Some(&admin),
            confirm_request(Decimal::ZERO),
        ),
        app.services.order_sheets.confirm_order_sheet(
            sheet.id,
            Some(&admin),
            confirm_request(Decimal::ZERO),
        ),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.sales_order.id, b.sales_order.id);

    let sales_orders = app
        .store
        .query(Collection::SalesOrders, Filter::BySourceId(sheet.id))
        .await
        .unwrap();
    assert_eq!(sales_orders.len(), 1);
}

#[tokio::test]
async fn operator_adjustments_demand_a_change_reason() {
    let app = TestApp::new();
    let items = vec![kg_item("pork belly", dec!(50), dec!(1000))];
    let sheet = app.submitted_sheet(items.clone()).await;

    let mut adjusted = items;
    adjusted[0].qty_requested = dec!(45);
    app.services
        .order_sheets
        .update_items(sheet.id, adjusted)
        .await
        .unwrap();

    let admin = active_actor(ActorRole::Admin);
    let err = app
        .services
        .order_sheets
        .confirm_order_sheet(sheet.id, Some(&admin), confirm_request(Decimal::ZERO))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let confirmation = app
        .services
        .order_sheets
        .confirm_order_sheet(
            sheet.id,
            Some(&admin),
            ConfirmOrderSheetRequest {
                discount_amount: Decimal::ZERO,
                change_reason: Some("customer call: reduced to 45kg".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        confirmation.sheet.change_reason.as_deref(),
        Some("customer call: reduced to 45kg")
    );
    assert_eq!(confirmation.sales_order.total_amount, dec!(45000));
}

// ==================== Delete ====================

#[tokio::test]
async fn confirmed_sheets_cannot_be_deleted() {
    let app = TestApp::new();
    let confirmation = app
        .confirmed(vec![kg_item("pork belly", dec!(50), dec!(1000))], Decimal::ZERO)
        .await;

    let err = app
        .services
        .order_sheets
        .delete_order_sheet(confirmation.sheet.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });
}

#[tokio::test]
async fn non_confirmed_sheets_are_deletable() {
    let app = TestApp::new();
    let sheet = app
        .submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;

    app.services
        .order_sheets
        .delete_order_sheet(sheet.id)
        .await
        .unwrap();

    let err = app
        .services
        .order_sheets
        .get_order_sheet(sheet.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

// ==================== Token access ====================

#[tokio::test]
async fn sheets_resolve_by_their_access_token() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;

    let resolved = app
        .services
        .tokens
        .resolve_order_sheet(&sheet.access_token)
        .await
        .unwrap();
    assert_eq!(resolved.id, sheet.id);

    let err = app
        .services
        .tokens
        .resolve_order_sheet("no-such-token")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn resolution_survives_a_passed_cutoff() {
    let app = TestApp::new();
    let sheet = app
        .services
        .order_sheets
        .create_order_sheet(meatflow_api::services::order_sheets::CreateOrderSheetRequest {
            customer_org_id: Some(uuid::Uuid::new_v4()),
            customer_name: "Daehan Meats".to_string(),
            ship_date: None,
            cut_off_at: Some(Utc::now() - Duration::hours(2)),
            is_guest: false,
            issue_immediately: true,
            items: vec![],
            admin_comment: None,
        })
        .await
        .unwrap();

    // The deadline is enforced by callers reading the status, not by
    // token validity.
    let resolved = app
        .services
        .tokens
        .resolve_order_sheet(&sheet.access_token)
        .await
        .unwrap();
    assert_eq!(resolved.id, sheet.id);
    assert_eq!(resolved.status, OrderSheetStatus::Sent);
}

#[tokio::test]
async fn listings_by_customer_and_status() {
    let app = TestApp::new();
    let sheet = app.sent_sheet(vec![]).await;
    let org_id = sheet.customer_org_id.unwrap();
    app.submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;

    let for_customer = app
        .services
        .order_sheets
        .list_for_customer(org_id)
        .await
        .unwrap();
    assert_eq!(for_customer.len(), 1);
    assert_eq!(for_customer[0].id, sheet.id);

    let submitted = app
        .services
        .order_sheets
        .list_by_status(OrderSheetStatus::Submitted)
        .await
        .unwrap();
    assert_eq!(submitted.len(), 1);

    let confirmed = app
        .services
        .order_sheets
        .list_by_status(OrderSheetStatus::Confirmed)
        .await
        .unwrap();
    assert!(confirmed.is_empty());
}

// ==================== Ambient behavior ====================

#[tokio::test]
async fn notifier_outage_never_fails_a_transition() {
    let app = TestApp::new();
    app.notifier.fail_deliveries();

    let sheet = app.sent_sheet(vec![]).await;
    let submitted = app
        .services
        .order_sheets
        .submit_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Customer)),
            submit_request(vec![kg_item("pork belly", dec!(10), dec!(1000))]),
        )
        .await
        .unwrap();
    assert_eq!(submitted.status, OrderSheetStatus::Submitted);
}

#[tokio::test]
async fn lifecycle_steps_emit_domain_events() {
    let app = TestApp::new();
    let sheet = app
        .submitted_sheet(vec![kg_item("pork belly", dec!(50), dec!(1000))])
        .await;
    app.services
        .order_sheets
        .confirm_order_sheet(
            sheet.id,
            Some(&active_actor(ActorRole::Admin)),
            confirm_request(Decimal::ZERO),
        )
        .await
        .unwrap();

    let events = app.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::OrderSheetSubmitted(id) if *id == sheet.id)));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::OrderSheetConfirmed { sheet_id, .. } if *sheet_id == sheet.id)));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SalesOrderCreated(_))));
}
