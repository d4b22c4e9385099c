use std::time::Duration as StdDuration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use merchant_ops_hub::{
    cache::Cache,
    create_app,
    entities::{order, OrderStatus},
    routes::summary::SUMMARY_CACHE_KEY,
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> (Router, AppState) {
    let state = AppState::in_memory().await.unwrap();
    (create_app(state.clone()), state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Value {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> Value {
    call(app, Method::GET, uri, None).await
}

async fn post(app: &Router, uri: &str, body: Value) -> Value {
    call(app, Method::POST, uri, Some(body)).await
}

async fn create_member(app: &Router, name: &str, phone: &str, channel: &str) -> i64 {
    let res = post(
        app,
        "/api/v1/members",
        json!({ "name": name, "phone": phone, "channel": channel }),
    )
    .await;
    assert_eq!(res["code"], 200, "create member: {res}");
    res["data"]["id"].as_i64().unwrap()
}

async fn create_order(app: &Router, member_id: i64, amount_cents: i64, source: &str) -> Value {
    let res = post(
        app,
        "/api/v1/orders",
        json!({ "memberId": member_id, "amountCents": amount_cents, "source": source }),
    )
    .await;
    assert_eq!(res["code"], 200, "create order: {res}");
    res["data"].clone()
}

async fn insert_paid_order(state: &AppState, member_id: i64, order_no: &str, days_ago: i64) {
    order::ActiveModel {
        order_no: Set(order_no.to_string()),
        member_id: Set(member_id as i32),
        amount_cents: Set(1000),
        status: Set(OrderStatus::Paid),
        source: Set("wechat".to_string()),
        paid_at: Set(Some(Utc::now() - Duration::days(days_ago))),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap();
}

#[tokio::test]
async fn summary_counts_revenue_and_repurchases() {
    let (app, _) = setup().await;

    let a = create_member(&app, "Alice", "13900000001", "wechat").await;
    let b = create_member(&app, "Bob", "13900000002", "douyin").await;
    create_order(&app, a, 1200, "wechat").await;
    create_order(&app, a, 3400, "wechat").await;
    create_order(&app, b, 9900, "douyin").await;

    let res = get(&app, "/api/v1/summary").await;
    assert_eq!(res["code"], 200);
    assert_eq!(res["msg"], "ok");

    let data = &res["data"];
    assert_eq!(data["memberCount"], 2);
    assert_eq!(data["orderCount"], 3);
    assert_eq!(data["paidOrderCount"], 3);
    assert_eq!(data["revenueCents"], 14500);
    assert_eq!(data["repurchaseCount"], 1);
    assert_eq!(data["repurchaseRate"], 50.0);
    assert_eq!(data["activeCampaignCount"], 0);
    assert_eq!(
        data["channelBreakdown"],
        json!([
            { "channel": "douyin", "memberCount": 1 },
            { "channel": "wechat", "memberCount": 1 },
        ])
    );
}

#[tokio::test]
async fn empty_store_summary_has_zero_rate() {
    let (app, _) = setup().await;

    let data = get(&app, "/api/v1/summary").await["data"].clone();
    assert_eq!(data["memberCount"], 0);
    assert_eq!(data["revenueCents"], 0);
    assert_eq!(data["repurchaseRate"], 0.0);
    assert_eq!(data["channelBreakdown"], json!([]));
}

#[tokio::test]
async fn duplicate_phone_is_rejected_without_inserting() {
    let (app, _) = setup().await;
    create_member(&app, "Alice", "13900000001", "wechat").await;

    let res = post(
        &app,
        "/api/v1/members",
        json!({ "name": "Alice Again", "phone": "13900000001", "channel": "douyin" }),
    )
    .await;
    assert_eq!(res["code"], 400);
    assert_eq!(res["msg"], "phone already exists");
    assert_eq!(res["data"], json!({}));

    let list = get(&app, "/api/v1/members").await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_invalidates_cached_summary() {
    let (app, _) = setup().await;

    let before = get(&app, "/api/v1/summary").await;
    assert_eq!(before["data"]["memberCount"], 0);

    create_member(&app, "Alice", "13900000001", "wechat").await;

    let after = get(&app, "/api/v1/summary").await;
    assert_eq!(after["data"]["memberCount"], 1);
}

#[tokio::test]
async fn summary_is_served_from_cache_while_present() {
    let (app, state) = setup().await;

    let cached = json!({
        "memberCount": 99,
        "orderCount": 0,
        "paidOrderCount": 0,
        "revenueCents": 0,
        "repurchaseCount": 0,
        "repurchaseRate": 0.0,
        "activeCampaignCount": 0,
        "channelBreakdown": []
    });
    state
        .cache
        .set(SUMMARY_CACHE_KEY, &cached.to_string(), StdDuration::from_secs(45))
        .await
        .unwrap();

    let res = get(&app, "/api/v1/summary").await;
    assert_eq!(res["data"], cached);

    state.cache.set(SUMMARY_CACHE_KEY, "garbage", StdDuration::from_secs(45)).await.unwrap();
    let res = get(&app, "/api/v1/summary").await;
    assert_eq!(res["data"]["memberCount"], 0);
}

#[tokio::test]
async fn member_validation_and_search() {
    let (app, _) = setup().await;

    let res = post(&app, "/api/v1/members", json!({ "name": " ", "phone": "1", "channel": "x" })).await;
    assert_eq!(res["code"], 400);
    assert_eq!(res["msg"], "name, phone and channel are required");

    let res = post(&app, "/api/v1/members", json!({ "name": 42 })).await;
    assert_eq!(res["code"], 400);
    assert_eq!(res["msg"], "invalid member payload");

    create_member(&app, "  Alice  ", "13900000001", "wechat").await;
    create_member(&app, "Bob", "13900000002", "douyin").await;
    create_member(&app, "Carol", "13700000003", "douyin").await;

    let all = get(&app, "/api/v1/members").await;
    let names: Vec<&str> = all["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Carol", "Bob", "Alice"]);

    let by_phone = get(&app, "/api/v1/members?q=139").await;
    assert_eq!(by_phone["data"].as_array().unwrap().len(), 2);

    let by_name = get(&app, "/api/v1/members?q=Car").await;
    assert_eq!(by_name["data"][0]["phone"], "13700000003");

    let limited = get(&app, "/api/v1/members?limit=1").await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);

    let garbage_limit = get(&app, "/api/v1/members?limit=lots").await;
    assert_eq!(garbage_limit["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn order_creation_rules() {
    let (app, _) = setup().await;
    let alice = create_member(&app, "Alice", "13900000001", "wechat").await;

    let created = create_order(&app, alice, 1200, " wechat ").await;
    assert_eq!(created["memberName"], "Alice");
    assert_eq!(created["status"], "paid");
    assert_eq!(created["source"], "wechat");
    assert!(created["paidAt"].is_string());
    assert!(created["orderNo"]
        .as_str()
        .unwrap()
        .starts_with(&format!("ORD-{alice}-")));

    let pending = post(
        &app,
        "/api/v1/orders",
        json!({ "memberId": alice, "amountCents": 500, "source": "wechat", "status": "PENDING", "orderNo": "A-1" }),
    )
    .await;
    assert_eq!(pending["data"]["status"], "pending");
    assert_eq!(pending["data"]["paidAt"], Value::Null);

    let cases = [
        (json!({ "memberId": alice, "amountCents": 0, "source": "wechat" }), "memberId, amountCents and source are required"),
        (json!({ "memberId": alice, "amountCents": 100, "source": "  " }), "memberId, amountCents and source are required"),
        (json!({ "amountCents": 100, "source": "wechat" }), "memberId, amountCents and source are required"),
        (json!({ "memberId": alice, "amountCents": 100, "source": "wechat", "status": "shipped" }), "status must be pending, paid or refunded"),
        (json!({ "memberId": 999, "amountCents": 100, "source": "wechat" }), "member not found"),
        (json!({ "memberId": alice, "amountCents": 100, "source": "wechat", "orderNo": "A-1" }), "orderNo already exists"),
        (json!({ "memberId": "one" }), "invalid order payload"),
    ];
    for (body, msg) in cases {
        let res = post(&app, "/api/v1/orders", body).await;
        assert_eq!(res["code"], 400);
        assert_eq!(res["msg"], msg);
    }
}

#[tokio::test]
async fn order_list_filters_by_member() {
    let (app, _) = setup().await;
    let alice = create_member(&app, "Alice", "13900000001", "wechat").await;
    let bob = create_member(&app, "Bob", "13900000002", "douyin").await;
    create_order(&app, alice, 100, "wechat").await;
    create_order(&app, bob, 200, "douyin").await;
    create_order(&app, alice, 300, "wechat").await;

    let all = get(&app, "/api/v1/orders").await;
    let amounts: Vec<i64> = all["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["amountCents"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![300, 200, 100]);

    let bobs = get(&app, &format!("/api/v1/orders?memberId={bob}")).await;
    let rows = bobs["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["memberName"], "Bob");

    let ignored = get(&app, "/api/v1/orders?memberId=abc").await;
    assert_eq!(ignored["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn campaign_validation_and_listing() {
    let (app, _) = setup().await;

    let base = json!({ "name": "Spring", "channel": "wechat", "discountPct": 10 });
    let with = |patch: Value| {
        let mut body = base.clone();
        for (k, v) in patch.as_object().unwrap() {
            body[k] = v.clone();
        }
        body
    };

    let cases = [
        (with(json!({ "name": "" })), "name and channel are required"),
        (with(json!({ "discountPct": 0 })), "discountPct must be in (0, 100]"),
        (with(json!({ "discountPct": 100.5 })), "discountPct must be in (0, 100]"),
        (with(json!({ "status": "paused" })), "status must be draft, active or closed"),
        (with(json!({ "startAt": "2026-03-01" })), "startAt must be RFC3339 format"),
        (with(json!({ "endAt": "tomorrow" })), "endAt must be RFC3339 format"),
        (
            with(json!({ "startAt": "2026-03-02T00:00:00Z", "endAt": "2026-03-01T00:00:00Z" })),
            "endAt cannot be earlier than startAt",
        ),
        (json!("not an object"), "invalid campaign payload"),
    ];
    for (body, msg) in cases {
        let res = post(&app, "/api/v1/campaigns", body).await;
        assert_eq!(res["code"], 400, "{msg}");
        assert_eq!(res["msg"], msg);
    }

    let created = post(&app, "/api/v1/campaigns", with(json!({ "discountPct": 100 }))).await;
    assert_eq!(created["code"], 200);
    assert_eq!(created["data"]["status"], "active");
    assert_eq!(created["data"]["startAt"], Value::Null);

    let draft = post(
        &app,
        "/api/v1/campaigns",
        json!({ "name": "Autumn", "channel": "douyin", "discountPct": 5.5, "status": "Draft",
                "startAt": "2026-09-01T08:00:00+08:00", "endAt": "2026-09-30T00:00:00Z" }),
    )
    .await;
    assert_eq!(draft["data"]["status"], "draft");
    assert_eq!(draft["data"]["startAt"], "2026-09-01T00:00:00Z");

    let drafts = get(&app, "/api/v1/campaigns?status=draft").await;
    assert_eq!(drafts["data"].as_array().unwrap().len(), 1);
    assert_eq!(drafts["data"][0]["name"], "Autumn");

    let wechat = get(&app, "/api/v1/campaigns?channel=wechat").await;
    assert_eq!(wechat["data"][0]["name"], "Spring");

    let unknown = get(&app, "/api/v1/campaigns?status=paused").await;
    assert_eq!(unknown["code"], 400);

    let summary = get(&app, "/api/v1/summary").await;
    assert_eq!(summary["data"]["activeCampaignCount"], 1);
}

async fn seed_attribution(app: &Router) {
    let a = create_member(app, "Alice", "13900000001", "wechat").await;
    let b = create_member(app, "Bob", "13900000002", "wechat").await;
    let c = create_member(app, "Carol", "13900000003", "douyin").await;
    create_order(app, a, 1000, "wechat").await;
    create_order(app, a, 2000, "wechat").await;
    create_order(app, b, 500, "wechat").await;
    create_order(app, c, 700, "douyin").await;
    post(
        app,
        "/api/v1/orders",
        json!({ "memberId": b, "amountCents": 300, "source": "wechat", "status": "pending" }),
    )
    .await;

    for body in [
        json!({ "name": "Wechat push", "channel": "wechat", "discountPct": 10 }),
        json!({ "name": "Future wechat", "channel": "wechat", "discountPct": 10, "status": "draft",
                "startAt": (Utc::now() + Duration::days(7)).to_rfc3339() }),
        json!({ "name": "Email blast", "channel": "email", "discountPct": 20 }),
    ] {
        assert_eq!(post(app, "/api/v1/campaigns", body).await["code"], 200);
    }
}

#[tokio::test]
async fn campaign_attribution_rows() {
    let (app, _) = setup().await;
    seed_attribution(&app).await;

    let res = get(&app, "/api/v1/reports/campaign-attribution").await;
    assert_eq!(res["code"], 200);
    let rows = res["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);

    let email = &rows[0];
    assert_eq!(email["campaignName"], "Email blast");
    assert_eq!(email["targetMemberCount"], 0);
    assert_eq!(email["paidOrderCount"], 0);
    assert_eq!(email["revenueCents"], 0);
    assert_eq!(email["conversionRate"], 0.0);

    let future = &rows[1];
    assert_eq!(future["campaignName"], "Future wechat");
    assert_eq!(future["targetMemberCount"], 2);
    assert_eq!(future["paidOrderCount"], 0);

    let push = &rows[2];
    assert_eq!(push["campaignName"], "Wechat push");
    assert_eq!(push["status"], "active");
    assert_eq!(push["targetMemberCount"], 2);
    assert_eq!(push["paidOrderCount"], 3);
    assert_eq!(push["convertedMemberCount"], 2);
    assert_eq!(push["repurchaseConvertedCount"], 1);
    assert_eq!(push["revenueCents"], 3500);
    assert_eq!(push["conversionRate"], 100.0);
}

#[tokio::test]
async fn campaign_attribution_filters() {
    let (app, _) = setup().await;
    seed_attribution(&app).await;

    let rows = |res: Value| res["data"]["rows"].as_array().unwrap().len();

    assert_eq!(rows(get(&app, "/api/v1/reports/campaign-attribution?channel=wechat").await), 2);
    assert_eq!(rows(get(&app, "/api/v1/reports/campaign-attribution?status=draft").await), 1);
    assert_eq!(rows(get(&app, "/api/v1/reports/campaign-attribution?q=blast").await), 1);
    assert_eq!(rows(get(&app, "/api/v1/reports/campaign-attribution?limit=1").await), 1);
    assert_eq!(
        rows(get(&app, "/api/v1/reports/campaign-attribution?from=2000-01-01T00:00:00Z").await),
        3
    );
    assert_eq!(
        rows(get(&app, "/api/v1/reports/campaign-attribution?to=2000-01-01T00:00:00Z").await),
        0
    );

    let bad = get(&app, "/api/v1/reports/campaign-attribution?from=yesterday").await;
    assert_eq!(bad["code"], 400);
    assert_eq!(bad["msg"], "from must be RFC3339 format");

    let reversed = get(
        &app,
        "/api/v1/reports/campaign-attribution?from=2026-03-02T00:00:00Z&to=2026-03-01T00:00:00Z",
    )
    .await;
    assert_eq!(reversed["msg"], "to cannot be earlier than from");
}

#[tokio::test]
async fn campaign_attribution_csv_export() {
    let (app, _) = setup().await;
    seed_attribution(&app).await;

    let request = Request::builder()
        .uri("/api/v1/reports/campaign-attribution/export?channel=email")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=campaign-attribution.csv"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(
        lines[0],
        "campaign_id,campaign_name,channel,status,start_at,end_at,target_member_count,paid_order_count,converted_member_count,repurchase_converted_count,revenue_cents,conversion_rate"
    );
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with(",Email blast,email,active,,,0,0,0,0,0,0.00"));

    let bad = get(&app, "/api/v1/reports/campaign-attribution/export?status=paused").await;
    assert_eq!(bad["code"], 400);
}

#[tokio::test]
async fn followups_pick_single_buyers_and_lapsed_members() {
    let (app, state) = setup().await;

    let loyal = create_member(&app, "Loyal", "13900000001", "wechat").await;
    let once = create_member(&app, "Once", "13900000002", "wechat").await;
    let lapsed = create_member(&app, "Lapsed", "13900000003", "douyin").await;
    let never = create_member(&app, "Never", "13900000004", "wechat").await;

    create_order(&app, loyal, 100, "wechat").await;
    create_order(&app, loyal, 200, "wechat").await;
    create_order(&app, once, 300, "wechat").await;
    insert_paid_order(&state, lapsed, "OLD-1", 50).await;
    insert_paid_order(&state, lapsed, "OLD-2", 40).await;
    post(
        &app,
        "/api/v1/orders",
        json!({ "memberId": never, "amountCents": 100, "source": "wechat", "status": "pending" }),
    )
    .await;

    let res = get(&app, "/api/v1/followups").await;
    assert_eq!(res["code"], 200);
    assert_eq!(res["data"]["daysWindow"], 30);
    let items = res["data"]["items"].as_array().unwrap();
    let names: Vec<&str> = items.iter().map(|i| i["memberName"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Lapsed", "Once"]);

    let lapsed_item = &items[0];
    assert_eq!(lapsed_item["paidOrderCount"], 2);
    assert_eq!(lapsed_item["paidAmountCents"], 2000);
    assert_eq!(lapsed_item["daysSinceLastPay"], 40);
    assert_eq!(items[1]["daysSinceLastPay"], 0);

    // a wider window covers the lapsed member's latest order
    let wide = get(&app, "/api/v1/followups?days=60").await;
    let wide_items = wide["data"]["items"].as_array().unwrap();
    assert_eq!(wide_items.len(), 1);
    assert_eq!(wide_items[0]["memberName"], "Once");

    let douyin = get(&app, "/api/v1/followups?channel=douyin").await;
    assert_eq!(douyin["data"]["items"].as_array().unwrap().len(), 1);

    let clamped = get(&app, "/api/v1/followups?days=9999").await;
    assert_eq!(clamped["data"]["daysWindow"], 365);
}

#[tokio::test]
async fn health_reports_backends() {
    let (app, _) = setup().await;

    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "ok": true, "env": "local", "db": "sqlite", "cache": "local" }));
}

#[tokio::test]
async fn cors_preflight_short_circuits() {
    let (app, _) = setup().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/members")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, Authorization");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );

    let request = Request::builder().uri("/api/v1/members").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let (app, _) = setup().await;

    let request = Request::builder()
        .uri("/api-doc/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    for path in ["/api/v1/members", "/api/v1/summary", "/api/auth/login", "/healthz"] {
        assert!(doc["paths"].get(path).is_some(), "missing {path}");
    }
}
