mod common;

use axum::http::StatusCode;
use chrono::Utc;
use orderx_server::domain::{
    Dish, Inventory, LocalizedText, MenuCategory, MenuSnapshot, OptionCategory, DishOption, Platform,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{admin, binding, mount_token, send, setup};

fn menu(brand_id: Uuid, store_id: Uuid) -> MenuSnapshot {
    let dish = |id: &str, price: &str, groups: &[&str], sold_out: bool| Dish {
        id: id.into(),
        name: LocalizedText::new(id, id),
        description: LocalizedText::default(),
        price: price.parse().unwrap(),
        option_category_ids: groups.iter().map(|g| g.to_string()).collect(),
        inventory: Inventory {
            sold_out,
            ..Inventory::default()
        },
    };

    MenuSnapshot {
        brand_id,
        store_id,
        menu_id: "menu-1".into(),
        title: LocalizedText::new("Lunch", "午餐"),
        categories: vec![MenuCategory {
            id: "cat-1".into(),
            name: LocalizedText::new("Mains", "主餐"),
            dish_ids: vec!["combo".into(), "tea".into()],
        }],
        dishes: vec![
            dish("combo", "150", &["drinks", "drinks"], false),
            dish("tea", "40", &["drinks"], true),
        ],
        option_categories: vec![OptionCategory {
            id: "drinks".into(),
            name: LocalizedText::new("Drinks", "飲料"),
            min_select: 1,
            max_select: 1,
            options: vec![DishOption {
                id: "opt-tea".into(),
                name: LocalizedText::new("Tea", "茶"),
                price: "0".parse().unwrap(),
                reference_dish_id: Some("tea".into()),
            }],
        }],
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_sync_reports_each_binding_independently() {
    let server = MockServer::start().await;
    mount_token(&server, Platform::UberEats).await;
    mount_token(&server, Platform::Foodpanda).await;

    Mock::given(method("PUT"))
        .and(path("/ubereats/v2/eats/stores/uber-a/menus"))
        .and(header("authorization", "Bearer ubereats-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ubereats/v2/eats/stores/uber-b/menus"))
        .respond_with(ResponseTemplate::new(500).set_body_string("menu service down"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/foodpanda/v2/chains/chain-1/catalog"))
        .and(body_partial_json(json!({
            "callbackUrl": "http://orderx.test/webhooks/foodpanda/catalog-callback",
            "vendors": ["panda-a"]
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "catalogImportId": "imp-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    let uber_a = binding(brand_id, store_id, Platform::UberEats, "uber-a");
    let uber_b = binding(brand_id, store_id, Platform::UberEats, "uber-b");
    let panda_a = binding(brand_id, store_id, Platform::Foodpanda, "panda-a");
    for b in [&uber_a, &uber_b, &panda_a] {
        t.store.add_binding(b.clone());
    }
    t.store.put_menu(menu(brand_id, store_id));

    let (status, body) = send(
        &t.router,
        admin("POST", &format!("/v1/brands/{brand_id}/stores/{store_id}/sync"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r["success"] == true).count(), 2);
    let failed = results.iter().find(|r| r["success"] == false).unwrap();
    assert_eq!(failed["external_store_id"], "uber-b");
    assert_eq!(failed["retryable"], true);

    assert!(t.store.binding(uber_a.id).unwrap().last_synced_at.is_some());
    assert!(t.store.binding(uber_b.id).unwrap().last_synced_at.is_none());
    assert!(t.store.binding(panda_a.id).unwrap().last_synced_at.is_some());
    server.verify().await;
}

#[tokio::test]
async fn test_ubereats_menu_has_one_group_per_shared_category() {
    let server = MockServer::start().await;
    mount_token(&server, Platform::UberEats).await;
    Mock::given(method("PUT"))
        .and(path("/ubereats/v2/eats/stores/uber-a/menus"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    t.store.add_binding(binding(brand_id, store_id, Platform::UberEats, "uber-a"));
    t.store.put_menu(menu(brand_id, store_id));

    let (status, _) = send(
        &t.router,
        admin("POST", &format!("/v1/brands/{brand_id}/stores/{store_id}/sync"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    let push = requests.iter().find(|r| r.method.as_str() == "PUT").unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&push.body).unwrap();

    assert_eq!(payload["modifier_groups"].as_array().unwrap().len(), 1);
    let items = payload["items"].as_array().unwrap();
    let combo = items.iter().find(|i| i["id"] == "combo").unwrap();
    assert_eq!(combo["modifier_group_ids"]["ids"], json!(["drinks"]));
    assert_eq!(combo["price_info"]["price"], 15000);

    let option = items.iter().find(|i| i["id"] == "opt-tea").unwrap();
    assert_eq!(option["suspension_info"]["suspension"]["suspend_until"], 4_102_444_800_000i64);
    assert_eq!(payload["menus"][0]["title"]["translations"]["zh_tw"], "午餐");
}

#[tokio::test]
async fn test_store_without_platforms_is_unprocessable() {
    let server = MockServer::start().await;
    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    t.store.put_menu(menu(brand_id, store_id));

    let (status, body) = send(
        &t.router,
        admin("POST", &format!("/v1/brands/{brand_id}/stores/{store_id}/sync"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "no_platform_enabled");
}

#[tokio::test]
async fn test_missing_menu_is_not_found() {
    let server = MockServer::start().await;
    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    t.store.add_binding(binding(brand_id, store_id, Platform::UberEats, "uber-a"));

    let (status, body) = send(
        &t.router,
        admin("POST", &format!("/v1/brands/{brand_id}/stores/{store_id}/sync"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "menu_not_found");
}

#[tokio::test]
async fn test_item_suspend_and_resume() {
    let server = MockServer::start().await;
    mount_token(&server, Platform::UberEats).await;
    mount_token(&server, Platform::Foodpanda).await;

    Mock::given(method("POST"))
        .and(path("/ubereats/v2/eats/stores/uber-a/menus/items/combo"))
        .and(body_partial_json(json!({
            "suspension_info": { "suspension": { "suspend_until": 4_102_444_800_000i64 } }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/foodpanda/v2/chains/chain-1/vendors/panda-a/items/combo/availability"))
        .and(body_partial_json(json!({ "suspension": { "suspended_until": null } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    t.store.add_binding(binding(brand_id, store_id, Platform::UberEats, "uber-a"));

    let uri = format!("/v1/brands/{brand_id}/stores/{store_id}/items/combo/availability");
    let (status, body) = send(&t.router, admin("PUT", &uri, Some(json!({ "suspended": true })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["success"], true);

    let other_store = Uuid::new_v4();
    t.store.add_binding(binding(brand_id, other_store, Platform::Foodpanda, "panda-a"));
    let uri = format!("/v1/brands/{brand_id}/stores/{other_store}/items/combo/availability");
    let (status, body) = send(&t.router, admin("PUT", &uri, Some(json!({ "suspended": false })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["platform"], "foodpanda");

    server.verify().await;
}

#[tokio::test]
async fn test_availability_sync_pushes_computed_state() {
    let server = MockServer::start().await;
    mount_token(&server, Platform::UberEats).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    t.store.add_binding(binding(brand_id, store_id, Platform::UberEats, "uber-a"));
    t.store.put_menu(menu(brand_id, store_id));

    let (status, body) = send(
        &t.router,
        admin("POST", &format!("/v1/brands/{brand_id}/stores/{store_id}/sync/availability"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["success"], true);

    let requests = server.received_requests().await.unwrap();
    let suspended: Vec<(String, bool)> = requests
        .iter()
        .filter(|r| r.url.path().contains("/menus/items/"))
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            let id = r.url.path().rsplit('/').next().unwrap().to_string();
            (id, !body["suspension_info"]["suspension"]["suspend_until"].is_null())
        })
        .collect();
    assert_eq!(
        suspended,
        vec![
            ("combo".to_string(), false),
            ("tea".to_string(), true),
            ("opt-tea".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let server = MockServer::start().await;
    let t = setup(&server);
    let uri = format!("/v1/brands/{}/stores/{}/sync", Uuid::new_v4(), Uuid::new_v4());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri(&uri)
        .header("authorization", "Bearer wrong")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(&t.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_admin_token");
}

#[tokio::test]
async fn test_token_status_and_refresh() {
    let server = MockServer::start().await;
    mount_token(&server, Platform::Foodpanda).await;
    let t = setup(&server);

    let (status, body) = send(&t.router, admin("GET", "/v1/platforms/foodpanda/token", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], true);
    assert_eq!(body["cached"], false);
    assert!(body.get("access_token").is_none());

    let (status, body) = send(&t.router, admin("POST", "/v1/platforms/foodpanda/token/refresh", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], true);
    assert!(body["valid_until"].is_string());

    let (status, _) = send(&t.router, admin("GET", "/v1/platforms/doordash/token", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_endpoint_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    let t = setup(&server);

    let (status, body) = send(&t.router, admin("POST", "/v1/platforms/ubereats/token/refresh", None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "token_fetch_failed");
}

#[tokio::test]
async fn test_platform_401_forces_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ubereats/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ubereats-token",
            "expires_in": 2_592_000
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ubereats/v2/eats/stores/uber-a/menus/items/combo"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ubereats/v2/eats/stores/uber-a/menus/items/combo"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let t = setup(&server);
    let (brand_id, store_id) = (Uuid::new_v4(), Uuid::new_v4());
    t.store
        .add_binding(binding(brand_id, store_id, Platform::UberEats, "uber-a"));
    let uri = format!("/v1/brands/{brand_id}/stores/{store_id}/items/combo/availability");

    let (status, body) = send(&t.router, admin("PUT", &uri, Some(json!({ "suspended": true })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["success"], false);
    assert_eq!(body[0]["retryable"], false);

    let (_, body) = send(&t.router, admin("PUT", &uri, Some(json!({ "suspended": true })))).await;
    assert_eq!(body[0]["success"], true);
    server.verify().await;
}
