use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use storefront::services::{ServiceError, telegram_service};
use storefront::telegram::TelegramClient;
use storefront::{api, db};
use tower::util::ServiceExt; // for `oneshot`
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

// Mock server standing in for api.telegram.org
async fn setup_bot() -> (MockServer, TelegramClient) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&server)
        .await;

    let client = TelegramClient::new(&server.uri(), "TESTTOKEN");
    (server, client)
}

fn update_from_json(value: serde_json::Value) -> telegram_service::TelegramUpdate {
    serde_json::from_value(value).expect("Failed to build update")
}

async fn create_code_user(
    db: &DatabaseConnection,
    username: &str,
    code: &str,
    expires_at: chrono::DateTime<chrono::Utc>,
) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let user = storefront::models::user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(None),
        role: Set("client".to_string()),
        phone: Set(format!("+999{}", username)),
        telegram_chat_id: Set(Some(format!("chat-{}", username))),
        verification_code: Set(Some(code.to_string())),
        code_expires_at: Set(Some(expires_at.to_rfc3339())),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    storefront::models::user::Entity::insert(user)
        .exec(db)
        .await
        .expect("Failed to create user")
        .last_insert_id
}

#[tokio::test]
async fn test_start_command_requests_contact() {
    let db = setup_test_db().await;
    let (server, bot) = setup_bot().await;

    let update = update_from_json(serde_json::json!({
        "message": {
            "chat": { "id": 4242 },
            "text": "/start",
            "from": { "first_name": "Marat" }
        }
    }));

    telegram_service::handle_update(&db, &bot, update)
        .await
        .expect("Webhook handling failed");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["chat_id"], 4242);
    assert!(
        body["reply_markup"]["keyboard"][0][0]["request_contact"]
            .as_bool()
            .unwrap_or(false),
        "/start must ask for the contact"
    );

    // No user is created by /start alone
    let users = storefront::models::user::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn test_contact_share_registers_user_and_issues_code() {
    let db = setup_test_db().await;
    let (server, bot) = setup_bot().await;

    let update = update_from_json(serde_json::json!({
        "message": {
            "chat": { "id": 4242 },
            "contact": { "phone_number": "998901112233" },
            "from": { "first_name": "Marat", "last_name": "K", "username": "marat_k" }
        }
    }));

    telegram_service::handle_update(&db, &bot, update)
        .await
        .expect("Webhook handling failed");

    let user = storefront::models::user::Entity::find()
        .one(&db)
        .await
        .unwrap()
        .expect("User should be created");

    // Phone is normalized, profile fields are taken from Telegram
    assert_eq!(user.phone, "+998901112233");
    assert_eq!(user.telegram_chat_id.as_deref(), Some("4242"));
    assert_eq!(user.username, "marat_k");
    assert_eq!(user.first_name.as_deref(), Some("Marat"));
    assert_eq!(user.role, "client");
    assert!(user.password_hash.is_none());

    // A 6-digit code with a future expiry was stored
    let code = user.verification_code.as_deref().expect("Code missing");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    let expires = chrono::DateTime::parse_from_rfc3339(user.code_expires_at.as_deref().unwrap())
        .unwrap();
    assert!(expires > chrono::Utc::now());

    // Welcome message plus the code delivery
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let code_body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(
        code_body["text"].as_str().unwrap().contains(code),
        "The issued code must be delivered over the bot"
    );
}

#[tokio::test]
async fn test_contact_share_twice_reuses_account() {
    let db = setup_test_db().await;
    let (_server, bot) = setup_bot().await;

    let contact = serde_json::json!({
        "message": {
            "chat": { "id": 1 },
            "contact": { "phone_number": "+998901112233" },
            "from": { "first_name": "Marat" }
        }
    });

    telegram_service::handle_update(&db, &bot, update_from_json(contact.clone()))
        .await
        .unwrap();

    // Same phone from a new device/chat
    let rebound = serde_json::json!({
        "message": {
            "chat": { "id": 2 },
            "contact": { "phone_number": "+998901112233" },
            "from": { "first_name": "Marat" }
        }
    });
    telegram_service::handle_update(&db, &bot, update_from_json(rebound))
        .await
        .unwrap();

    let users = storefront::models::user::Entity::find()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(users.len(), 1, "Contact share must not duplicate accounts");
    assert_eq!(users[0].telegram_chat_id.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_login_command_requires_registration() {
    let db = setup_test_db().await;
    let (server, bot) = setup_bot().await;

    let update = update_from_json(serde_json::json!({
        "message": {
            "chat": { "id": 777 },
            "text": "/login"
        }
    }));

    telegram_service::handle_update(&db, &bot, update)
        .await
        .expect("Webhook handling failed");

    // A prompt is sent, no account appears
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let users = storefront::models::user::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn test_login_command_rotates_code() {
    let db = setup_test_db().await;
    let (_server, bot) = setup_bot().await;

    let user_id = create_code_user(
        &db,
        "marat",
        "111111",
        chrono::Utc::now() + chrono::Duration::minutes(5),
    )
    .await;

    // Point the stored chat id at the incoming chat
    let user = storefront::models::user::Entity::find_by_id(user_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut active: storefront::models::user::ActiveModel = user.into();
    active.telegram_chat_id = Set(Some("555".to_string()));
    active.update(&db).await.unwrap();

    let update = update_from_json(serde_json::json!({
        "message": {
            "chat": { "id": 555 },
            "text": "/login"
        }
    }));
    telegram_service::handle_update(&db, &bot, update)
        .await
        .unwrap();

    let user = storefront::models::user::Entity::find_by_id(user_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let code = user.verification_code.as_deref().unwrap();
    assert_ne!(code, "111111", "/login must issue a fresh code");
}

#[tokio::test]
async fn test_verify_code_is_single_use() {
    let db = setup_test_db().await;
    create_code_user(
        &db,
        "marat",
        "123456",
        chrono::Utc::now() + chrono::Duration::minutes(5),
    )
    .await;

    let user = telegram_service::verify_code(&db, "123456")
        .await
        .expect("First use should succeed");
    assert!(user.verification_code.is_none());
    assert!(user.code_expires_at.is_none());

    // Replay fails
    let err = telegram_service::verify_code(&db, "123456")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_verify_code_expiry_and_shape() {
    let db = setup_test_db().await;
    create_code_user(
        &db,
        "marat",
        "654321",
        chrono::Utc::now() - chrono::Duration::minutes(1),
    )
    .await;

    // Expired
    let err = telegram_service::verify_code(&db, "654321")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Wrong shapes
    for bad in ["", "12345", "1234567", "12ab56"] {
        let err = telegram_service::verify_code(&db, bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    // Unknown code of the right shape
    let err = telegram_service::verify_code(&db, "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_webhook_always_answers_200() {
    let db = setup_test_db().await;
    let app = api::api_router(db);

    // Junk body
    let req = Request::builder()
        .uri("/auth/telegram/webhook")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("this is not json"))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Update without a message
    let req = Request::builder()
        .uri("/auth/telegram/webhook")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"update_id": 1}"#))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_telegram_login_endpoint() {
    let db = setup_test_db().await;
    create_code_user(
        &db,
        "marat",
        "222333",
        chrono::Utc::now() + chrono::Duration::minutes(5),
    )
    .await;

    let app = api::api_router(db);

    let payload = serde_json::json!({ "code": "222333" });
    let req = Request::builder()
        .uri("/auth/telegram")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["token"].as_str().is_some());
    assert_eq!(json["username"], "marat");
    assert_eq!(json["role"], "client");

    // Replaying the code is rejected
    let req = Request::builder()
        .uri("/auth/telegram")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
