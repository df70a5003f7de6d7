use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use storefront::db;
use storefront::services::{ServiceError, cart_service, review_service};

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    // In-memory SQLite for testing
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

// Helper to create a test user
async fn create_test_user(db: &DatabaseConnection, username: &str, role: &str) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let user = storefront::models::user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(None),
        role: Set(role.to_string()),
        phone: Set(format!("+999{}", username)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let res = storefront::models::user::Entity::insert(user)
        .exec(db)
        .await
        .expect("Failed to create user");
    res.last_insert_id
}

// Helper to create a test category
async fn create_test_category(db: &DatabaseConnection, name: &str) -> i32 {
    let category = storefront::models::category::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(storefront::slug::slugify(name)),
        parent_id: Set(None),
        ..Default::default()
    };
    let res = storefront::models::category::Entity::insert(category)
        .exec(db)
        .await
        .expect("Failed to create category");
    res.last_insert_id
}

// Helper to create a test product
async fn create_test_product(
    db: &DatabaseConnection,
    category_id: i32,
    name: &str,
    price: f64,
    discount_price: Option<f64>,
    stock: i32,
) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let product = storefront::models::product::ActiveModel {
        category_id: Set(category_id),
        name: Set(name.to_string()),
        slug: Set(storefront::slug::slugify(name)),
        description: Set(format!("{} description", name)),
        price: Set(price),
        discount_price: Set(discount_price),
        stock: Set(stock),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let res = storefront::models::product::Entity::insert(product)
        .exec(db)
        .await
        .expect("Failed to create product");
    res.last_insert_id
}

// Helper to create an order containing one product (marks it purchased)
async fn create_test_purchase(db: &DatabaseConnection, user_id: i32, product_id: i32) -> i32 {
    let order = storefront::models::order::ActiveModel {
        user_id: Set(user_id),
        total_price: Set(10.0),
        status: Set("pending".to_string()),
        address: Set("somewhere".to_string()),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    };
    let order_id = storefront::models::order::Entity::insert(order)
        .exec(db)
        .await
        .expect("Failed to create order")
        .last_insert_id;

    let item = storefront::models::order_item::ActiveModel {
        order_id: Set(order_id),
        product_id: Set(product_id),
        price: Set(10.0),
        quantity: Set(1),
        ..Default::default()
    };
    storefront::models::order_item::Entity::insert(item)
        .exec(db)
        .await
        .expect("Failed to create order item");

    order_id
}

#[tokio::test]
async fn test_product_crud() {
    let db = setup_test_db().await;

    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Rice 1kg", 2.4, None, 10).await;

    // Read
    let fetched = storefront::models::product::Entity::find_by_id(product_id)
        .one(&db)
        .await
        .expect("Find failed");
    assert!(fetched.is_some());
    let fetched = fetched.unwrap();
    assert_eq!(fetched.name, "Rice 1kg");
    assert_eq!(fetched.slug, "rice-1kg");

    // Update
    let mut active: storefront::models::product::ActiveModel = fetched.into();
    active.price = Set(2.9);
    active.update(&db).await.expect("Update failed");

    let updated = storefront::models::product::Entity::find_by_id(product_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price, 2.9);

    // Delete
    storefront::models::product::Entity::delete_by_id(product_id)
        .exec(&db)
        .await
        .expect("Delete failed");
    let deleted = storefront::models::product::Entity::find_by_id(product_id)
        .one(&db)
        .await
        .unwrap();
    assert!(deleted.is_none());
}

#[tokio::test]
async fn test_deleting_category_cascades_to_products() {
    let db = setup_test_db().await;

    let category_id = create_test_category(&db, "Beverages").await;
    let product_id = create_test_product(&db, category_id, "Green tea", 3.0, None, 5).await;

    storefront::models::category::Entity::delete_by_id(category_id)
        .exec(&db)
        .await
        .expect("Delete failed");

    let orphan = storefront::models::product::Entity::find_by_id(product_id)
        .one(&db)
        .await
        .unwrap();
    assert!(orphan.is_none(), "Product should be gone with its category");
}

#[tokio::test]
async fn test_cart_created_lazily_and_unique() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "buyer", "client").await;

    // No cart row before first access
    let count = storefront::models::cart::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 0);

    let first = cart_service::get_or_create_cart(&db, user_id)
        .await
        .expect("Cart access failed");
    let second = cart_service::get_or_create_cart(&db, user_id)
        .await
        .expect("Cart access failed");

    assert_eq!(first.id, second.id, "Repeated access must reuse the cart");

    let count = storefront::models::cart::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 1, "Exactly one cart per user");
}

#[tokio::test]
async fn test_add_to_cart_accumulates_quantity() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "buyer", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Honey", 4.1, None, 20).await;

    cart_service::add_item(&db, user_id, product_id, 2)
        .await
        .expect("First add failed");
    cart_service::add_item(&db, user_id, product_id, 3)
        .await
        .expect("Second add failed");

    let items = storefront::models::cart_item::Entity::find()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(items.len(), 1, "Same product must share one cart row");
    assert_eq!(items[0].quantity, 5);
}

#[tokio::test]
async fn test_add_to_cart_stock_checks() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "buyer", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let in_stock = create_test_product(&db, category_id, "Flour", 1.5, None, 3).await;
    let sold_out = create_test_product(&db, category_id, "Sugar", 1.2, None, 0).await;

    // More than remaining stock
    let err = cart_service::add_item(&db, user_id, in_stock, 4)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Out of stock entirely
    let err = cart_service::add_item(&db, user_id, sold_out, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Zero quantity
    let err = cart_service::add_item(&db, user_id, in_stock, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Unknown product
    let err = cart_service::add_item(&db, user_id, 9999, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));

    // Nothing slipped into the cart
    let items = storefront::models::cart_item::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(items, 0);
}

#[tokio::test]
async fn test_remove_cart_item_scoped_to_owner() {
    let db = setup_test_db().await;
    let owner = create_test_user(&db, "owner", "client").await;
    let intruder = create_test_user(&db, "intruder", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Salt", 0.8, None, 50).await;

    cart_service::add_item(&db, owner, product_id, 1)
        .await
        .expect("Add failed");
    let item = storefront::models::cart_item::Entity::find()
        .one(&db)
        .await
        .unwrap()
        .unwrap();

    // Another user cannot remove it
    let err = cart_service::remove_item(&db, intruder, item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));

    // The owner can
    cart_service::remove_item(&db, owner, item.id)
        .await
        .expect("Remove failed");
    let remaining = storefront::models::cart_item::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_cart_total_uses_discount_price() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "buyer", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let discounted = create_test_product(&db, category_id, "Oil", 7.9, Some(6.5), 10).await;
    let regular = create_test_product(&db, category_id, "Rice", 2.0, None, 10).await;

    cart_service::add_item(&db, user_id, discounted, 2)
        .await
        .unwrap();
    cart_service::add_item(&db, user_id, regular, 3)
        .await
        .unwrap();

    let view = cart_service::cart_view(&db, user_id).await.unwrap();
    assert_eq!(view.items.len(), 2);
    assert!((view.total_price - (6.5 * 2.0 + 2.0 * 3.0)).abs() < 1e-9);
}

#[tokio::test]
async fn test_review_requires_purchase() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "reviewer", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Honey", 4.1, None, 10).await;

    let err = review_service::upsert_review(&db, user_id, product_id, Some(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // After a purchase the same request goes through
    create_test_purchase(&db, user_id, product_id).await;
    let result = review_service::upsert_review(&db, user_id, product_id, Some(5), None).await;
    assert!(matches!(
        result,
        Ok(review_service::ReviewUpsert::Created(_))
    ));
}

#[tokio::test]
async fn test_review_unique_per_user_product() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "reviewer", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Honey", 4.1, None, 10).await;
    create_test_purchase(&db, user_id, product_id).await;

    review_service::upsert_review(&db, user_id, product_id, Some(4), Some("Good".to_string()))
        .await
        .expect("Create failed");

    // Second write updates in place instead of adding a row
    let result =
        review_service::upsert_review(&db, user_id, product_id, Some(2), None).await;
    assert!(matches!(
        result,
        Ok(review_service::ReviewUpsert::Updated(_))
    ));

    let reviews = storefront::models::review::Entity::find()
        .filter(storefront::models::review::Column::ProductId.eq(product_id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating, Some(2));
    // Comment-only fields survive a rating-only update
    assert_eq!(reviews[0].comment.as_deref(), Some("Good"));
}

#[tokio::test]
async fn test_review_validation() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "reviewer", "client").await;
    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Honey", 4.1, None, 10).await;
    create_test_purchase(&db, user_id, product_id).await;

    // Neither rating nor comment
    let err = review_service::upsert_review(&db, user_id, product_id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Rating out of range
    let err = review_service::upsert_review(&db, user_id, product_id, Some(6), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Unknown product
    let err = review_service::upsert_review(&db, user_id, 9999, Some(3), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}

#[tokio::test]
async fn test_rating_aggregates() {
    let db = setup_test_db().await;
    let category_id = create_test_category(&db, "Groceries").await;
    let product_id = create_test_product(&db, category_id, "Honey", 4.1, None, 10).await;

    for (i, rating) in [Some(5), Some(4), None].into_iter().enumerate() {
        let user_id = create_test_user(&db, &format!("rater{}", i), "client").await;
        create_test_purchase(&db, user_id, product_id).await;
        review_service::upsert_review(&db, user_id, product_id, rating, Some("ok".to_string()))
            .await
            .expect("Review failed");
    }

    let map = review_service::rating_map(&db, vec![product_id])
        .await
        .unwrap();
    let (avg, count) = map.get(&product_id).copied().unwrap();
    // Average ignores the comment-only review, the count does not
    assert!((avg - 4.5).abs() < 1e-9);
    assert_eq!(count, 3);
}
