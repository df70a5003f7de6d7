//! Cart Service - Pure business logic without HTTP layer

use chrono::Utc;
use sea_orm::*;

use super::ServiceError;
use crate::models::cart::{self, Entity as Cart};
use crate::models::cart_item::{self, Entity as CartItem};
use crate::models::product::{Entity as Product, ProductDto};

/// Cart contents with discount-aware totals.
#[derive(Debug, serde::Serialize)]
pub struct CartView {
    pub id: i32,
    pub items: Vec<CartItemView>,
    pub total_price: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct CartItemView {
    pub id: i32,
    pub product: ProductDto,
    pub quantity: i32,
}

/// Fetch the user's cart row, creating it on first access.
pub async fn get_or_create_cart(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<cart::Model, ServiceError> {
    if let Some(existing) = Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let new_cart = cart::ActiveModel {
        user_id: Set(user_id),
        ..Default::default()
    };
    Ok(new_cart.insert(db).await?)
}

/// Build the cart payload with embedded products and the running total.
pub async fn cart_view(db: &DatabaseConnection, user_id: i32) -> Result<CartView, ServiceError> {
    let cart = get_or_create_cart(db, user_id).await?;

    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(Product)
        .all(db)
        .await?;

    let mut views = Vec::new();
    let mut total = 0.0;
    for (item, product) in items {
        // A cascade delete can race a cart fetch; skip orphaned rows.
        let Some(product) = product else { continue };
        total += product.effective_price() * f64::from(item.quantity);
        views.push(CartItemView {
            id: item.id,
            product: ProductDto::from(product),
            quantity: item.quantity,
        });
    }

    Ok(CartView {
        id: cart.id,
        items: views,
        total_price: total,
    })
}

/// Add a product to the cart; quantities accumulate for an existing row.
pub async fn add_item(
    db: &DatabaseConnection,
    user_id: i32,
    product_id: i32,
    quantity: i32,
) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::InvalidState(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if product.stock <= 0 {
        return Err(ServiceError::InvalidState(format!(
            "'{}' is out of stock",
            product.name
        )));
    }
    if product.stock < quantity {
        return Err(ServiceError::InvalidState(format!(
            "Insufficient stock for '{}'. Remaining: {}",
            product.name, product.stock
        )));
    }

    let cart = get_or_create_cart(db, user_id).await?;

    let existing = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(db)
        .await?;

    match existing {
        Some(item) => {
            let new_quantity = item.quantity + quantity;
            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(new_quantity);
            active.update(db).await?;
        }
        None => {
            let new_item = cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                added_at: Set(Utc::now().to_rfc3339()),
                ..Default::default()
            };
            new_item.insert(db).await?;
        }
    }

    Ok(())
}

/// Remove one of the caller's cart rows.
pub async fn remove_item(
    db: &DatabaseConnection,
    user_id: i32,
    item_id: i32,
) -> Result<(), ServiceError> {
    let cart = get_or_create_cart(db, user_id).await?;

    let item = CartItem::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    item.delete(db).await?;
    Ok(())
}
