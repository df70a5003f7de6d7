//! Order Service - checkout transaction and order history

use chrono::Utc;
use sea_orm::*;
use std::collections::HashMap;

use super::ServiceError;
use crate::models::cart_item::{self, Entity as CartItem};
use crate::models::order::{self, Entity as Order};
use crate::models::order_item::{self, Entity as OrderItem};
use crate::models::product::{self, Entity as Product};
use crate::models::user::Entity as User;
use crate::services::cart_service;

/// Enriched order with its line items.
#[derive(Debug, serde::Serialize)]
pub struct OrderView {
    pub id: i32,
    pub total_price: f64,
    pub status: String,
    pub address: String,
    pub created_at: String,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, serde::Serialize)]
pub struct OrderItemView {
    pub product_id: i32,
    pub product_name: String,
    pub price: f64,
    pub quantity: i32,
}

#[derive(Debug)]
pub struct CheckoutOutcome {
    pub order_id: i32,
    pub total_price: f64,
}

/// Convert the selected cart items into an order.
///
/// Runs as one transaction: any insufficient-stock item aborts the whole
/// order, leaving stock and cart untouched. Unit prices are frozen on the
/// order items (discount price when set, list price otherwise).
pub async fn checkout(
    db: &DatabaseConnection,
    user_id: i32,
    selected_item_ids: Vec<i32>,
    address: Option<String>,
) -> Result<CheckoutOutcome, ServiceError> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    // Fall back to the address stored on the profile
    let address = address
        .filter(|a| !a.trim().is_empty())
        .or_else(|| user.address.clone())
        .unwrap_or_default();

    let cart = cart_service::get_or_create_cart(db, user_id).await?;

    let txn = db.begin().await?;

    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .filter(cart_item::Column::Id.is_in(selected_item_ids))
        .find_also_related(Product)
        .all(&txn)
        .await?;

    if items.is_empty() {
        return Err(ServiceError::InvalidState(
            "No cart items selected".to_string(),
        ));
    }

    // Validate every line and freeze unit prices before any write
    let mut total = 0.0;
    let mut prepared = Vec::new();
    for (item, product) in items {
        let product = product.ok_or(ServiceError::NotFound)?;
        if product.stock <= 0 {
            return Err(ServiceError::InvalidState(format!(
                "'{}' is out of stock",
                product.name
            )));
        }
        if product.stock < item.quantity {
            return Err(ServiceError::InvalidState(format!(
                "Insufficient stock for '{}'. Remaining: {}",
                product.name, product.stock
            )));
        }

        let unit_price = product.effective_price();
        total += unit_price * f64::from(item.quantity);
        prepared.push((item, product, unit_price));
    }

    let now = Utc::now().to_rfc3339();

    let new_order = order::ActiveModel {
        user_id: Set(user_id),
        total_price: Set(total),
        status: Set("pending".to_owned()),
        address: Set(address),
        created_at: Set(now.clone()),
        ..Default::default()
    };
    let saved_order = new_order.insert(&txn).await?;

    for (item, product, unit_price) in prepared {
        let new_item = order_item::ActiveModel {
            order_id: Set(saved_order.id),
            product_id: Set(product.id),
            price: Set(unit_price),
            quantity: Set(item.quantity),
            ..Default::default()
        };
        new_item.insert(&txn).await?;

        let remaining = product.stock - item.quantity;
        let mut product_active: product::ActiveModel = product.into();
        product_active.stock = Set(remaining);
        product_active.updated_at = Set(now.clone());
        product_active.update(&txn).await?;

        CartItem::delete_by_id(item.id).exec(&txn).await?;
    }

    txn.commit().await?;

    Ok(CheckoutOutcome {
        order_id: saved_order.id,
        total_price: total,
    })
}

/// List the user's orders, newest first, with line items embedded.
pub async fn list_orders(
    db: &DatabaseConnection,
    user_id: i32,
    page: u64,
    page_size: u64,
) -> Result<(Vec<OrderView>, u64), ServiceError> {
    let query = Order::find().filter(order::Column::UserId.eq(user_id));

    let total = query.clone().count(db).await?;

    let orders = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(db)
        .await?;

    let views = attach_items(db, orders).await?;
    Ok((views, total))
}

/// Fetch one of the user's orders; other users' orders read as missing.
pub async fn get_order(
    db: &DatabaseConnection,
    user_id: i32,
    order_id: i32,
) -> Result<OrderView, ServiceError> {
    let order = Order::find_by_id(order_id)
        .filter(order::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut views = attach_items(db, vec![order]).await?;
    views.pop().ok_or(ServiceError::NotFound)
}

async fn attach_items(
    db: &DatabaseConnection,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderView>, ServiceError> {
    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();

    let mut items_by_order: HashMap<i32, Vec<order_item::Model>> = HashMap::new();
    let mut product_names: HashMap<i32, String> = HashMap::new();

    if !order_ids.is_empty() {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?;

        let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
        if !product_ids.is_empty() {
            let products = Product::find()
                .filter(crate::models::product::Column::Id.is_in(product_ids))
                .all(db)
                .await?;
            for p in products {
                product_names.insert(p.id, p.name);
            }
        }

        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }
    }

    let views = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order
                .remove(&order.id)
                .unwrap_or_default()
                .into_iter()
                .map(|item| OrderItemView {
                    product_id: item.product_id,
                    product_name: product_names
                        .get(&item.product_id)
                        .cloned()
                        .unwrap_or_else(|| "Unknown".to_string()),
                    price: item.price,
                    quantity: item.quantity,
                })
                .collect();

            OrderView {
                id: order.id,
                total_price: order.total_price,
                status: order.status,
                address: order.address,
                created_at: order.created_at,
                items,
            }
        })
        .collect();

    Ok(views)
}
