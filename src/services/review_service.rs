//! Review Service - purchase-gated review upserts and rating aggregates

use chrono::Utc;
use sea_orm::*;
use std::collections::HashMap;

use super::ServiceError;
use crate::models::order::{self, Entity as Order};
use crate::models::order_item::{self, Entity as OrderItem};
use crate::models::product::Entity as Product;
use crate::models::review::{self, Entity as Review, ReviewDto};
use crate::models::user::Entity as User;

#[derive(Debug)]
pub enum ReviewUpsert {
    Created(review::Model),
    Updated(review::Model),
}

/// True when one of the user's orders contains the product.
pub async fn has_purchased(
    db: &DatabaseConnection,
    user_id: i32,
    product_id: i32,
) -> Result<bool, ServiceError> {
    let order_ids: Vec<i32> = Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|o| o.id)
        .collect();

    if order_ids.is_empty() {
        return Ok(false);
    }

    let count = OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .filter(order_item::Column::ProductId.eq(product_id))
        .count(db)
        .await?;

    Ok(count > 0)
}

/// Create or update the caller's review for a product.
///
/// Only provided fields are touched on update, so a later comment-only
/// request keeps an earlier rating.
pub async fn upsert_review(
    db: &DatabaseConnection,
    user_id: i32,
    product_id: i32,
    rating: Option<i32>,
    comment: Option<String>,
) -> Result<ReviewUpsert, ServiceError> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if !has_purchased(db, user_id, product_id).await? {
        return Err(ServiceError::Forbidden(
            "Only customers who bought this product can review it".to_string(),
        ));
    }

    let has_comment = comment.as_deref().is_some_and(|c| !c.trim().is_empty());
    if rating.is_none() && !has_comment {
        return Err(ServiceError::InvalidState(
            "A rating or a comment is required".to_string(),
        ));
    }

    if let Some(r) = rating {
        if !(1..=5).contains(&r) {
            return Err(ServiceError::InvalidState(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
    }

    let existing = Review::find()
        .filter(review::Column::UserId.eq(user_id))
        .filter(review::Column::ProductId.eq(product_id))
        .one(db)
        .await?;

    match existing {
        Some(model) => {
            let mut active: review::ActiveModel = model.into();
            if rating.is_some() {
                active.rating = Set(rating);
            }
            if comment.is_some() {
                active.comment = Set(comment);
            }
            Ok(ReviewUpsert::Updated(active.update(db).await?))
        }
        None => {
            let new_review = review::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product_id),
                rating: Set(rating),
                comment: Set(comment),
                created_at: Set(Utc::now().to_rfc3339()),
                ..Default::default()
            };
            Ok(ReviewUpsert::Created(new_review.insert(db).await?))
        }
    }
}

/// Reviews for a product, newest first.
pub async fn list_reviews(
    db: &DatabaseConnection,
    product_id: i32,
    page: u64,
    page_size: u64,
) -> Result<(Vec<ReviewDto>, u64), ServiceError> {
    let query = Review::find().filter(review::Column::ProductId.eq(product_id));

    let total = query.clone().count(db).await?;

    let reviews = query
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .find_also_related(User)
        .all(db)
        .await?;

    let dtos = reviews
        .into_iter()
        .map(|(r, user)| ReviewDto {
            id: r.id,
            username: user
                .map(|u| u.username)
                .unwrap_or_else(|| "Unknown".to_string()),
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        })
        .collect();

    Ok((dtos, total))
}

/// (avg of non-null ratings rounded to one decimal, total review count)
/// per product. Products without reviews are absent from the map.
pub async fn rating_map(
    db: &DatabaseConnection,
    product_ids: Vec<i32>,
) -> Result<HashMap<i32, (f64, i64)>, ServiceError> {
    let mut map: HashMap<i32, (i64, i64, i64)> = HashMap::new(); // (rating sum, rated, total)

    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let reviews = Review::find()
        .filter(review::Column::ProductId.is_in(product_ids))
        .all(db)
        .await?;

    for r in reviews {
        let entry = map.entry(r.product_id).or_default();
        entry.2 += 1;
        if let Some(rating) = r.rating {
            entry.0 += i64::from(rating);
            entry.1 += 1;
        }
    }

    Ok(map
        .into_iter()
        .map(|(product_id, (sum, rated, total))| {
            let avg = if rated > 0 {
                ((sum as f64 / rated as f64) * 10.0).round() / 10.0
            } else {
                0.0
            };
            (product_id, (avg, total))
        })
        .collect())
}
