use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    /// When set, this is the effective unit price at checkout.
    pub discount_price: Option<f64>,
    pub image: Option<String>,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Category,
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Discount price wins over the list price when present.
    pub fn effective_price(&self) -> f64 {
        self.discount_price.unwrap_or(self.price)
    }
}

// DTO for API responses. Rating aggregates are filled in by the product
// endpoints; embeddings elsewhere (cart items) leave them out.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductDto {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub image: Option<String>,
    pub stock: i32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews_count: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Model> for ProductDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            category_id: model.category_id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            price: model.price,
            discount_price: model.discount_price,
            image: model.image,
            stock: model.stock,
            is_active: model.is_active,
            avg_rating: None,
            reviews_count: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
