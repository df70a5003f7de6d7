use crate::auth::hash_password;
use crate::models::{category, product, user};
use crate::slug::slugify;
use sea_orm::*;

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    // 1. Create Users
    let admin_password = hash_password("admin").unwrap();
    let client_password = hash_password("client").unwrap();

    let admin = user::ActiveModel {
        username: Set("admin".to_owned()),
        password_hash: Set(Some(admin_password)),
        role: Set("admin".to_owned()),
        phone: Set("+10000000001".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    let client = user::ActiveModel {
        username: Set("client".to_owned()),
        password_hash: Set(Some(client_password)),
        role: Set("client".to_owned()),
        phone: Set("+10000000002".to_owned()),
        address: Set(Some("12 Demo street".to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    user::Entity::insert(admin)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await?;

    user::Entity::insert(client)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await?;

    // 2. Create Categories
    for name in ["Groceries", "Beverages", "Household"] {
        let cat = category::ActiveModel {
            name: Set(name.to_owned()),
            slug: Set(slugify(name)),
            parent_id: Set(None),
            ..Default::default()
        };
        category::Entity::insert(cat)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(category::Column::Slug)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await?;
    }

    // 3. Create Products (attached to the first category)
    if let Some(groceries) = category::Entity::find()
        .filter(category::Column::Slug.eq("groceries"))
        .one(db)
        .await?
    {
        let existing = product::Entity::find()
            .filter(product::Column::CategoryId.eq(groceries.id))
            .count(db)
            .await?;

        if existing == 0 {
            let demo = [
                ("Rice 1kg", 2.40, None, 120),
                ("Olive oil 500ml", 7.90, Some(6.50), 40),
                ("Honey 250g", 4.10, None, 25),
            ];

            for (name, price, discount_price, stock) in demo {
                let item = product::ActiveModel {
                    category_id: Set(groceries.id),
                    name: Set(name.to_owned()),
                    slug: Set(slugify(name)),
                    description: Set(format!("Demo product: {}", name)),
                    price: Set(price),
                    discount_price: Set(discount_price),
                    stock: Set(stock),
                    is_active: Set(true),
                    created_at: Set(now.clone()),
                    updated_at: Set(now.clone()),
                    ..Default::default()
                };
                item.insert(db).await?;
            }
        }
    }

    Ok(())
}
