use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use axum_storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        product_variants, products, shipping_methods, users,
        products::Column as ProductCol, shipping_methods::Column as ShippingCol,
        users::Column as UserCol,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&orm, "user@example.com", "user123", "user").await?;
    seed_catalog(&orm).await?;
    seed_shipping_methods(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = users::Entity::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present (role={})", existing.role);
        return Ok(existing.id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_catalog(orm: &DatabaseConnection) -> anyhow::Result<()> {
    // (name, description, sku, price, variants: (sku, size, stock))
    let catalog = [
        (
            "Ferris Hoodie",
            "Warm hoodie for Rustaceans",
            "HOODIE",
            Decimal::new(5500, 2),
            vec![("HOODIE-S", "S", 25), ("HOODIE-M", "M", 40), ("HOODIE-L", "L", 30)],
        ),
        (
            "Ferris Mug",
            "Coffee tastes better with Ferris",
            "MUG",
            Decimal::new(1200, 2),
            vec![],
        ),
        (
            "Sticker Pack",
            "Decorate your laptop",
            "STICKERS",
            Decimal::new(500, 2),
            vec![],
        ),
    ];

    for (name, description, sku, price, variants) in catalog {
        let existing = products::Entity::find()
            .filter(ProductCol::Sku.eq(sku))
            .one(orm)
            .await?;
        if existing.is_some() {
            continue;
        }

        let product = products::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            sku: Set(sku.to_string()),
            price: Set(price),
            is_active: Set(true),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;

        for (variant_sku, size, stock) in variants {
            product_variants::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product.id),
                sku: Set(variant_sku.to_string()),
                attributes: Set(serde_json::json!({ "size": size })),
                price: Set(None),
                stock: Set(stock),
                created_at: NotSet,
            }
            .insert(orm)
            .await?;
        }
    }

    println!("Seeded catalog");
    Ok(())
}

async fn seed_shipping_methods(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let methods = [
        ("Standard", Decimal::new(499, 2), Some(Decimal::new(5000, 2))),
        ("Express", Decimal::new(1499, 2), None),
    ];

    for (name, base_price, free_above) in methods {
        let existing = shipping_methods::Entity::find()
            .filter(ShippingCol::Name.eq(name))
            .one(orm)
            .await?;
        if existing.is_some() {
            continue;
        }

        shipping_methods::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            base_price: Set(base_price),
            free_above: Set(free_above),
            is_active: Set(true),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded shipping methods");
    Ok(())
}
