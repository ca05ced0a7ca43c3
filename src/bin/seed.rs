use marketplace_api::{config::AppConfig, db::create_pool, models::UserRole, security};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(
        &pool,
        "admin@example.com",
        "admin",
        "admin123",
        UserRole::Admin,
    )
    .await?;
    let vendor_id = ensure_user(
        &pool,
        "vendor@example.com",
        "vendor",
        "vendor123",
        UserRole::Vendor,
    )
    .await?;
    ensure_user(
        &pool,
        "customer@example.com",
        "customer",
        "customer123",
        UserRole::Customer,
    )
    .await?;
    seed_products(&pool, vendor_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, Vendor ID: {vendor_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    username: &str,
    password: &str,
    role: UserRole,
) -> anyhow::Result<Uuid> {
    let password_hash =
        security::hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If the user already exists, fetch the id.
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool, vendor_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        (
            "Walnut Desk Organizer",
            "Keeps a cluttered desk in order",
            450_00_i64,
            40,
            "office",
        ),
        (
            "Ceramic Pour-Over Set",
            "Slow coffee for patient mornings",
            620_00,
            25,
            "kitchen",
        ),
        (
            "Canvas Weekender Bag",
            "Two days of luggage, one shoulder",
            980_00,
            15,
            "travel",
        ),
        (
            "Linen Throw Blanket",
            "Light enough for summer evenings",
            540_00,
            60,
            "home",
        ),
    ];

    for (name, description, price, stock, category) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock, category, vendor_id)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(stock)
        .bind(category)
        .bind(vendor_id)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
