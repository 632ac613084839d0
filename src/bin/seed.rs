use chrono::Utc;
use flag_storefront::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::products,
};
use sea_orm::{ActiveValue::Set, EntityTrait, sea_query::OnConflict};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let seeded = seed_products(&orm).await?;
    println!("Seed completed. {seeded} products inserted");
    Ok(())
}

async fn seed_products(orm: &sea_orm::DatabaseConnection) -> anyhow::Result<u64> {
    let now = Utc::now().fixed_offset();
    // Prices and stock are mixed numbers and numeric strings, as in the live catalogue.
    let products = vec![
        products::ActiveModel {
            id: Set("prd_bandera_arg_90x150".to_string()),
            name: Set("Bandera Argentina de Flameo".to_string()),
            slug: Set(Some("bandera-argentina-de-flameo".to_string())),
            sku: Set("BAN-ARG-FLA".to_string()),
            description: Set(Some("Tela de poliéster reforzada, costura doble".to_string())),
            price: Set(json!(1000)),
            stock: Set(Some(json!(40))),
            variants: Set(json!([
                { "id": "v-90x150", "name": "90x150 cm", "size": "90x150", "price": "1500", "stock": 12 },
                { "id": "v-150x240", "name": "150x240 cm", "size": "150x240", "price": 2800, "stock": "5" }
            ])),
            categories: Set(json!(["banderas", "nacionales"])),
            image_urls: Set(json!(["/img/bandera-argentina.jpg"])),
            ecommerce: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        },
        products::ActiveModel {
            id: Set("prd_bandera_ceremonia".to_string()),
            name: Set("Bandera de Ceremonia con Sol".to_string()),
            slug: Set(None),
            sku: Set("BAN-CER-SOL".to_string()),
            description: Set(Some("Raso bordado con flecos dorados".to_string())),
            price: Set(json!("18500")),
            stock: Set(Some(json!("8"))),
            variants: Set(json!([])),
            categories: Set(json!(["banderas", "ceremonia"])),
            image_urls: Set(json!([])),
            ecommerce: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        },
        products::ActiveModel {
            id: Set("prd_mastil_aluminio".to_string()),
            name: Set("Mástil de Aluminio 3m".to_string()),
            slug: Set(None),
            sku: Set("MAS-ALU-3M".to_string()),
            description: Set(None),
            price: Set(json!(42000)),
            stock: Set(None),
            variants: Set(json!([])),
            categories: Set(json!(["mastiles"])),
            image_urls: Set(json!([])),
            ecommerce: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        },
        products::ActiveModel {
            id: Set("prd_banderin_interno".to_string()),
            name: Set("Banderín de Escritorio".to_string()),
            slug: Set(None),
            sku: Set("BDN-ESC".to_string()),
            description: Set(None),
            price: Set(json!(3200)),
            stock: Set(Some(json!(0))),
            variants: Set(json!([])),
            categories: Set(json!(["banderines"])),
            image_urls: Set(json!([])),
            // Not sold online.
            ecommerce: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        },
    ];

    let inserted = products::Entity::insert_many(products)
        .on_conflict(
            OnConflict::column(products::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(orm)
        .await?;

    Ok(inserted)
}
