//! Seeds a development database with two accounts and a small catalog,
//! then prints a bearer token for each account. Safe to run repeatedly.

use anyhow::{bail, Context};
use auth_adapters::JwtAuthProvider;
use configs::Settings;
use domains::{
    Actor, AuthProvider, DomainError, ItemType, Role, StoreItem, StoreRepo, User, UserRepo,
};
use secrecy::ExposeSecret;
use serde_json::json;
use storage_adapters::PgStore;
use uuid::Uuid;

const ADMIN_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
const PLAYER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);

fn catalog() -> Vec<StoreItem> {
    vec![
        StoreItem {
            id: Uuid::from_u128(0x1000),
            name: "Diamond Pack".into(),
            description: "100 in-game diamonds".into(),
            item_type: ItemType::RedeemCode,
            coin_cost: 250,
            inventory: Some(20),
            is_active: true,
            metadata: json!({ "diamonds": 100 }),
        },
        StoreItem {
            id: Uuid::from_u128(0x1001),
            name: "Profile Frame".into(),
            description: "Animated frame for your fan profile".into(),
            item_type: ItemType::Digital,
            coin_cost: 80,
            inventory: None,
            is_active: true,
            metadata: json!({ "frame": "neon" }),
        },
        StoreItem {
            id: Uuid::from_u128(0x1002),
            name: "Hoodie".into(),
            description: "Limited community hoodie".into(),
            item_type: ItemType::Physical,
            coin_cost: 1200,
            inventory: Some(2),
            is_active: true,
            metadata: json!({ "sizes": ["M", "L"] }),
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    let Some(url) = &settings.database.url else {
        bail!("FANHUB__DATABASE__URL must be set to seed");
    };

    let store = PgStore::connect(url.expose_secret(), 2).await?;
    store.run_migrations().await?;

    let accounts = [
        (ADMIN_ID, "admin", Role::Admin, 0),
        (PLAYER_ID, "player", Role::User, 1_000),
    ];
    for (id, username, role, coins) in accounts {
        let mut user = User::new(username, role, coins);
        user.id = id;
        match UserRepo::insert(&store, &user).await {
            Ok(()) => println!("created user {username}"),
            Err(DomainError::Conflict(_)) => println!("user {username} already exists"),
            Err(e) => return Err(e.into()),
        }
    }

    for item in catalog() {
        store.upsert_item(&item).await?;
        println!("upserted item {} ({})", item.name, item.id);
    }

    let auth = JwtAuthProvider::new(&settings.auth.jwt_secret, settings.auth.token_ttl());
    for (user_id, role) in [(ADMIN_ID, Role::Admin), (PLAYER_ID, Role::User)] {
        let token = auth.issue_token(&Actor { user_id, role })?;
        println!("{role:?} token: {token}");
    }
    Ok(())
}
