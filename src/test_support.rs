//! Shared fixtures for unit tests: a migrated in-memory database and
//! shortcuts for seeding ledger rows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;

use crate::{
    db::{establish_connection_with_config, run_migrations, DbConfig, DbPool},
    entities::{person, product, sector, user},
    events::{process_events, EventSender},
    services::{
        exit_orders::{insert_exit_order, NewExitItem, NewExitOrder},
        stock_entries::{insert_entry, NewStockEntry},
    },
};

static SEQ: AtomicUsize = AtomicUsize::new(1);

fn next_seq() -> usize {
    SEQ.fetch_add(1, Ordering::Relaxed)
}

/// One connection, so every query sees the same in-memory database and
/// transactions run one after another.
pub(crate) async fn memory_db() -> DbPool {
    let pool = establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout: Duration::from_secs(30),
        ..Default::default()
    })
    .await
    .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub(crate) fn event_sender() -> Arc<EventSender> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(process_events(rx));
    Arc::new(EventSender::new(tx))
}

pub(crate) async fn seed_user(db: &DbPool, name: &str) -> i32 {
    user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("user{}@stockroom.test", next_seq())),
        role: Set("user".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

pub(crate) async fn seed_product(db: &DbPool, name: &str) -> i32 {
    product::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

/// Creates the person and, when named, a new sector for them.
pub(crate) async fn seed_person(db: &DbPool, name: &str, sector_name: Option<&str>) -> i32 {
    let sector_id = match sector_name {
        Some(sector_name) => Some(
            sector::ActiveModel {
                name: Set(sector_name.to_string()),
                ..Default::default()
            }
            .insert(db)
            .await
            .unwrap()
            .id,
        ),
        None => None,
    };

    person::ActiveModel {
        name: Set(name.to_string()),
        sector_id: Set(sector_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

pub(crate) async fn seed_entry(db: &DbPool, product_id: i32, quantity: i32, user_id: i32) -> i32 {
    insert_entry(
        db,
        NewStockEntry {
            product_id,
            quantity,
            unit_value: Decimal::ONE,
            entry_date: None,
            user_id,
            notes: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// Writes an exit order without a requester and without stock checks.
pub(crate) async fn seed_exit(db: &DbPool, user_id: i32, items: &[(i32, i32)]) -> i32 {
    seed_exit_for(db, user_id, None, items).await
}

pub(crate) async fn seed_exit_for(
    db: &DbPool,
    user_id: i32,
    requester_person_id: Option<i32>,
    items: &[(i32, i32)],
) -> i32 {
    let seq = next_seq();
    let items: Vec<NewExitItem> = items
        .iter()
        .map(|&(product_id, quantity)| NewExitItem {
            product_id,
            quantity,
            serial_number: None,
            asset_number: None,
        })
        .collect();

    let (exit, _) = insert_exit_order(
        db,
        NewExitOrder {
            ticket_number: format!("TKT-{}", seq),
            ticket_link: format!("https://helpdesk.test/TKT-{}", seq),
            reason: None,
            delivery_date: None,
            requester_person_id,
            user_id,
        },
        &items,
    )
    .await
    .unwrap();
    exit.id
}
