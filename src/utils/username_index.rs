//! Three-tier username availability check used by registration and account
//! management: cuckoo filter (fast negative), moka cache (fast positive),
//! then the database as the authority.

use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// Usernames known to be taken.
static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

#[inline]
pub fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

fn filter_might_contain(username: &String) -> bool {
    match FILTER.read() {
        Ok(filter) => filter.contains(username),
        // A poisoned filter can't rule anything out.
        Err(_) => true,
    }
}

fn filter_add_all<'a>(usernames: impl IntoIterator<Item = &'a String>) {
    let mut filter = FILTER.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    for username in usernames {
        filter.add(username);
    }
}

/// Records a newly created account in both fast tiers.
pub async fn mark_taken(username: &str) {
    let username = normalize(username);
    filter_add_all([&username]);
    TAKEN.insert(username, ()).await;
}

/// Drops a deleted or renamed account from both fast tiers.
pub async fn forget(username: &str) {
    let username = normalize(username);
    FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(&username);
    TAKEN.invalidate(&username).await;
}

/// `true` when nobody holds `username` yet.
pub async fn is_available(pool: &MySqlPool, username: &str) -> Result<bool> {
    let username = normalize(username);

    if !filter_might_contain(&username) {
        return Ok(true);
    }

    if TAKEN.contains_key(&username) {
        return Ok(false);
    }

    let matches = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE LOWER(username) = ?",
    )
    .bind(&username)
    .fetch_one(pool)
    .await?;
    let exists = matches > 0;

    if exists {
        TAKEN.insert(username, ()).await;
    }

    Ok(!exists)
}

/// Loads every username into the filter and the recently active ones into
/// the cache, streaming in batches.
pub async fn warmup(pool: &MySqlPool, recent_days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT username,
               CAST(COALESCE(last_login_at >= NOW() - INTERVAL ? DAY, 0) AS SIGNED) AS recent
        FROM users
        "#,
    )
    .bind(recent_days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut recent = Vec::new();
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (username, recent_flag) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
        let username = normalize(&username);
        if recent_flag != 0 {
            recent.push(username.clone());
        }
        batch.push(username);
        total += 1;

        if batch.len() >= batch_size {
            filter_add_all(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        filter_add_all(&batch);
    }

    let recent_count = recent.len();
    futures::future::join_all(recent.into_iter().map(|u| TAKEN.insert(u, ()))).await;

    log::info!(
        "Username index warmup complete: {} users, {} recent (last {} days)",
        total,
        recent_count,
        recent_days
    );

    Ok(())
}
