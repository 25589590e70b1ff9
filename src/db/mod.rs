pub mod models;

use crate::error::Result;
use crate::types::PriceSnapshot;

/// Load one game's full snapshot history, ordered for per-book grouping.
/// Rows with unrecognized market/period strings are dropped at the boundary.
pub async fn fetch_game_snapshots(
    pool: &sqlx::SqlitePool,
    game_id: &str,
) -> Result<Vec<PriceSnapshot>> {
    let rows = sqlx::query_as::<_, models::SnapshotRow>(
        r#"
        SELECT game_id, market_type, period, book, outcome, line, price, snapshot_at_ms
        FROM price_snapshots
        WHERE game_id = ?
        ORDER BY market_type, outcome, book, snapshot_at_ms
        "#,
    )
    .bind(game_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(|r| r.into_snapshot()).collect())
}

/// Append a batch of observations. Snapshots are immutable, so plain inserts.
pub async fn insert_snapshots(
    pool: &sqlx::SqlitePool,
    snaps: &[PriceSnapshot],
) -> Result<u64> {
    let mut written = 0u64;
    for s in snaps {
        sqlx::query(
            r#"
            INSERT INTO price_snapshots
                (game_id, market_type, period, book, outcome, line, price, snapshot_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&s.game_id)
        .bind(s.market_type.to_string())
        .bind(s.period.to_string())
        .bind(&s.book)
        .bind(&s.outcome)
        .bind(s.line)
        .bind(i64::from(s.price))
        .bind(s.snapshot_at_ms)
        .execute(pool)
        .await?;
        written += 1;
    }
    Ok(written)
}

/// Insert a game if new, refreshing the commence time when the feed learns it.
pub async fn upsert_game(pool: &sqlx::SqlitePool, game: &crate::types::Game, now_ms: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO games (id, sport, home_team, away_team, commence_time_ms, created_at_ms)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            commence_time_ms = excluded.commence_time_ms
        "#,
    )
    .bind(&game.id)
    .bind(&game.sport)
    .bind(&game.home_team)
    .bind(&game.away_team)
    .bind(game.commence_time_ms)
    .bind(now_ms)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_game(
    pool: &sqlx::SqlitePool,
    game_id: &str,
) -> Result<Option<crate::types::Game>> {
    let row = sqlx::query_as::<_, models::GameRow>("SELECT * FROM games WHERE id = ?")
        .bind(game_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.into_game()))
}
