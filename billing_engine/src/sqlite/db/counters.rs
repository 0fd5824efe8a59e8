use sqlx::SqliteConnection;

/// Increment-and-read the named counter as a single atomic statement.
///
/// The upsert makes first use indistinguishable from the steady state, and the whole increment happens inside one
/// statement, so concurrent callers can never observe or return the same value. Values start at 1.
pub async fn allocate(name: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (value,): (i64,) = sqlx::query_as(
        r#"
            INSERT INTO counters (name, value) VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET value = value + 1
            RETURNING value;
        "#,
    )
    .bind(name)
    .fetch_one(conn)
    .await?;
    Ok(value)
}

/// The current high-water mark for a sequence, without consuming a value.
pub async fn current_value(name: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let value: Option<(i64,)> =
        sqlx::query_as("SELECT value FROM counters WHERE name = $1").bind(name).fetch_optional(conn).await?;
    Ok(value.map(|(v,)| v).unwrap_or_default())
}
