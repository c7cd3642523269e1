use deadpool_postgres::Pool;

use crate::error::AppError;

// Embedded at compile time; every statement is idempotent.
const MIGRATIONS: [(&str, &str); 5] = [
    (
        "0001_create_conversations_and_messages",
        include_str!("../migrations/0001_create_conversations_and_messages.sql"),
    ),
    (
        "0002_create_receipts_and_reactions",
        include_str!("../migrations/0002_create_receipts_and_reactions.sql"),
    ),
    (
        "0003_create_conversation_events",
        include_str!("../migrations/0003_create_conversation_events.sql"),
    ),
    (
        "0004_create_quota_tables",
        include_str!("../migrations/0004_create_quota_tables.sql"),
    ),
    (
        "0005_create_interests_and_matches",
        include_str!("../migrations/0005_create_interests_and_matches.sql"),
    ),
];

pub async fn run_all(pool: &Pool) -> Result<(), AppError> {
    let client = pool
        .get()
        .await
        .map_err(|e| AppError::StartServer(format!("migrations: get client: {e}")))?;

    for (name, sql) in MIGRATIONS {
        client
            .batch_execute(sql)
            .await
            .map_err(|e| AppError::StartServer(format!("migration {name}: {e}")))?;
        tracing::info!(migration = %name, "conversation-service migration applied");
    }
    Ok(())
}
