// Stockage relationnel (SQLite) : trait `Store` et son implémentation sqlx.
use crate::error::StorageError;
use crate::models::{Chat, ChatMessage, Comment, Post, STATUS_APPROVED};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::{str::FromStr, time::Duration};
use tracing::info;

// Une migration versionnée, intégrée au binaire.
struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

// L'ordre est important.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_posts_and_comments",
        sql: include_str!("../migrations/001_create_posts_and_comments.sql"),
    },
    Migration {
        version: 2,
        name: "create_chats_and_messages",
        sql: include_str!("../migrations/002_create_chats_and_messages.sql"),
    },
];

// Opérations dont le cœur a besoin. Chaque insertion est committée avant de retourner l'id.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_post(
        &self,
        kiosk_id: &str,
        category: &str,
        content: &str,
        timestamp: &str,
        status: &str,
    ) -> Result<i64, StorageError>;
    async fn list_posts(&self) -> Result<Vec<Post>, StorageError>;
    async fn list_approved_posts(&self) -> Result<Vec<Post>, StorageError>;
    async fn categories(&self) -> Result<Vec<String>, StorageError>;
    async fn get_post(&self, id: i64) -> Result<Option<Post>, StorageError>;

    // Échoue avec `NotFound` si le post n'existe pas ou n'est pas approuvé.
    async fn insert_comment(
        &self,
        post_id: i64,
        user: &str,
        comment: &str,
        timestamp: &str,
    ) -> Result<i64, StorageError>;
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, StorageError>;

    async fn insert_chat(&self, name: &str) -> Result<i64, StorageError>;
    async fn list_chats(&self) -> Result<Vec<Chat>, StorageError>;

    // Échoue avec `NotFound` si le chat n'existe pas.
    async fn insert_message(
        &self,
        chat_id: i64,
        user: &str,
        text: &str,
        ts: &str,
    ) -> Result<i64, StorageError>;
    async fn list_messages(&self, chat_id: i64) -> Result<Vec<ChatMessage>, StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    // Ouvre la base et applique les migrations.
    pub async fn open(db_file: &str) -> Result<Self, StorageError> {
        Ok(Self {
            db: init_database(db_file).await?,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_post(
        &self,
        kiosk_id: &str,
        category: &str,
        content: &str,
        timestamp: &str,
        status: &str,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO posts (kiosk_id, category, content, timestamp, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(kiosk_id)
        .bind(category)
        .bind(content)
        .bind(timestamp)
        .bind(status)
        .execute(&self.db)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StorageError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT id, kiosk_id, category, content, timestamp, status FROM posts ORDER BY id DESC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(posts)
    }

    async fn list_approved_posts(&self) -> Result<Vec<Post>, StorageError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT id, kiosk_id, category, content, timestamp, status FROM posts
             WHERE status = ? ORDER BY timestamp DESC",
        )
        .bind(STATUS_APPROVED)
        .fetch_all(&self.db)
        .await?;
        Ok(posts)
    }

    async fn categories(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT DISTINCT category FROM posts WHERE status = ? ORDER BY category",
        )
        .bind(STATUS_APPROVED)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, StorageError> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, kiosk_id, category, content, timestamp, status FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(post)
    }

    async fn insert_comment(
        &self,
        post_id: i64,
        user: &str,
        comment: &str,
        timestamp: &str,
    ) -> Result<i64, StorageError> {
        // Vérification et insertion dans la même transaction.
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_as::<_, (i64,)>("SELECT id FROM posts WHERE id = ? AND status = ?")
            .bind(post_id)
            .bind(STATUS_APPROVED)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(StorageError::NotFound("post"));
        }

        let result = sqlx::query(
            "INSERT INTO comments (post_id, user, comment, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(user)
        .bind(comment)
        .bind(timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, StorageError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, user, comment, timestamp FROM comments
             WHERE post_id = ? ORDER BY timestamp DESC",
        )
        .bind(post_id)
        .fetch_all(&self.db)
        .await?;
        Ok(comments)
    }

    async fn insert_chat(&self, name: &str) -> Result<i64, StorageError> {
        let result = sqlx::query("INSERT INTO chats (name) VALUES (?)")
            .bind(name)
            .execute(&self.db)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StorageError> {
        let chats = sqlx::query_as::<_, Chat>("SELECT id, name FROM chats ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(chats)
    }

    async fn insert_message(
        &self,
        chat_id: i64,
        user: &str,
        text: &str,
        ts: &str,
    ) -> Result<i64, StorageError> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_as::<_, (i64,)>("SELECT id FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(StorageError::NotFound("chat"));
        }

        let result = sqlx::query("INSERT INTO messages (chat_id, user, text, ts) VALUES (?, ?, ?, ?)")
            .bind(chat_id)
            .bind(user)
            .bind(text)
            .bind(ts)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_messages(&self, chat_id: i64) -> Result<Vec<ChatMessage>, StorageError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT id, chat_id, user, text, ts FROM messages WHERE chat_id = ? ORDER BY ts, id",
        )
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;
        Ok(messages)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.db.acquire().await?;
        Ok(())
    }
}

// Ouvre le pool et applique les migrations manquantes.
async fn init_database(db_file: &str) -> Result<SqlitePool, StorageError> {
    let in_memory = db_file == ":memory:";

    // Les PRAGMA sont par connexion : ils sont posés sur les options,
    // donc réappliqués à chaque connexion ouverte par le pool.
    let mut options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .pragma("cache_size", "-64000")
        .pragma("temp_store", "MEMORY");

    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    // Une base en mémoire n'existe que le temps de sa connexion : on n'en garde qu'une, jamais recyclée.
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(10)
    };

    let pool = pool_options.connect_with(options).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await?;

    for migration in MIGRATIONS {
        let applied =
            sqlx::query_as::<_, (i32,)>("SELECT version FROM schema_migrations WHERE version = ?")
                .bind(migration.version)
                .fetch_optional(&pool)
                .await?
                .is_some();

        if applied {
            info!("Migration {} already applied, skipping", migration.version);
            continue;
        }

        info!("Running migration {}: {}", migration.version, migration.name);

        // Une migration partielle est annulée avec sa transaction.
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Migration {} applied successfully", migration.version);
    }

    info!("Database initialization complete");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let store = store().await;
        let first = store
            .insert_post("k1", "Lost & Found", "found keys", "2026-01-01T10:00:00", STATUS_APPROVED)
            .await
            .unwrap();
        let second = store
            .insert_post("k2", "Events", "bake sale", "2026-01-01T11:00:00", STATUS_APPROVED)
            .await
            .unwrap();
        assert_eq!((first, second), (1, 2));

        let posts = store.list_posts().await.unwrap();
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(posts[1].category, "Lost & Found");
    }

    #[tokio::test]
    async fn approved_views_ignore_pending_posts() {
        let store = store().await;
        store
            .insert_post("k1", "Events", "visible", "2026-01-01T10:00:00", STATUS_APPROVED)
            .await
            .unwrap();
        store
            .insert_post("k1", "Hidden", "pending", "2026-01-01T11:00:00", "pending")
            .await
            .unwrap();

        assert_eq!(store.list_approved_posts().await.unwrap().len(), 1);
        assert_eq!(store.categories().await.unwrap(), vec!["Events".to_string()]);
        assert_eq!(store.list_posts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn comments_require_an_approved_post() {
        let store = store().await;
        let err = store
            .insert_comment(42, "ann", "hello", "2026-01-01T10:00:00")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound("post")));

        let post_id = store
            .insert_post("k1", "Events", "x", "2026-01-01T10:00:00", STATUS_APPROVED)
            .await
            .unwrap();
        store
            .insert_comment(post_id, "ann", "first", "2026-01-01T10:01:00")
            .await
            .unwrap();
        store
            .insert_comment(post_id, "bob", "second", "2026-01-01T10:02:00")
            .await
            .unwrap();

        let comments = store.list_comments(post_id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment, "second");
    }

    #[tokio::test]
    async fn messages_require_an_existing_chat() {
        let store = store().await;
        let err = store
            .insert_message(7, "ann", "hi", "2026-01-01T10:00:00")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound("chat")));
        assert!(store.list_messages(7).await.unwrap().is_empty());

        let chat_id = store.insert_chat("general").await.unwrap();
        let id = store
            .insert_message(chat_id, "ann", "hi", "2026-01-01T10:00:00")
            .await
            .unwrap();

        let messages = store.list_messages(chat_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, id);
        assert_eq!(store.list_chats().await.unwrap()[0].name, "general");
    }

    #[tokio::test]
    async fn migrations_are_applied_once() {
        let path = std::env::temp_dir().join(format!("kiosk_board_migrations_{}.db", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let pool = init_database(&path).await.unwrap();
        pool.close().await;
        let pool = init_database(&path).await.unwrap();

        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }
}
