// SQLite adapter: embedded, file-based backend over rusqlite
use crate::error::AppError;
use crate::services::database::adapter::{
    closed_error, ColumnInfo, DatabaseAdapter, QueryOutcome, QueryResult, TableSchema,
};
use crate::services::database::DatabaseType;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::Mutex;

const SAMPLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    age INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price REAL NOT NULL,
    category TEXT,
    stock INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    product_id INTEGER,
    quantity INTEGER NOT NULL,
    order_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    status TEXT DEFAULT 'pending',
    FOREIGN KEY (user_id) REFERENCES users (id),
    FOREIGN KEY (product_id) REFERENCES products (id)
);
"#;

const SAMPLE_USERS: &[(&str, &str, i64)] = &[
    ("Alice Johnson", "alice@example.com", 28),
    ("Bob Smith", "bob@example.com", 35),
    ("Carol Brown", "carol@example.com", 22),
    ("David Wilson", "david@example.com", 41),
    ("Eva Davis", "eva@example.com", 29),
];

const SAMPLE_PRODUCTS: &[(&str, f64, &str, i64)] = &[
    ("Laptop", 999.99, "Electronics", 50),
    ("Coffee Mug", 12.99, "Kitchen", 200),
    ("Book: Python Guide", 29.99, "Books", 75),
    ("Wireless Mouse", 25.50, "Electronics", 120),
    ("Plant Pot", 8.99, "Garden", 30),
];

const SAMPLE_ORDERS: &[(i64, i64, i64, &str)] = &[
    (1, 1, 1, "completed"),
    (2, 2, 2, "pending"),
    (1, 3, 1, "completed"),
    (3, 1, 1, "shipped"),
    (4, 4, 3, "pending"),
];

/// SQLite adapter.
/// Uses tokio::Mutex for async-friendly locking around the single connection.
pub struct SqliteAdapter {
    conn: Mutex<Option<Connection>>,
    path: String,
}

impl SqliteAdapter {
    /// Open (or create) the database file. `:memory:` opens a private in-memory database.
    pub async fn open(db_path: &str) -> Result<Self, AppError> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let clean_path = db_path.trim_start_matches("sqlite:").trim_start_matches("//");

        if clean_path != ":memory:" {
            if let Some(parent) = Path::new(clean_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let conn = Connection::open(clean_path).map_err(|e| {
            AppError::Connection(format!("Failed to open SQLite database {}: {}", clean_path, e))
        })?;
        // Enable foreign key constraints
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: clean_path.to_string(),
        })
    }

    /// Create the users/products/orders sample tables and fill the empty ones
    pub async fn seed_sample_data(&self) -> Result<(), AppError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| closed_error(DatabaseType::Sqlite))?;

        conn.execute_batch(SAMPLE_SCHEMA)?;

        let tx = conn.transaction()?;

        if Self::table_is_empty(&tx, "users")? {
            let mut stmt = tx.prepare("INSERT INTO users (name, email, age) VALUES (?1, ?2, ?3)")?;
            for (name, email, age) in SAMPLE_USERS {
                stmt.execute(rusqlite::params![name, email, age])?;
            }
        }

        if Self::table_is_empty(&tx, "products")? {
            let mut stmt = tx.prepare(
                "INSERT INTO products (name, price, category, stock) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (name, price, category, stock) in SAMPLE_PRODUCTS {
                stmt.execute(rusqlite::params![name, price, category, stock])?;
            }
        }

        if Self::table_is_empty(&tx, "orders")? {
            let mut stmt = tx.prepare(
                "INSERT INTO orders (user_id, product_id, quantity, status) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (user_id, product_id, quantity, status) in SAMPLE_ORDERS {
                stmt.execute(rusqlite::params![user_id, product_id, quantity, status])?;
            }
        }

        tx.commit()?;
        tracing::info!("SQLite database {} initialized with sample data", self.path);

        Ok(())
    }

    fn table_is_empty(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count == 0)
    }

    fn read_schema(conn: &Connection) -> rusqlite::Result<Vec<TableSchema>> {
        let mut tables_stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = tables_stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut columns_stmt =
            conn.prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = columns_stmt
                .query_map([&name], |row| {
                    Ok(ColumnInfo {
                        name: row.get(0)?,
                        data_type: row.get(1)?,
                        nullable: row.get::<_, i64>(2)? == 0,
                        primary_key: row.get::<_, i64>(3)? > 0,
                    })
                })?
                .collect::<rusqlite::Result<Vec<ColumnInfo>>>()?;
            tables.push(TableSchema { name, columns });
        }

        Ok(tables)
    }

    fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<QueryOutcome> {
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();

        if column_count == 0 {
            let rows_affected = stmt.execute([])?;
            let verb = sql.trim_start().to_uppercase();
            let last_insert_id = if verb.starts_with("INSERT") || verb.starts_with("REPLACE") {
                Some(conn.last_insert_rowid() as u64)
            } else {
                None
            };
            return Ok(QueryOutcome::Affected {
                rows_affected: rows_affected as u64,
                last_insert_id,
            });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(Self::sqlite_value_to_json(row.get_ref(idx)?));
            }
            data.push(values);
        }

        Ok(QueryOutcome::Rows { columns, rows: data })
    }

    /// Helper function to convert SQLite value to JSON Value
    fn sqlite_value_to_json(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => json!(i),
            ValueRef::Real(f) => json!(f),
            ValueRef::Text(bytes) => json!(String::from_utf8_lossy(bytes)),
            ValueRef::Blob(bytes) => json!(format!("<blob {} bytes>", bytes.len())),
        }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| closed_error(DatabaseType::Sqlite))?;

        let start_time = Instant::now();
        let outcome = Self::run_statement(conn, sql)
            .map_err(|e| AppError::Database(format!("Query execution failed: {}", e)))?;

        Ok(QueryResult {
            outcome,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| closed_error(DatabaseType::Sqlite))?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn describe_schema(&self) -> Result<Vec<TableSchema>, AppError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| closed_error(DatabaseType::Sqlite))?;
        Self::read_schema(conn).map_err(|e| AppError::Database(format!("Failed to read schema: {}", e)))
    }

    async fn size_bytes(&self) -> Option<u64> {
        if self.path == ":memory:" {
            return None;
        }
        tokio::fs::metadata(&self.path).await.ok().map(|meta| meta.len())
    }

    async fn backup(&self, dir: &Path) -> Result<PathBuf, AppError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| closed_error(DatabaseType::Sqlite))?;

        std::fs::create_dir_all(dir)?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = dir.join(format!("backup_{}.db", timestamp));

        conn.execute(
            "VACUUM INTO ?1",
            rusqlite::params![backup_path.to_string_lossy().into_owned()],
        )
        .map_err(|e| AppError::Database(format!("Backup failed: {}", e)))?;

        tracing::info!("Database {} backed up to {}", self.path, backup_path.display());
        Ok(backup_path)
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| AppError::Database(format!("Failed to close SQLite database: {}", e)))?;
            tracing::debug!("Closed SQLite database {}", self.path);
        }
        Ok(())
    }
}
