//! SQL query constants
//!
//! Contains all SQL used by the Postgres store adapters.

pub const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(255) UNIQUE NOT NULL,
        email VARCHAR(255) UNIQUE NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        role VARCHAR(50) NOT NULL
            CHECK (role IN ('property_manager', 'finance', 'ceo', 'assistant')),
        first_name VARCHAR(255) NOT NULL,
        last_name VARCHAR(255) NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT true,
        last_login TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub const CREATE_RECORDS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        id UUID PRIMARY KEY,
        collection VARCHAR(64) NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub const CREATE_RECORDS_COLLECTION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)";

/// Store-level uniqueness for `propertyRef`
pub const CREATE_PROPERTY_REF_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_records_property_ref
    ON records ((body->>'propertyRef'))
    WHERE collection = 'properties'
"#;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, first_name, last_name, \
                            is_active, last_login, created_at, updated_at";

pub fn insert_user() -> String {
    format!(
        "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {USER_COLUMNS}"
    )
}

pub fn select_user_by_email_or_username() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $2 LIMIT 1")
}

pub fn select_user_by_email() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1")
}

pub fn select_user_by_id() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1")
}

pub fn update_user_active() -> String {
    format!("UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}")
}

pub const UPDATE_LAST_LOGIN: &str =
    "UPDATE users SET last_login = $2, updated_at = $2 WHERE id = $1";

pub const SELECT_RECORDS: &str =
    "SELECT id, body, created_at, updated_at FROM records WHERE collection = $1";

pub const SELECT_RECORD: &str =
    "SELECT id, body, created_at, updated_at FROM records WHERE collection = $1 AND id = $2";

pub const INSERT_RECORD: &str = r#"
    INSERT INTO records (id, collection, body, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $4)
    RETURNING id, body, created_at, updated_at
"#;

/// Shallow merge of the JSON body
pub const UPDATE_RECORD: &str = r#"
    UPDATE records SET body = body || $3, updated_at = $4
    WHERE collection = $1 AND id = $2
    RETURNING id, body, created_at, updated_at
"#;

pub const DELETE_RECORD: &str = r#"
    DELETE FROM records WHERE collection = $1 AND id = $2
    RETURNING id, body, created_at, updated_at
"#;
