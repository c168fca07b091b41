//! SQL schema for the Tandem SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 strings (microseconds, `Z` suffix) so
/// that string comparison orders them chronologically.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    name        TEXT,
    image       TEXT,
    created_at  TEXT NOT NULL
);

-- Written by the identity provider; the core only reads it.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,   -- hex SHA-256 of the bearer token
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    created_at   TEXT NOT NULL
);

-- Two-party chats. The normalised pair columns back the one-chat-per-pair
-- rule with a constraint the database enforces on its own.
CREATE TABLE IF NOT EXISTS chats (
    chat_id     TEXT PRIMARY KEY,
    user_low    TEXT NOT NULL REFERENCES users(user_id),
    user_high   TEXT NOT NULL REFERENCES users(user_id),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_low, user_high),
    CHECK  (user_low < user_high)
);

CREATE TABLE IF NOT EXISTS chat_participants (
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    chat_id      TEXT NOT NULL REFERENCES chats(chat_id),
    last_read_at TEXT,
    PRIMARY KEY (user_id, chat_id)
);

-- Messages are never updated or deleted.
CREATE TABLE IF NOT EXISTS messages (
    message_id  TEXT PRIMARY KEY,
    chat_id     TEXT NOT NULL REFERENCES chats(chat_id),
    author_id   TEXT REFERENCES users(user_id),
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    is_system   INTEGER NOT NULL DEFAULT 0,
    CHECK (is_system = 0 OR author_id IS NULL)
);

CREATE TABLE IF NOT EXISTS photo_likes (
    liker_id      TEXT NOT NULL REFERENCES users(user_id),
    liked_user_id TEXT NOT NULL REFERENCES users(user_id),
    created_at    TEXT NOT NULL,
    PRIMARY KEY (liker_id, liked_user_id),
    CHECK (liker_id != liked_user_id)
);

CREATE TABLE IF NOT EXISTS bookmarks (
    bookmarker_id      TEXT NOT NULL REFERENCES users(user_id),
    bookmarked_user_id TEXT NOT NULL REFERENCES users(user_id),
    created_at         TEXT NOT NULL,
    PRIMARY KEY (bookmarker_id, bookmarked_user_id),
    CHECK (bookmarker_id != bookmarked_user_id)
);

CREATE INDEX IF NOT EXISTS messages_chat_created_idx ON messages(chat_id, created_at);
CREATE INDEX IF NOT EXISTS participants_chat_idx     ON chat_participants(chat_id);
CREATE INDEX IF NOT EXISTS likes_liked_idx           ON photo_likes(liked_user_id);

PRAGMA user_version = 1;
";
