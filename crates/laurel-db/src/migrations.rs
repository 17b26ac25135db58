use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                TEXT PRIMARY KEY,
            username          TEXT NOT NULL UNIQUE,
            email             TEXT NOT NULL UNIQUE,
            role              TEXT NOT NULL DEFAULT 'user'
                              CHECK (role IN ('user', 'moderator', 'admin')),
            first_name        TEXT NOT NULL DEFAULT '',
            last_name         TEXT NOT NULL DEFAULT '',
            bio               TEXT NOT NULL DEFAULT '',
            confirmation_code TEXT NOT NULL DEFAULT '',
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS categories (
            id   TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS genres (
            id   TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        );

        -- Deleting a category must orphan its titles, not remove them.
        CREATE TABLE IF NOT EXISTS titles (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            year        INTEGER NOT NULL CHECK (year >= 1888),
            description TEXT,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_titles_category
            ON titles(category_id);

        CREATE TABLE IF NOT EXISTS title_genres (
            title_id TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
            genre_id TEXT NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
            PRIMARY KEY (title_id, genre_id)
        );

        -- UNIQUE(title_id, author_id) is the durable backstop for the
        -- one-review-per-author rule; the API pre-check alone is racy.
        CREATE TABLE IF NOT EXISTS reviews (
            id        TEXT PRIMARY KEY,
            title_id  TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
            author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text      TEXT NOT NULL,
            score     INTEGER NOT NULL CHECK (score BETWEEN 1 AND 10),
            pub_date  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (title_id, author_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_title
            ON reviews(title_id, pub_date);

        CREATE TABLE IF NOT EXISTS comments (
            id        TEXT PRIMARY KEY,
            review_id TEXT NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
            author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text      TEXT NOT NULL,
            pub_date  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_comments_review
            ON comments(review_id, pub_date);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
