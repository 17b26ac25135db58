use rusqlite::OptionalExtension;

use crate::models::{CommentRow, ReviewRow};
use crate::{Database, DbError, DbResult};

impl Database {
    // -- Reviews --

    /// Inserts a review; `pub_date` comes from the schema default and never
    /// changes afterwards. The (title, author) UNIQUE constraint surfaces as
    /// `DbError::Conflict` when a concurrent submission won the race.
    pub fn insert_review(
        &self,
        id: &str,
        title_id: &str,
        author_id: &str,
        text: &str,
        score: i64,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reviews (id, title_id, author_id, text, score)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, title_id, author_id, text, score],
            )?;
            Ok(())
        })
    }

    pub fn author_has_review(&self, title_id: &str, author_id: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM reviews WHERE title_id = ?1 AND author_id = ?2",
                    rusqlite::params![title_id, author_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Review scoped to its title, so a review id under the wrong title
    /// resolves to nothing.
    pub fn get_review(&self, title_id: &str, review_id: &str) -> DbResult<Option<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.title_id, r.author_id, u.username, r.text, r.score, r.pub_date
                 FROM reviews r
                 JOIN users u ON u.id = r.author_id
                 WHERE r.id = ?1 AND r.title_id = ?2",
            )?;
            let row = stmt
                .query_row(rusqlite::params![review_id, title_id], map_review)
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_reviews(&self, title_id: &str, limit: u32, offset: u32) -> DbResult<Vec<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.title_id, r.author_id, u.username, r.text, r.score, r.pub_date
                 FROM reviews r
                 JOIN users u ON u.id = r.author_id
                 WHERE r.title_id = ?1
                 ORDER BY r.pub_date, r.id
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![title_id, limit, offset], map_review)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_review(&self, review_id: &str, text: &str, score: i64) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reviews SET text = ?2, score = ?3 WHERE id = ?1",
                rusqlite::params![review_id, text, score],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    /// Cascades to the review's comments.
    pub fn delete_review(&self, review_id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM reviews WHERE id = ?1", [review_id])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        review_id: &str,
        author_id: &str,
        text: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, review_id, author_id, text)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, review_id, author_id, text],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, review_id: &str, comment_id: &str) -> DbResult<Option<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.review_id, c.author_id, u.username, c.text, c.pub_date
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.id = ?1 AND c.review_id = ?2",
            )?;
            let row = stmt
                .query_row(rusqlite::params![comment_id, review_id], map_comment)
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_comments(
        &self,
        review_id: &str,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.review_id, c.author_id, u.username, c.text, c.pub_date
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.review_id = ?1
                 ORDER BY c.pub_date, c.id
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![review_id, limit, offset], map_comment)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(&self, comment_id: &str, text: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET text = ?2 WHERE id = ?1",
                rusqlite::params![comment_id, text],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    pub fn delete_comment(&self, comment_id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }
}

fn map_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        title_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        text: row.get(4)?,
        score: row.get(5)?,
        pub_date: row.get(6)?,
    })
}

fn map_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        review_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        text: row.get(4)?,
        pub_date: row.get(5)?,
    })
}
