use rusqlite::{Connection, OptionalExtension};

use crate::models::{SlugRow, TitleGenreRow, TitleRow};
use crate::{Database, DbError, DbResult};

/// Optional filters for title listings, mirroring the public query surface.
#[derive(Debug, Default)]
pub struct TitleFilter {
    /// Category slug, exact.
    pub category: Option<String>,
    /// Genre slug, exact.
    pub genre: Option<String>,
    pub year: Option<i64>,
    /// Substring match on the title name.
    pub name: Option<String>,
}

const TITLE_SELECT: &str = "
    SELECT t.id, t.name, t.year, t.description, t.category_id, c.name, c.slug, AVG(r.score)
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    LEFT JOIN reviews r ON r.title_id = t.id";

impl Database {
    // -- Categories --

    pub fn create_category(&self, id: &str, name: &str, slug: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name, slug) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, slug],
            )?;
            Ok(())
        })
    }

    pub fn get_category_by_slug(&self, slug: &str) -> DbResult<Option<SlugRow>> {
        self.with_conn(|conn| query_slug_row(conn, "categories", slug))
    }

    pub fn list_categories(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<SlugRow>> {
        self.with_conn(|conn| list_slug_rows(conn, "categories", search, limit, offset))
    }

    pub fn delete_category(&self, slug: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM categories WHERE slug = ?1", [slug])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    // -- Genres --

    pub fn create_genre(&self, id: &str, name: &str, slug: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO genres (id, name, slug) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, slug],
            )?;
            Ok(())
        })
    }

    pub fn get_genre_by_slug(&self, slug: &str) -> DbResult<Option<SlugRow>> {
        self.with_conn(|conn| query_slug_row(conn, "genres", slug))
    }

    pub fn list_genres(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<SlugRow>> {
        self.with_conn(|conn| list_slug_rows(conn, "genres", search, limit, offset))
    }

    pub fn delete_genre(&self, slug: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM genres WHERE slug = ?1", [slug])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    // -- Titles --

    pub fn create_title(
        &self,
        id: &str,
        name: &str,
        year: i64,
        description: Option<&str>,
        category_id: Option<&str>,
        genre_ids: &[String],
    ) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO titles (id, name, year, description, category_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, year, description, category_id],
            )?;
            for genre_id in genre_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO title_genres (title_id, genre_id) VALUES (?1, ?2)",
                    rusqlite::params![id, genre_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Full-row overwrite; callers merge partial updates beforehand.
    /// `genre_ids: Some(..)` replaces the whole genre set.
    pub fn update_title(
        &self,
        id: &str,
        name: &str,
        year: i64,
        description: Option<&str>,
        category_id: Option<&str>,
        genre_ids: Option<&[String]>,
    ) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE titles
                 SET name = ?2, year = ?3, description = ?4, category_id = ?5
                 WHERE id = ?1",
                rusqlite::params![id, name, year, description, category_id],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            if let Some(genre_ids) = genre_ids {
                tx.execute("DELETE FROM title_genres WHERE title_id = ?1", [id])?;
                for genre_id in genre_ids {
                    tx.execute(
                        "INSERT OR IGNORE INTO title_genres (title_id, genre_id) VALUES (?1, ?2)",
                        rusqlite::params![id, genre_id],
                    )?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn title_exists(&self, id: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM titles WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Single title with its category and the rating aggregate. The AVG runs
    /// inside the read so the value always reflects the current review set.
    pub fn get_title(&self, id: &str) -> DbResult<Option<TitleRow>> {
        self.with_conn(|conn| {
            let sql = format!("{TITLE_SELECT} WHERE t.id = ?1 GROUP BY t.id");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_title).optional()?;
            Ok(row)
        })
    }

    pub fn list_titles(
        &self,
        filter: &TitleFilter,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<TitleRow>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(slug) = &filter.category {
                clauses.push("c.slug = ?");
                args.push(Box::new(slug.clone()));
            }
            if let Some(slug) = &filter.genre {
                clauses.push(
                    "EXISTS (SELECT 1 FROM title_genres tg
                             JOIN genres g ON g.id = tg.genre_id
                             WHERE tg.title_id = t.id AND g.slug = ?)",
                );
                args.push(Box::new(slug.clone()));
            }
            if let Some(year) = filter.year {
                clauses.push("t.year = ?");
                args.push(Box::new(year));
            }
            if let Some(name) = &filter.name {
                clauses.push("t.name LIKE '%' || ? || '%'");
                args.push(Box::new(name.clone()));
            }

            let mut sql = TITLE_SELECT.to_string();
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" GROUP BY t.id ORDER BY t.year DESC, t.name LIMIT ? OFFSET ?");
            args.push(Box::new(limit));
            args.push(Box::new(offset));

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                args.iter().map(|a| a.as_ref()).collect();
            let rows = stmt
                .query_map(params.as_slice(), map_title)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch genres for a set of title IDs.
    pub fn genres_for_titles(&self, title_ids: &[String]) -> DbResult<Vec<TitleGenreRow>> {
        if title_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=title_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT tg.title_id, g.name, g.slug
                 FROM title_genres tg
                 JOIN genres g ON g.id = tg.genre_id
                 WHERE tg.title_id IN ({})
                 ORDER BY g.name",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = title_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(TitleGenreRow {
                        title_id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Cascades to the title's reviews and their comments.
    pub fn delete_title(&self, id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM titles WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }
}

fn query_slug_row(conn: &Connection, table: &str, slug: &str) -> DbResult<Option<SlugRow>> {
    let sql = format!("SELECT id, name, slug FROM {table} WHERE slug = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([slug], map_slug_row).optional()?;
    Ok(row)
}

fn list_slug_rows(
    conn: &Connection,
    table: &str,
    search: Option<&str>,
    limit: u32,
    offset: u32,
) -> DbResult<Vec<SlugRow>> {
    let search_name;
    let (sql, args) = match search {
        Some(name) => {
            search_name = name;
            (
                format!(
                    "SELECT id, name, slug FROM {table} WHERE name = ?1
                     ORDER BY name LIMIT ?2 OFFSET ?3"
                ),
                rusqlite::params![search_name, limit, offset].to_vec(),
            )
        }
        None => (
            format!("SELECT id, name, slug FROM {table} ORDER BY name LIMIT ?1 OFFSET ?2"),
            rusqlite::params![limit, offset].to_vec(),
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args.as_slice(), map_slug_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_slug_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SlugRow> {
    Ok(SlugRow {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
    })
}

fn map_title(row: &rusqlite::Row<'_>) -> rusqlite::Result<TitleRow> {
    Ok(TitleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        description: row.get(3)?,
        category_id: row.get(4)?,
        category_name: row.get(5)?,
        category_slug: row.get(6)?,
        rating: row.get(7)?,
    })
}
