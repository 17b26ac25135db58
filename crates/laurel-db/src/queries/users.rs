use rusqlite::{Connection, OptionalExtension};

use crate::models::UserRow;
use crate::{Database, DbError, DbResult};

const USER_COLUMNS: &str =
    "id, username, email, role, first_name, last_name, bio, confirmation_code, created_at";

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        role: &str,
        first_name: &str,
        last_name: &str,
        bio: &str,
        confirmation_code: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, role, first_name, last_name, bio, confirmation_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, username, email, role, first_name, last_name, bio, confirmation_code],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    /// Admin listing, ordered by username. `search` is an exact-username match.
    pub fn list_users(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let search_username;
            let (sql, args) = match search {
                Some(username) => {
                    search_username = username;
                    let sql = format!(
                        "SELECT {USER_COLUMNS} FROM users WHERE username = ?1
                         ORDER BY username LIMIT ?2 OFFSET ?3"
                    );
                    (sql, rusqlite::params![search_username, limit, offset].to_vec())
                }
                None => {
                    let sql = format!(
                        "SELECT {USER_COLUMNS} FROM users
                         ORDER BY username LIMIT ?1 OFFSET ?2"
                    );
                    (sql, rusqlite::params![limit, offset].to_vec())
                }
            };

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(args.as_slice(), map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Full-row overwrite of the mutable profile fields. Callers merge the
    /// partial update into the existing row first.
    pub fn update_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        role: &str,
        first_name: &str,
        last_name: &str,
        bio: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, role = ?4,
                     first_name = ?5, last_name = ?6, bio = ?7
                 WHERE id = ?1",
                rusqlite::params![id, username, email, role, first_name, last_name, bio],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    pub fn set_confirmation_code(&self, id: &str, code: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET confirmation_code = ?2 WHERE id = ?1",
                rusqlite::params![id, code],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    /// Removes the account; their reviews and comments go with it (CASCADE).
    pub fn delete_user(&self, id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> DbResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        bio: row.get(6)?,
        confirmation_code: row.get(7)?,
        created_at: row.get(8)?,
    })
}
