//! Database row types — these map directly to SQLite rows.
//! Distinct from laurel-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub confirmation_code: String,
    pub created_at: String,
}

/// Category or genre: the two share one shape.
pub struct SlugRow {
    pub id: String,
    pub name: String,
    pub slug: String,
}

pub struct TitleRow {
    pub id: String,
    pub name: String,
    pub year: i64,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    /// AVG(score) over the title's reviews, computed by the read query.
    pub rating: Option<f64>,
}

/// One genre attached to one title, for batch expansion of listings.
pub struct TitleGenreRow {
    pub title_id: String,
    pub name: String,
    pub slug: String,
}

pub struct ReviewRow {
    pub id: String,
    pub title_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub score: i64,
    pub pub_date: String,
}

pub struct CommentRow {
    pub id: String,
    pub review_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub pub_date: String,
}
