//! Access decisions as a pure function of (caller, method, target), with no
//! request or framework context. Handlers are the only call sites.

use axum::http::Method;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No valid credential; surfaces as 401.
    Unauthenticated,
    /// Authenticated but lacking role or ownership; surfaces as 403.
    Forbidden,
}

#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Categories, genres, titles: public reads, admin-only writes.
    Catalog,
    /// Reviews and comments: public reads; writes by the author or a
    /// moderator/admin.
    UserContent { author_id: &'a str },
    /// Account administration: admin-only, reads included.
    Accounts,
    /// The caller's own profile.
    SelfProfile,
}

pub fn decide(caller: Option<&Actor>, method: &Method, target: Target<'_>) -> Decision {
    let safe = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    if safe && matches!(target, Target::Catalog | Target::UserContent { .. }) {
        return Decision::Allow;
    }

    let Some(caller) = caller else {
        return Decision::Unauthenticated;
    };

    let allowed = match target {
        Target::Catalog => caller.role.is_admin(),
        Target::UserContent { author_id } => {
            is_author(caller, author_id) || caller.role.can_moderate()
        }
        Target::Accounts => caller.role.is_admin(),
        Target::SelfProfile => true,
    };

    if allowed { Decision::Allow } else { Decision::Forbidden }
}

/// `decide`, mapped onto the error taxonomy for use with `?`.
pub fn authorize(
    caller: Option<&Actor>,
    method: &Method,
    target: Target<'_>,
) -> Result<(), ApiError> {
    match decide(caller, method, target) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(ApiError::Unauthenticated),
        Decision::Forbidden => Err(ApiError::Forbidden),
    }
}

fn is_author(caller: &Actor, author_id: &str) -> bool {
    Uuid::parse_str(author_id).is_ok_and(|id| id == caller.id)
}
