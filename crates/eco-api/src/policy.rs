use axum::http::StatusCode;

use crate::auth::{AuthContext, ROLE_ADMIN};
use crate::{ApiError, ApiResult};

/// Strict ownership: only the user who posted the entity may act. No admin
/// override, matching food/e-waste update and delete.
pub(crate) fn require_owner(actor: &AuthContext, owner_id: &str) -> ApiResult<()> {
    if actor.user_id == owner_id {
        return Ok(());
    }
    Err(forbidden("not authorized"))
}

/// Creator-or-admin: volunteer event delete/complete/attendance.
pub(crate) fn require_owner_or_admin(actor: &AuthContext, owner_id: &str) -> ApiResult<()> {
    if actor.user_id == owner_id || actor.role == ROLE_ADMIN {
        return Ok(());
    }
    Err(forbidden("not authorized"))
}

/// Unclaim is open to the claimer, the original donor, or an admin.
pub(crate) fn require_unclaim_party(
    actor: &AuthContext,
    donated_by: &str,
    claimed_by: Option<&str>,
) -> ApiResult<()> {
    let is_claimer = claimed_by == Some(actor.user_id.as_str());
    let is_donor = actor.user_id == donated_by;
    if is_claimer || is_donor || actor.role == ROLE_ADMIN {
        return Ok(());
    }
    Err(forbidden("not authorized to unclaim this item"))
}

fn forbidden(message: &str) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(user_id: &str, role: &str) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn owner_check_has_no_admin_override() {
        assert!(require_owner(&actor("u1", "student"), "u1").is_ok());
        assert!(require_owner(&actor("u2", "admin"), "u1").is_err());
    }

    #[test]
    fn owner_or_admin_accepts_either() {
        assert!(require_owner_or_admin(&actor("u1", "student"), "u1").is_ok());
        assert!(require_owner_or_admin(&actor("u2", "admin"), "u1").is_ok());
        assert!(require_owner_or_admin(&actor("u2", "ngo"), "u1").is_err());
    }

    #[test]
    fn unclaim_party_is_claimer_donor_or_admin() {
        assert!(require_unclaim_party(&actor("claimer", "student"), "donor", Some("claimer")).is_ok());
        assert!(require_unclaim_party(&actor("donor", "student"), "donor", Some("claimer")).is_ok());
        assert!(require_unclaim_party(&actor("other", "admin"), "donor", Some("claimer")).is_ok());
        assert!(require_unclaim_party(&actor("other", "student"), "donor", Some("claimer")).is_err());
        assert!(require_unclaim_party(&actor("other", "student"), "donor", None).is_err());
    }
}
