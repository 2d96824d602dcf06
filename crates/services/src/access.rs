//! Authorization guards shared by the services.

use domains::{Actor, DomainError, Result};
use uuid::Uuid;

pub fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden("admin role required".into()))
    }
}

/// Owners and admins pass.
pub fn require_owner_or_admin(actor: &Actor, owner: Uuid) -> Result<()> {
    if actor.user_id == owner || actor.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "only the submitter or an admin can do this".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::Role;

    #[test]
    fn guards() {
        let owner = Uuid::new_v4();
        let user = Actor {
            user_id: owner,
            role: Role::User,
        };
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            role: Role::User,
        };
        let admin = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };

        assert!(require_admin(&user).is_err());
        assert!(require_admin(&admin).is_ok());
        assert!(require_owner_or_admin(&user, owner).is_ok());
        assert!(require_owner_or_admin(&admin, owner).is_ok());
        assert!(matches!(
            require_owner_or_admin(&stranger, owner),
            Err(DomainError::Forbidden(_))
        ));
    }
}
