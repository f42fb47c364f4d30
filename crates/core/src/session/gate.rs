use crate::cinema::User;

use super::SessionError;

pub const CURRENT_USER_KEY: &str = "currentUser";
pub const IS_AUTHENTICATED_KEY: &str = "isAuthenticated";
pub const REMEMBER_ME_KEY: &str = "rememberMe";

/// Decides the admin gate from the two raw session values.
///
/// Both keys must be present, the flag must be exactly `"true"` and the
/// stored user must carry the administrator role.
pub fn check_admin(
    current_user: Option<&str>,
    is_authenticated: Option<&str>,
) -> Result<User, SessionError> {
    let (Some(raw), Some("true")) = (current_user, is_authenticated) else {
        return Err(SessionError::NotAuthenticated);
    };
    let user: User =
        serde_json::from_str(raw).map_err(|e| SessionError::Corrupted(e.to_string()))?;
    if !user.is_admin() {
        return Err(SessionError::NotAdmin);
    }
    Ok(user)
}

/// Stored passwords are compared as-is.
pub fn credentials_match(user: &User, email: &str, password: &str) -> bool {
    user.email.eq_ignore_ascii_case(email.trim()) && user.password_hash == password
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_json(role: &str) -> String {
        json!({
            "usuario_id": 1,
            "cedula": "0102030405",
            "rol_id": 1,
            "nombres": "Ana",
            "apellidos": "Paz",
            "email": "ana@example.com",
            "tipo_usuario": "trabajador",
            "password_hash": "secret1",
            "rol": {"nombre": role}
        })
        .to_string()
    }

    #[test]
    fn test_admin_passes() {
        let raw = user_json("Administrador");
        let user = check_admin(Some(&raw), Some("true")).unwrap();
        assert_eq!(user.id, 1);
    }

    #[test]
    fn test_missing_keys_rejected() {
        let raw = user_json("administrador");
        assert_eq!(
            check_admin(None, Some("true")).unwrap_err(),
            SessionError::NotAuthenticated
        );
        assert_eq!(
            check_admin(Some(&raw), None).unwrap_err(),
            SessionError::NotAuthenticated
        );
        assert_eq!(
            check_admin(Some(&raw), Some("false")).unwrap_err(),
            SessionError::NotAuthenticated
        );
    }

    #[test]
    fn test_non_admin_rejected() {
        let raw = user_json("trabajador");
        assert_eq!(
            check_admin(Some(&raw), Some("true")).unwrap_err(),
            SessionError::NotAdmin
        );
    }

    #[test]
    fn test_corrupted_user_rejected() {
        let result = check_admin(Some("{not json"), Some("true"));
        assert!(matches!(result, Err(SessionError::Corrupted(_))));
    }

    #[test]
    fn test_credentials_match() {
        let user: User = serde_json::from_str(&user_json("administrador")).unwrap();
        assert!(credentials_match(&user, "ANA@example.com ", "secret1"));
        assert!(!credentials_match(&user, "ana@example.com", "secret"));
    }
}
