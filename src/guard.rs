//! Validation gate for the self-service profile/role update.
//!
//! The whole request is checked in one pass and either yields a complete
//! `ProfileUpdate` or a single aggregated `ValidationError`; there is no
//! partially-valid outcome to persist.

use crate::{
    error::ValidationError,
    models::{ProfileUpdate, Role, UserUpdateRequest},
};

/// Validates a `PUT /users/{id}` request made by `caller_id`.
///
/// Rules:
/// - the path id must be an integer equal to the caller's subject id, and a
///   non-empty body id must agree with it;
/// - first name, last name, email, the caller's current role and the requested
///   new role must all be present, roles as integers;
/// - a caller whose current role is admin (`1`) may not request any other role.
///
/// A non-admin asking for role `1` is not rejected here.
pub fn validate_update(
    path_id: &str,
    caller_id: i64,
    req: &UserUpdateRequest,
) -> Result<ProfileUpdate, ValidationError> {
    let mut errors = Vec::new();

    let target_id = match path_id.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push("user id must be an integer".to_string());
            None
        }
    };
    if let Some(id) = target_id {
        if id != caller_id {
            tracing::warn!(
                security_event = "cross_user_update",
                caller = caller_id,
                target = id,
                "user attempted to update another user"
            );
            errors.push("you may only update your own user".to_string());
        }
        let body_id = req.user.id.trim();
        if !body_id.is_empty() && body_id.parse::<i64>().ok() != Some(id) {
            errors.push("user id in body does not match the path".to_string());
        }
    }

    let user = &req.user;
    if user.first_name.trim().is_empty() {
        errors.push("first name is required".to_string());
    }
    if user.last_name.trim().is_empty() {
        errors.push("last name is required".to_string());
    }
    if user.email.trim().is_empty() {
        errors.push("email is required".to_string());
    } else if !user.email.contains('@') {
        errors.push("invalid email format".to_string());
    }

    let current_role = parse_role(&req.role, "logged in user role", &mut errors);
    let new_role = parse_role(&user.role, "new role", &mut errors);

    if let (Some(current), Some(new)) = (current_role, new_role) {
        if current.is_admin() && !new.is_admin() {
            tracing::warn!(
                security_event = "admin_role_change",
                caller = caller_id,
                requested = %new,
                "admin attempted to change their own role"
            );
            errors.push("user is already an admin, cannot decrease permission".to_string());
        }
    }

    match (target_id, new_role) {
        (Some(id), Some(role)) if errors.is_empty() => Ok(ProfileUpdate {
            id,
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            email: user.email.trim().to_string(),
            role,
            email_notification: user.email_notification,
        }),
        _ => Err(ValidationError(errors)),
    }
}

fn parse_role(raw: &str, field: &str, errors: &mut Vec<String>) -> Option<Role> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push(format!("{field} is required"));
        return None;
    }
    match raw.parse::<i32>() {
        Ok(value) => Some(Role(value)),
        Err(_) => {
            errors.push(format!("{field} must be an integer"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserUpdate;

    fn request(current: &str, new: &str) -> UserUpdateRequest {
        UserUpdateRequest {
            user: UserUpdate {
                id: String::new(),
                first_name: "Kyler".into(),
                last_name: "Jacobson".into(),
                email: "kyler@example.com".into(),
                role: new.into(),
                email_notification: true,
            },
            role: current.into(),
        }
    }

    #[test]
    fn accepts_a_valid_self_update() {
        let update = validate_update("42", 42, &request("0", "2")).unwrap();
        assert_eq!(update.id, 42);
        assert_eq!(update.role, Role(2));
        assert!(update.email_notification);
    }

    #[test]
    fn admin_may_keep_admin() {
        assert!(validate_update("42", 42, &request("1", "1")).is_ok());
    }

    #[test]
    fn admin_may_not_move_to_another_role() {
        let err = validate_update("42", 42, &request("1", "0")).unwrap_err();
        assert_eq!(
            err.0,
            vec!["user is already an admin, cannot decrease permission".to_string()]
        );
    }

    #[test]
    fn non_admin_self_grant_is_not_blocked() {
        let update = validate_update("42", 42, &request("0", "1")).unwrap();
        assert_eq!(update.role, Role::ADMIN);
    }

    #[test]
    fn other_targets_are_rejected_regardless_of_roles() {
        for (current, new) in [("0", "0"), ("1", "1"), ("2", "0")] {
            let err = validate_update("7", 42, &request(current, new)).unwrap_err();
            assert!(err.0.contains(&"you may only update your own user".to_string()));
        }
    }

    #[test]
    fn missing_fields_are_aggregated() {
        let req = UserUpdateRequest::default();
        let err = validate_update("abc", 42, &req).unwrap_err();
        assert_eq!(
            err.0,
            vec![
                "user id must be an integer",
                "first name is required",
                "last name is required",
                "email is required",
                "logged in user role is required",
                "new role is required",
            ]
        );
    }

    #[test]
    fn non_integer_roles_are_rejected() {
        let err = validate_update("42", 42, &request("admin", "x")).unwrap_err();
        assert_eq!(
            err.0,
            vec![
                "logged in user role must be an integer",
                "new role must be an integer"
            ]
        );
    }

    #[test]
    fn body_id_must_match_path() {
        let mut req = request("0", "0");
        req.user.id = "7".into();
        let err = validate_update("42", 42, &req).unwrap_err();
        assert_eq!(err.0, vec!["user id in body does not match the path"]);
    }
}
