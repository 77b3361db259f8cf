//! Permission evaluation.
//!
//! - No IO
//! - No panics
//! - No caching (permissions may change between two calls on the same page)

use serde::Serialize;

use crate::{Permission, Requirement, Role, Session};

/// Decide whether `session` satisfies `requirement`.
///
/// Rules, in order:
/// 1. `Requirement::None` always passes, with or without a session.
/// 2. No session: deny.
/// 3. Administrators pass unconditionally, even with no permission set. This
///    is an intentional bypass: the clinic's administrators manage the
///    permission catalog itself and must never lock themselves out.
/// 4. Absent or empty permission set: deny.
/// 5. Otherwise the requirement is matched against the granted set.
pub fn evaluate(requirement: &Requirement, session: Option<&Session>) -> bool {
    if requirement.is_none() {
        return true;
    }

    let Some(session) = session else {
        return false;
    };

    if session.is_administrator() {
        return true;
    }

    match session.granted() {
        Some(granted) => requirement.is_satisfied_by(granted),
        None => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why [`evaluate`] answered the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    /// The requirement was `None`.
    NoRequirement,
    /// There is no authenticated session.
    NoSession,
    /// The user is an administrator.
    AdministratorBypass,
    /// The session carries no permissions at all.
    NoPermissions,
    /// The first required permission found in the user's set.
    GrantedBy { permission: Permission },
    /// None of the required permissions are held.
    MissingPermission { required: Vec<Permission> },
}

/// Detailed, serializable account of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// Human-readable form of the requirement that was checked.
    pub requirement: String,

    pub granted: bool,

    pub reason: DecisionReason,

    /// Role of the session user, if any.
    pub role: Option<Role>,

    /// Permissions the session held at decision time (sorted).
    pub effective_permissions: Vec<String>,
}

impl Decision {
    /// Short message suitable for a notification or a locked menu entry.
    pub fn message(&self) -> String {
        match &self.reason {
            DecisionReason::NoRequirement => "no permission required".to_string(),
            DecisionReason::NoSession => "not signed in".to_string(),
            DecisionReason::AdministratorBypass => "administrator".to_string(),
            DecisionReason::NoPermissions => "no permissions loaded for this user".to_string(),
            DecisionReason::GrantedBy { permission } => format!("granted by '{permission}'"),
            DecisionReason::MissingPermission { required } => {
                let names: Vec<&str> = required.iter().map(|p| p.as_str()).collect();
                format!("missing permission: {}", names.join(" or "))
            }
        }
    }
}

/// Explain the decision [`evaluate`] makes for the same inputs.
///
/// `explain(r, s).granted == evaluate(r, s)` for every input.
pub fn explain(requirement: &Requirement, session: Option<&Session>) -> Decision {
    let role = session.map(|s| s.role());
    let effective_permissions: Vec<String> = session
        .and_then(|s| s.permissions.as_ref())
        .map(|set| set.iter().map(|p| p.as_str().to_string()).collect())
        .unwrap_or_default();

    let (granted, reason) = if requirement.is_none() {
        (true, DecisionReason::NoRequirement)
    } else {
        match session {
            None => (false, DecisionReason::NoSession),
            Some(s) if s.is_administrator() => (true, DecisionReason::AdministratorBypass),
            Some(s) => match s.granted() {
                None => (false, DecisionReason::NoPermissions),
                Some(granted) => match requirement.permissions().iter().find(|p| granted.contains(p)) {
                    Some(p) => (true, DecisionReason::GrantedBy { permission: p.clone() }),
                    None => (
                        false,
                        DecisionReason::MissingPermission {
                            required: requirement.permissions().to_vec(),
                        },
                    ),
                },
            },
        }
    };

    Decision {
        requirement: requirement.to_string(),
        granted,
        reason,
        role,
        effective_permissions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermissionSet, User};
    use policlinico_core::UserId;
    use proptest::prelude::*;

    fn session(role: Role, permissions: Option<&[&'static str]>) -> Session {
        let user = User::new(UserId::new(1), "Test User", "test@policlinico.cl", role);
        Session::new(
            user,
            "token-1",
            permissions.map(|ps| ps.iter().copied().collect::<PermissionSet>()),
        )
    }

    #[test]
    fn none_passes_without_session() {
        assert!(evaluate(&Requirement::None, None));
    }

    #[test]
    fn single_permission_membership() {
        let s = session(Role::Admission, Some(&["patients.view"]));
        assert!(evaluate(&Requirement::single("patients.view"), Some(&s)));
        assert!(!evaluate(&Requirement::single("empresas.view"), Some(&s)));
    }

    #[test]
    fn any_of_needs_one_alternative() {
        let with_b = session(Role::Doctor, Some(&["b"]));
        let empty = session(Role::Doctor, Some(&[]));
        let req = Requirement::any_of(["a", "b"]);

        assert!(evaluate(&req, Some(&with_b)));
        assert!(!evaluate(&req, Some(&empty)));
    }

    #[test]
    fn absent_permissions_deny_non_admins() {
        let s = session(Role::Technician, None);
        assert!(!evaluate(&Requirement::single("exams.view"), Some(&s)));
        assert!(evaluate(&Requirement::None, Some(&s)));
    }

    #[test]
    fn missing_session_denies() {
        assert!(!evaluate(&Requirement::single("patients.view"), None));
        assert_eq!(
            explain(&Requirement::single("patients.view"), None).reason,
            DecisionReason::NoSession
        );
    }

    #[test]
    fn administrator_bypasses_even_without_permissions() {
        let s = session(Role::Administrator, None);
        assert!(evaluate(&Requirement::single("backup.execute"), Some(&s)));
        assert_eq!(
            explain(&Requirement::single("backup.execute"), Some(&s)).reason,
            DecisionReason::AdministratorBypass
        );
    }

    #[test]
    fn explain_names_the_granting_permission() {
        let s = session(Role::Doctor, Some(&["doctors.view"]));
        let decision = explain(&Requirement::any_of(["staff.view", "doctors.view"]), Some(&s));
        assert!(decision.granted);
        assert_eq!(decision.message(), "granted by 'doctors.view'");
    }

    #[test]
    fn explain_lists_missing_alternatives() {
        let s = session(Role::Company, Some(&["results.view"]));
        let decision = explain(&Requirement::any_of(["staff.view", "doctors.view"]), Some(&s));
        assert!(!decision.granted);
        assert_eq!(decision.message(), "missing permission: staff.view or doctors.view");
        assert_eq!(decision.effective_permissions, vec!["results.view".to_string()]);
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn permission_strategy() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["a", "b", "c", "d", "patients.view", "exams.view"])
            .prop_map(str::to_string)
    }

    fn requirement_strategy() -> impl Strategy<Value = Requirement> {
        prop_oneof![
            Just(Requirement::None),
            permission_strategy().prop_map(Requirement::single),
            prop::collection::vec(permission_strategy(), 0..4).prop_map(Requirement::any_of),
        ]
    }

    fn session_strategy() -> impl Strategy<Value = Option<Session>> {
        let permissions = prop::option::of(prop::collection::vec(permission_strategy(), 0..5));
        prop::option::of((role_strategy(), permissions).prop_map(|(role, perms)| {
            let user = User::new(UserId::new(9), "P", "p@policlinico.cl", role);
            Session::new(user, "t", perms.map(|ps| ps.into_iter().collect::<PermissionSet>()))
        }))
    }

    proptest! {
        #[test]
        fn administrators_are_always_allowed(
            requirement in requirement_strategy(),
            perms in prop::option::of(prop::collection::vec(permission_strategy(), 0..5)),
        ) {
            let user = User::new(UserId::new(1), "Admin", "admin@policlinico.cl", Role::Administrator);
            let s = Session::new(user, "t", perms.map(|ps| ps.into_iter().collect::<PermissionSet>()));
            prop_assert!(evaluate(&requirement, Some(&s)));
        }

        #[test]
        fn none_is_always_allowed(session in session_strategy()) {
            prop_assert!(evaluate(&Requirement::None, session.as_ref()));
        }

        #[test]
        fn explain_agrees_with_evaluate(
            requirement in requirement_strategy(),
            session in session_strategy(),
        ) {
            prop_assert_eq!(
                explain(&requirement, session.as_ref()).granted,
                evaluate(&requirement, session.as_ref())
            );
        }

        #[test]
        fn evaluate_is_deterministic(
            requirement in requirement_strategy(),
            session in session_strategy(),
        ) {
            let first = evaluate(&requirement, session.as_ref());
            prop_assert_eq!(first, evaluate(&requirement, session.as_ref()));
        }
    }
}
