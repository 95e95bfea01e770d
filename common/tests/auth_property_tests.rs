// Property-based tests for JWT handling and role permissions

use common::auth::JwtService;
use common::models::UserRole;
use proptest::prelude::*;

const ROLES: [UserRole; 6] = [
    UserRole::Patient,
    UserRole::Doctor,
    UserRole::Admin,
    UserRole::ClinicAdmin,
    UserRole::Nurse,
    UserRole::Receptionist,
];

// Property: encoding then decoding a token preserves subject, username,
// role, and the derived permission set.
#[test]
fn property_jwt_round_trip_preserves_claims() {
    proptest!(|(
        username in "[a-z][a-z0-9._-]{2,20}",
        role_index in 0..ROLES.len(),
    )| {
        let service = JwtService::new("property-test-secret", 24);
        let role = ROLES[role_index];
        let user_id = uuid::Uuid::new_v4().to_string();

        let token = service
            .encode_token(&user_id, &username, role)
            .expect("encoding should succeed");
        let claims = service.decode_token(&token).expect("decoding should succeed");

        prop_assert_eq!(claims.sub, user_id);
        prop_assert_eq!(claims.username, username);
        prop_assert_eq!(claims.role, role);
        prop_assert_eq!(claims.permissions, role.permissions());
    });
}

// Property: tokens never validate under a different secret.
#[test]
fn property_jwt_rejects_foreign_secret() {
    proptest!(|(
        secret_a in "[a-f0-9]{16,32}",
        secret_b in "[g-z0-9]{16,32}",
    )| {
        let issuer = JwtService::new(&secret_a, 24);
        let verifier = JwtService::new(&secret_b, 24);

        let token = issuer
            .encode_token("user-1", "pat.doe", UserRole::Patient)
            .expect("encoding should succeed");

        prop_assert!(verifier.decode_token(&token).is_err());
    });
}

// Property: every role derives a non-empty, sorted, duplicate-free
// permission set that includes the base browsing permissions.
#[test]
fn property_permission_sets_are_well_formed() {
    for role in ROLES {
        let permissions = role.permissions();
        assert!(!permissions.is_empty(), "{role} has no permissions");

        let mut sorted = permissions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(permissions, sorted, "{role} permissions not sorted/deduped");

        for base in ["profile:read", "symptom:read", "department:read"] {
            assert!(
                permissions.contains(&base.to_string()),
                "{role} is missing base permission {base}"
            );
        }
    }
}

// Property: the admin permission set is a superset of every other role's
// set, minus the patient-only intake permissions.
#[test]
fn property_admin_covers_staff_permissions() {
    let admin: std::collections::HashSet<String> =
        UserRole::Admin.permissions().into_iter().collect();

    for role in [UserRole::Doctor, UserRole::Nurse, UserRole::ClinicAdmin] {
        for permission in role.permissions() {
            assert!(
                admin.contains(&permission),
                "admin is missing {permission} held by {role}"
            );
        }
    }
}
