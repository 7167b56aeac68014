//! Cache key namespaces and their default lifetimes.

pub const USER_PREFIX: &str = "user:";
pub const PROPERTY_PREFIX: &str = "property:";
pub const ORG_PREFIX: &str = "org:";

pub const USER_TTL_SECS: i64 = 1800;
pub const PROPERTY_TTL_SECS: i64 = 3600;
pub const ORG_TTL_SECS: i64 = 7200;

pub fn user_key(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

pub fn property_key(property_id: &str) -> String {
    format!("{}{}", PROPERTY_PREFIX, property_id)
}

pub fn org_key(org_id: &str) -> String {
    format!("{}{}", ORG_PREFIX, org_id)
}
