/*
 * Responsibility
 * - /admin 系の request DTO
 */
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub role: String,
}

impl SetRoleRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.uid.trim().is_empty() || self.role.trim().is_empty() {
            return Err("UID and role are required");
        }
        Ok(())
    }
}
