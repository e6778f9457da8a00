use serde::{Deserialize, Serialize};

pub type ActorId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    DeviceAdmin,
    /// Satisfies every role requirement and may decide any leave request.
    SuperAdmin,
}

text_enum!(Role {
    Employee => "employee",
    DeviceAdmin => "device_admin",
    SuperAdmin => "super_admin",
});

/// An employee as resolved by the actor directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
    pub supervisor_id: Option<ActorId>,
    pub active: bool,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self {
            id,
            role,
            supervisor_id: None,
            active: true,
        }
    }

    pub fn reporting_to(mut self, supervisor_id: ActorId) -> Self {
        self.supervisor_id = Some(supervisor_id);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role == Role::SuperAdmin || roles.contains(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_should_satisfy_any_role() {
        let admin = Actor::new(1, Role::SuperAdmin);
        assert!(admin.has_any_role(&[Role::DeviceAdmin]));
        assert!(admin.has_any_role(&[]));

        let employee = Actor::new(2, Role::Employee);
        assert!(!employee.has_any_role(&[Role::DeviceAdmin]));
    }

    #[test]
    fn role_should_round_trip_through_text() {
        assert_eq!("device_admin".parse::<Role>().unwrap(), Role::DeviceAdmin);
        assert_eq!(Role::SuperAdmin.to_string(), "super_admin");
        assert!("manager".parse::<Role>().is_err());
    }
}
