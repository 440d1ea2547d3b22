use crate::model::common::role::Role;

/// A class of users that a route admits.
pub trait Rights {
    /// Does a user with this role belong to the class?
    fn permits(role: Role) -> bool;
}

/// Any authenticated user.
pub enum Anyone {}

/// Global and local administrators.
pub enum Admin {}

/// Voters only.
pub enum Voter {}

impl Rights for Anyone {
    fn permits(_role: Role) -> bool {
        true
    }
}

impl Rights for Admin {
    fn permits(role: Role) -> bool {
        role.is_admin()
    }
}

impl Rights for Voter {
    fn permits(role: Role) -> bool {
        match role {
            Role::Voter => true,
            Role::GlobalAdmin | Role::LocalAdmin => false,
        }
    }
}
