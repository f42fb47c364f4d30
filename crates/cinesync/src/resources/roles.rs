use cinesync_core::cinema::{require_text, CreateRole, Role, UpdateRole, ValidationError};
use cinesync_core::store::Order;

use crate::collection::Resource;

/// Account roles (`rol`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Roles;

impl Resource for Roles {
    type Record = Role;
    type Create = CreateRole;
    type Patch = UpdateRole;

    const TABLE: &'static str = "rol";
    const PRIMARY_KEY: &'static str = "rol_id";

    fn order(&self) -> Vec<Order> {
        vec![Order::asc("rol_id")]
    }

    fn prepare_create(&self, input: CreateRole) -> Result<CreateRole, ValidationError> {
        require_text("name", &input.name)?;
        Ok(input)
    }

    fn prepare_patch(&self, patch: UpdateRole) -> Result<UpdateRole, ValidationError> {
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }
        Ok(patch)
    }
}
