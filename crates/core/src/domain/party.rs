use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    CompanyAdmin,
    Transporter,
    Shipper,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::CompanyAdmin => "COMPANY_ADMIN",
            Self::Transporter => "TRANSPORTER",
            Self::Shipper => "SHIPPER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            "ADMIN" => Some(Self::Admin),
            "COMPANY_ADMIN" => Some(Self::CompanyAdmin),
            "TRANSPORTER" => Some(Self::Transporter),
            "SHIPPER" | "USER" => Some(Self::Shipper),
            _ => None,
        }
    }
}

/// The authenticated principal attached to every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub company_id: Option<CompanyId>,
    pub vendor_id: Option<VendorId>,
}

impl Actor {
    pub fn new(
        user_id: UserId,
        role: Role,
        company_id: Option<CompanyId>,
        vendor_id: Option<VendorId>,
    ) -> Self {
        Self { user_id, role, company_id, vendor_id }
    }
}

/// Contact snapshot used when fanning out notifications after a commit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub is_active: bool,
}

impl Vendor {
    pub fn contact(&self) -> Contact {
        Contact {
            name: Some(self.name.clone()),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub company_id: Option<CompanyId>,
    pub vendor_id: Option<VendorId>,
    pub is_active: bool,
}

impl User {
    pub fn contact(&self) -> Contact {
        Contact {
            name: Some(self.name.clone()),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role, self.company_id, self.vendor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_round_trips_through_storage_form() {
        for role in
            [Role::SuperAdmin, Role::Admin, Role::CompanyAdmin, Role::Transporter, Role::Shipper]
        {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn legacy_user_role_maps_to_shipper() {
        assert_eq!(Role::parse("USER"), Some(Role::Shipper));
        assert_eq!(Role::parse("dispatcher"), None);
    }
}
