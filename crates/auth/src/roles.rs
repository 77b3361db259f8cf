use core::str::FromStr;

use serde::{Deserialize, Serialize};

use policlinico_core::DomainError;

/// Role of a clinic user.
///
/// Roles are a closed set. They select a landing dashboard and, for
/// [`Role::Administrator`], bypass permission checks entirely; everything else
/// is driven by the server-issued permission set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin", alias = "administrador")]
    Administrator,
    /// Front desk / patient admission.
    #[serde(rename = "admision", alias = "recepcion")]
    Admission,
    #[serde(rename = "tecnico")]
    Technician,
    /// A client company's account (sees its own employees' exams).
    #[serde(rename = "empresa")]
    Company,
    #[serde(rename = "medico", alias = "doctor")]
    Doctor,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Administrator,
        Role::Admission,
        Role::Technician,
        Role::Company,
        Role::Doctor,
    ];

    /// Wire tag, as sent by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "admin",
            Role::Admission => "admision",
            Role::Technician => "tecnico",
            Role::Company => "empresa",
            Role::Doctor => "medico",
        }
    }

    pub fn is_administrator(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrador" => Ok(Role::Administrator),
            "admision" | "recepcion" => Ok(Role::Admission),
            "tecnico" => Ok(Role::Technician),
            "empresa" => Ok(Role::Company),
            "medico" | "doctor" => Ok(Role::Doctor),
            _ => Err(DomainError::unknown("role", s)),
        }
    }
}
