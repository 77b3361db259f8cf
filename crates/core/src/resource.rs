//! Catalog of clinic resources served by the REST API.
//!
//! The client core never interprets these records; it only needs to know which
//! collection a request targets so the generic request wrapper can build the
//! path.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Patient records.
    Pacientes,
    /// Client companies (occupational health contracts).
    Empresas,
    /// Exam catalog and scheduled exams.
    Examenes,
    /// Exam results.
    Resultados,
    /// Referrals to specialists.
    Interconsultas,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Pacientes,
        Resource::Empresas,
        Resource::Examenes,
        Resource::Resultados,
        Resource::Interconsultas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Pacientes => "pacientes",
            Resource::Empresas => "empresas",
            Resource::Examenes => "examenes",
            Resource::Resultados => "resultados",
            Resource::Interconsultas => "interconsultas",
        }
    }

    /// Collection path relative to the API base URL (`/pacientes`).
    pub fn collection_path(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// Member path relative to the API base URL (`/pacientes/17`).
    pub fn member_path(&self, id: &str) -> String {
        format!("/{}/{}", self.as_str(), id)
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('/').to_ascii_lowercase();
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| DomainError::unknown("resource", s))
    }
}
