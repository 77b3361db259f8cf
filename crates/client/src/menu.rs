//! Navigation menu: static definition and per-user composition.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use policlinico_auth::{Requirement, Session, evaluate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason attached to primary modules the user cannot open.
pub const LOCKED_REASON: &str = "insufficient permission";

/// How an entry behaves when the user lacks its permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Always active, never checked (dashboard, logout).
    Pinned,
    /// Always listed; locked when unauthorized.
    Primary,
    /// Omitted when unauthorized.
    #[default]
    Standard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Requirement::is_none")]
    pub requires: Requirement,
    #[serde(default)]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuEntry>,
}

impl MenuEntry {
    pub fn pinned(id: &str, label: &str, route: &str) -> Self {
        Self::leaf(id, label, route, Requirement::None, EntryKind::Pinned)
    }

    pub fn primary(id: &str, label: &str, route: &str, requires: Requirement) -> Self {
        Self::leaf(id, label, route, requires, EntryKind::Primary)
    }

    pub fn link(id: &str, label: &str, route: &str, requires: Requirement) -> Self {
        Self::leaf(id, label, route, requires, EntryKind::Standard)
    }

    pub fn group(id: &str, label: &str, children: Vec<MenuEntry>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            route: None,
            requires: Requirement::None,
            kind: EntryKind::Standard,
            children,
        }
    }

    fn leaf(id: &str, label: &str, route: &str, requires: Requirement, kind: EntryKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            route: Some(route.to_string()),
            requires,
            kind,
            children: Vec::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("failed to read menu definition {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed menu definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid menu definition: {0}")]
    Invalid(String),
}

/// Ordered, immutable menu configuration shared by every user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MenuDefinition {
    entries: Vec<MenuEntry>,
}

static CLINIC_MENU: LazyLock<MenuDefinition> = LazyLock::new(|| MenuDefinition {
    entries: clinic_entries(),
});

impl MenuDefinition {
    /// Validate and wrap a list of entries.
    ///
    /// Rules: ids are unique; groups nest one level and carry no requirement
    /// of their own (their visibility follows from their children); pinned
    /// and primary entries are top-level leaves; pinned entries carry no
    /// requirement.
    pub fn new(entries: Vec<MenuEntry>) -> Result<Self, MenuError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(MenuError::Invalid(format!("duplicate entry id '{}'", entry.id)));
            }
            if !entry.is_group() {
                if entry.kind == EntryKind::Pinned && !entry.requires.is_none() {
                    return Err(MenuError::Invalid(format!(
                        "pinned entry '{}' cannot declare a requirement",
                        entry.id
                    )));
                }
                continue;
            }
            if entry.kind != EntryKind::Standard {
                return Err(MenuError::Invalid(format!(
                    "group '{}' cannot be {:?}",
                    entry.id, entry.kind
                )));
            }
            if !entry.requires.is_none() {
                return Err(MenuError::Invalid(format!(
                    "group '{}' cannot declare its own requirement",
                    entry.id
                )));
            }
            for child in &entry.children {
                if !seen.insert(child.id.as_str()) {
                    return Err(MenuError::Invalid(format!("duplicate entry id '{}'", child.id)));
                }
                if child.is_group() {
                    return Err(MenuError::Invalid(format!(
                        "entry '{}' nests deeper than one level",
                        child.id
                    )));
                }
                if child.kind != EntryKind::Standard {
                    return Err(MenuError::Invalid(format!(
                        "group child '{}' cannot be {:?}",
                        child.id, child.kind
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self, MenuError> {
        let entries: Vec<MenuEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self, MenuError> {
        let json = std::fs::read_to_string(path).map_err(|source| MenuError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The built-in clinic menu, built once per process.
    pub fn clinic() -> &'static MenuDefinition {
        &CLINIC_MENU
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }
}

fn clinic_entries() -> Vec<MenuEntry> {
    vec![
        MenuEntry::pinned("dashboard", "Dashboard", "/dashboard"),
        MenuEntry::primary(
            "pacientes",
            "Pacientes",
            "/pacientes",
            Requirement::single("patients.view"),
        ),
        MenuEntry::primary(
            "empresas",
            "Empresas",
            "/empresas",
            Requirement::single("companies.view"),
        ),
        MenuEntry::primary(
            "personal",
            "Personal médico",
            "/personal",
            Requirement::any_of(["staff.view", "doctors.view"]),
        ),
        MenuEntry::primary(
            "examenes",
            "Exámenes",
            "/examenes",
            Requirement::single("exams.view"),
        ),
        MenuEntry::link(
            "resultados",
            "Resultados",
            "/resultados",
            Requirement::single("results.view"),
        ),
        MenuEntry::link(
            "interconsultas",
            "Interconsultas",
            "/interconsultas",
            Requirement::single("consultations.view"),
        ),
        MenuEntry::group(
            "reportes",
            "Reportes",
            vec![
                MenuEntry::link(
                    "reportes-generales",
                    "Reportes generales",
                    "/reportes",
                    Requirement::single("reports.view"),
                ),
                MenuEntry::link(
                    "reportes-exportar",
                    "Exportar",
                    "/reportes/exportar",
                    Requirement::single("reports.export"),
                ),
            ],
        ),
        MenuEntry::group(
            "administracion",
            "Administración",
            vec![
                MenuEntry::link(
                    "usuarios",
                    "Usuarios",
                    "/admin/usuarios",
                    Requirement::single("users.manage"),
                ),
                MenuEntry::link(
                    "roles",
                    "Roles y permisos",
                    "/admin/roles",
                    Requirement::single("roles.manage"),
                ),
                MenuEntry::link(
                    "respaldo",
                    "Respaldo",
                    "/admin/respaldo",
                    Requirement::single("backup.execute"),
                ),
            ],
        ),
        MenuEntry::pinned("logout", "Cerrar sesión", "/logout"),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Composition
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    Active,
    Locked { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedItem {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(flatten)]
    pub state: ItemState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedItem>,
}

impl RenderedItem {
    fn active(entry: &MenuEntry, children: Vec<RenderedItem>) -> Self {
        Self {
            id: entry.id.clone(),
            label: entry.label.clone(),
            route: entry.route.clone(),
            state: ItemState::Active,
            children,
        }
    }

    fn locked(entry: &MenuEntry) -> Self {
        Self {
            id: entry.id.clone(),
            label: entry.label.clone(),
            route: None,
            state: ItemState::Locked {
                reason: LOCKED_REASON.to_string(),
            },
            children: Vec::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, ItemState::Locked { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderedMenu {
    pub items: Vec<RenderedItem>,
}

impl RenderedMenu {
    pub fn get(&self, id: &str) -> Option<&RenderedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }
}

/// Filter `definition` for `session`, preserving definition order.
///
/// Nothing is cached: a permission change shows up on the next call.
pub fn compose(definition: &MenuDefinition, session: Option<&Session>) -> RenderedMenu {
    let allowed = |entry: &MenuEntry| evaluate(&entry.requires, session);

    let items = definition
        .entries()
        .iter()
        .filter_map(|entry| {
            if entry.is_group() {
                let children: Vec<RenderedItem> = entry
                    .children
                    .iter()
                    .filter(|&child| allowed(child))
                    .map(|child| RenderedItem::active(child, Vec::new()))
                    .collect();
                return (!children.is_empty()).then(|| RenderedItem::active(entry, children));
            }

            match entry.kind {
                EntryKind::Pinned => Some(RenderedItem::active(entry, Vec::new())),
                EntryKind::Primary if allowed(entry) => Some(RenderedItem::active(entry, Vec::new())),
                EntryKind::Primary => Some(RenderedItem::locked(entry)),
                EntryKind::Standard => allowed(entry).then(|| RenderedItem::active(entry, Vec::new())),
            }
        })
        .collect();

    RenderedMenu { items }
}
