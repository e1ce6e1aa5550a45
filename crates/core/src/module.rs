//! Field-capture module kinds tracked by the offline queue.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GuardError;

/// A fixed category of field-capture activity.
///
/// Each kind owns an independent offline queue. The serialized form is the
/// storage tag used by the field modules (e.g. `"registro_cargas"`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleKind {
    #[serde(rename = "apontamento_equipe", alias = "crew_attendance")]
    CrewAttendance,
    #[serde(rename = "apontamento_caminhoes", alias = "fleet_logging")]
    FleetLogging,
    #[serde(rename = "registro_aplicacao", alias = "material_application")]
    MaterialApplication,
    #[serde(rename = "registro_cargas", alias = "cargo_registration")]
    CargoRegistration,
    #[serde(rename = "chamados_os", alias = "service_ticket")]
    ServiceTicket,
    #[serde(rename = "ordens_servico", alias = "work_order")]
    WorkOrder,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 6] = [
        ModuleKind::CrewAttendance,
        ModuleKind::FleetLogging,
        ModuleKind::MaterialApplication,
        ModuleKind::CargoRegistration,
        ModuleKind::ServiceTicket,
        ModuleKind::WorkOrder,
    ];

    /// Storage tag (stable; part of the persisted queue key).
    pub fn tag(&self) -> &'static str {
        match self {
            ModuleKind::CrewAttendance => "apontamento_equipe",
            ModuleKind::FleetLogging => "apontamento_caminhoes",
            ModuleKind::MaterialApplication => "registro_aplicacao",
            ModuleKind::CargoRegistration => "registro_cargas",
            ModuleKind::ServiceTicket => "chamados_os",
            ModuleKind::WorkOrder => "ordens_servico",
        }
    }

    /// English alias accepted by [`FromStr`].
    pub fn alias(&self) -> &'static str {
        match self {
            ModuleKind::CrewAttendance => "crew_attendance",
            ModuleKind::FleetLogging => "fleet_logging",
            ModuleKind::MaterialApplication => "material_application",
            ModuleKind::CargoRegistration => "cargo_registration",
            ModuleKind::ServiceTicket => "service_ticket",
            ModuleKind::WorkOrder => "work_order",
        }
    }

    /// Human-readable name shown to field users.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModuleKind::CrewAttendance => "Apontamento de Equipe",
            ModuleKind::FleetLogging => "Apontamento de Caminhões",
            ModuleKind::MaterialApplication => "Registro de Aplicação",
            ModuleKind::CargoRegistration => "Registro de Cargas",
            ModuleKind::ServiceTicket => "Chamados OS",
            ModuleKind::WorkOrder => "Ordens de Serviço",
        }
    }
}

impl core::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ModuleKind {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleKind::ALL
            .into_iter()
            .find(|m| m.tag() == s || m.alias() == s)
            .ok_or_else(|| GuardError::UnknownModule(s.to_string()))
    }
}
