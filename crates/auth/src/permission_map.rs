//! Static route → permission and module → permission tables.

use std::collections::BTreeMap;

use fieldguard_core::ModuleKind;
use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionSet};

/// How a multi-token requirement is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementMode {
    /// Holding at least one listed token grants access.
    #[default]
    AnyOf,
    /// Every listed token must be held.
    AllOf,
}

impl core::str::FromStr for RequirementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "any_of" | "anyof" => Ok(Self::AnyOf),
            "all" | "all_of" | "allof" => Ok(Self::AllOf),
            other => Err(format!("unknown requirement mode '{other}'")),
        }
    }
}

/// Permission requirement for one route or module kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub tokens: Vec<Permission>,
    pub mode: RequirementMode,
}

impl Requirement {
    pub fn any_of(tokens: &[&'static str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| Permission::from_static(t)).collect(),
            mode: RequirementMode::AnyOf,
        }
    }

    pub fn is_satisfied_by(&self, held: &PermissionSet) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        match self.mode {
            RequirementMode::AnyOf => held.contains_any(&self.tokens),
            RequirementMode::AllOf => held.contains_all(&self.tokens),
        }
    }

    /// Listed tokens not present in `held`.
    pub fn missing(&self, held: &PermissionSet) -> Vec<Permission> {
        self.tokens
            .iter()
            .filter(|t| !held.contains(t))
            .cloned()
            .collect()
    }
}

/// Baseline permission set granted to any authenticated, non-elevated identity.
pub const BASELINE_PERMISSIONS: [&str; 1] = ["dashboard_view"];

const ROUTE_PERMISSIONS: &[(&str, &[&str])] = &[
    ("/dashboard", &["dashboard_view"]),
    ("/dashboard-rh", &["dashboard_rh_view"]),
    ("/dashboard-maquinas", &["dashboard_maquinas_view"]),
    ("/dashboard-cbuq", &["dashboard_cbuq_view"]),
    ("/gestao-rh/empresas", &["gestao_rh_empresas_view"]),
    ("/gestao-rh/departamentos", &["gestao_rh_departamentos_view"]),
    ("/gestao-rh/centros-custo", &["gestao_rh_centros_custo_view"]),
    ("/gestao-rh/funcoes", &["gestao_rh_funcoes_view"]),
    ("/gestao-rh/funcionarios", &["gestao_rh_funcionarios_view"]),
    ("/gestao-rh/equipes", &["gestao_rh_equipes_view"]),
    ("/gestao-maquinas/caminhoes", &["gestao_maquinas_caminhoes_view"]),
    ("/gestao-maquinas/usinas", &["gestao_maquinas_usinas_view"]),
    ("/gestao-maquinas/relatorio-medicao", &["gestao_maquinas_relatorio_medicao_view"]),
    ("/registro-aplicacao", &["requisicoes_registro_aplicacao_view"]),
    ("/relatorio-aplicacao", &["relatorio_aplicacao_view"]),
    ("/programacao-entrega", &["requisicoes_programacao_entrega_view"]),
    ("/requisicoes/cadastro", &["requisicoes_cadastro_view"]),
    ("/requisicoes/registro-cargas", &["requisicoes_registro_cargas_view"]),
    ("/requisicoes/apontamento-equipe", &["requisicoes_apontamento_equipe_view"]),
    ("/requisicoes/apontamento-caminhoes", &["requisicoes_apontamento_caminhoes_view"]),
    ("/requisicoes/chamados-os", &["requisicoes_chamados_os_view"]),
    ("/requisicoes/gestao-os", &["requisicoes_gestao_os_view"]),
    ("/admin/permissoes", &["admin_permissoes_view"]),
];

fn module_tokens(module: ModuleKind) -> &'static [&'static str] {
    match module {
        ModuleKind::CrewAttendance => &["apontamentos_view", "apontamentos_create"],
        ModuleKind::FleetLogging => &["apontamentos_caminhoes_view", "apontamentos_caminhoes_create"],
        ModuleKind::MaterialApplication => &["aplicacao_view", "aplicacao_create"],
        ModuleKind::CargoRegistration => &["cargas_view", "cargas_create"],
        ModuleKind::ServiceTicket => &["os_view", "os_create"],
        ModuleKind::WorkOrder => &["ordens_servico_view", "ordens_servico_create"],
    }
}

/// Declarative permission tables. Pure data; decisions live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMap {
    routes: BTreeMap<String, Requirement>,
    modules: BTreeMap<ModuleKind, Requirement>,
    baseline: PermissionSet,
}

impl PermissionMap {
    /// The system's built-in tables.
    pub fn standard() -> Self {
        let routes = ROUTE_PERMISSIONS
            .iter()
            .map(|(route, tokens)| (route.to_string(), Requirement::any_of(tokens)))
            .collect();
        let modules = ModuleKind::ALL
            .into_iter()
            .map(|m| (m, Requirement::any_of(module_tokens(m))))
            .collect();

        Self {
            routes,
            modules,
            baseline: BASELINE_PERMISSIONS.into_iter().collect(),
        }
    }

    /// Apply one requirement mode to every entry.
    pub fn with_mode(mut self, mode: RequirementMode) -> Self {
        for req in self.routes.values_mut().chain(self.modules.values_mut()) {
            req.mode = mode;
        }
        self
    }

    pub fn with_route(mut self, route: impl Into<String>, requirement: Requirement) -> Self {
        self.routes.insert(route.into(), requirement);
        self
    }

    pub fn route(&self, route: &str) -> Option<&Requirement> {
        self.routes.get(route)
    }

    pub fn module(&self, module: ModuleKind) -> Option<&Requirement> {
        self.modules.get(&module)
    }

    /// Mapped routes, sorted.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Requirement)> {
        self.routes.iter().map(|(r, req)| (r.as_str(), req))
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleKind, &Requirement)> {
        self.modules.iter().map(|(m, req)| (*m, req))
    }

    pub fn baseline(&self) -> &PermissionSet {
        &self.baseline
    }

    /// Every token the system defines (routes, modules and baseline).
    pub fn catalogue(&self) -> PermissionSet {
        let mut all = self.baseline.clone();
        for req in self.routes.values().chain(self.modules.values()) {
            all.extend(req.tokens.iter().cloned());
        }
        all
    }
}

impl Default for PermissionMap {
    fn default() -> Self {
        Self::standard()
    }
}
