//! # Actor Context
//!
//! The caller's identity, roles, and capabilities, passed explicitly into
//! every workflow and claim operation.
//!
//! Roles come from the external user/role directory. Capabilities are named
//! permissions; each role grants a default set, and a directory may grant
//! extra capabilities on top. Leadership stages are checked by *role*
//! (Director, Minister Assistant); everything else is checked by capability.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{ProvinceId, UserId};

// ─── Role ────────────────────────────────────────────────────────────

/// A role held by a registry user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Provincial registry staff who submit requests.
    ProvincialOfficer,
    /// Central auditor reviewing submissions.
    Auditor,
    /// Intellectual-property expert giving technical opinions.
    IpExpert,
    /// Director-level leadership reviewer.
    Director,
    /// Minister assistant, final leadership approver.
    MinisterAssistant,
    /// Registry manager with final-decision authority (reset of decided requests).
    RegistryManager,
    /// Registry officer who finalizes or strikes reserved names.
    RegistryOfficer,
    /// Super-administrator; overrides claim and leadership guards.
    Admin,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 8] = [
        Role::ProvincialOfficer,
        Role::Auditor,
        Role::IpExpert,
        Role::Director,
        Role::MinisterAssistant,
        Role::RegistryManager,
        Role::RegistryOfficer,
        Role::Admin,
    ];

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvincialOfficer => "provincial_officer",
            Self::Auditor => "auditor",
            Self::IpExpert => "ip_expert",
            Self::Director => "director",
            Self::MinisterAssistant => "minister_assistant",
            Self::RegistryManager => "registry_manager",
            Self::RegistryOfficer => "registry_officer",
            Self::Admin => "admin",
        }
    }

    /// Capabilities granted by this role alone.
    pub fn default_capabilities(&self) -> &'static [Capability] {
        match self {
            Self::ProvincialOfficer => &[Capability::CreateRequest],
            Self::Auditor => &[Capability::ClaimForAudit],
            Self::IpExpert => &[Capability::ClaimForIpReview],
            Self::Director | Self::MinisterAssistant => &[],
            Self::RegistryManager => &[Capability::FinalDecision],
            Self::RegistryOfficer => &[Capability::FinalizeRegistry, Capability::StrikeName],
            Self::Admin => &Capability::ALL,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownRole(s.to_string()))
    }
}

// ─── Capability ──────────────────────────────────────────────────────

/// A named permission checked by the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Submit a new name-reservation request.
    CreateRequest,
    /// Take the central-audit claim.
    ClaimForAudit,
    /// Take the IP-review claim.
    ClaimForIpReview,
    /// Reset or cancel a decided request.
    FinalDecision,
    /// Record the registry number of a reserved name.
    FinalizeRegistry,
    /// Strike (release) a reserved name.
    StrikeName,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Capability; 6] = [
        Capability::CreateRequest,
        Capability::ClaimForAudit,
        Capability::ClaimForIpReview,
        Capability::FinalDecision,
        Capability::FinalizeRegistry,
        Capability::StrikeName,
    ];

    /// Wire name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRequest => "create-request",
            Self::ClaimForAudit => "claim-for-audit",
            Self::ClaimForIpReview => "claim-for-ip-review",
            Self::FinalDecision => "final-decision",
            Self::FinalizeRegistry => "finalize-registry",
            Self::StrikeName => "strike-name",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── ActorContext ────────────────────────────────────────────────────

/// The acting user for one inbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// The user performing the action.
    pub user_id: UserId,
    /// Roles held at the time of the call.
    pub roles: BTreeSet<Role>,
    /// Effective capabilities (role defaults plus directory grants).
    pub capabilities: BTreeSet<Capability>,
    /// Province the user is bound to, if any. Province-bound users may only
    /// submit for their own province.
    pub province_id: Option<ProvinceId>,
    /// Client network origin, recorded in the audit log.
    pub origin: Option<String>,
}

impl ActorContext {
    /// Build a context whose capabilities are the union of the roles' defaults.
    pub fn new(user_id: UserId, roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        let capabilities = roles
            .iter()
            .flat_map(|r| r.default_capabilities().iter().copied())
            .collect();
        Self {
            user_id,
            roles,
            capabilities,
            province_id: None,
            origin: None,
        }
    }

    /// Builder: bind the actor to a province.
    pub fn with_province(mut self, province_id: ProvinceId) -> Self {
        self.province_id = Some(province_id);
        self
    }

    /// Builder: record the client network origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Builder: grant an extra capability.
    pub fn grant(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Whether the actor holds `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Whether the actor holds `capability`.
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Super-admin override.
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// The role recorded on history rows: the most privileged role held.
    pub fn acting_role(&self) -> Option<Role> {
        self.roles.iter().next_back().copied()
    }
}
