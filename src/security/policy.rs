//! Security Policy Definitions

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row-level authorization scope, broadest last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    SelfOnly,
    TeamAccess,
    DepartmentAccess,
    AllAccess,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::SelfOnly => "SELF_ONLY",
            AccessLevel::TeamAccess => "TEAM_ACCESS",
            AccessLevel::DepartmentAccess => "DEPARTMENT_ACCESS",
            AccessLevel::AllAccess => "ALL_ACCESS",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = EngineError;

    /// Unknown names are refused, never mapped to a default scope.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SELF_ONLY" => Ok(AccessLevel::SelfOnly),
            "TEAM_ACCESS" => Ok(AccessLevel::TeamAccess),
            "DEPARTMENT_ACCESS" => Ok(AccessLevel::DepartmentAccess),
            "ALL_ACCESS" => Ok(AccessLevel::AllAccess),
            other => Err(EngineError::AccessDenied(format!(
                "unrecognized access level '{}'",
                other
            ))),
        }
    }
}

/// Scoping facts for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub employee_id: i64,
    pub team_name: Option<String>,
    pub department_name: Option<String>,
}

impl CallerContext {
    pub fn new(employee_id: i64) -> Self {
        Self {
            employee_id,
            team_name: None,
            department_name: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team_name = Some(team.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department_name = Some(department.into());
        self
    }
}

/// Role attributes of the person asking, as stored in the HR database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub employee_id: i64,
    pub name: String,
    pub rank_name: String,
    pub department_name: Option<String>,
    pub team_name: Option<String>,
    pub team_leader: bool,
}

impl RoleProfile {
    pub fn caller_context(&self) -> CallerContext {
        CallerContext {
            employee_id: self.employee_id,
            team_name: self.team_name.clone(),
            department_name: self.department_name.clone(),
        }
    }
}

/// Maps role attributes to an access level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePolicy {
    /// Substring identifying the HR department
    pub hr_department_marker: String,
    /// Substring identifying the HR team within it
    pub hr_team_marker: String,
    /// Ranks that see their whole department
    pub managerial_ranks: Vec<String>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            hr_department_marker: "Support".to_string(),
            hr_team_marker: "HR".to_string(),
            managerial_ranks: vec!["General Manager".to_string()],
        }
    }
}

impl RolePolicy {
    pub fn access_level(&self, profile: &RoleProfile) -> AccessLevel {
        let in_hr_department = profile
            .department_name
            .as_deref()
            .is_some_and(|d| d.contains(&self.hr_department_marker));
        let in_hr_team = profile
            .team_name
            .as_deref()
            .is_some_and(|t| t.contains(&self.hr_team_marker));

        if in_hr_department && in_hr_team {
            AccessLevel::AllAccess
        } else if self
            .managerial_ranks
            .iter()
            .any(|rank| rank.eq_ignore_ascii_case(profile.rank_name.trim()))
        {
            AccessLevel::DepartmentAccess
        } else if profile.team_leader {
            AccessLevel::TeamAccess
        } else {
            AccessLevel::SelfOnly
        }
    }
}
