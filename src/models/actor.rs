use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the party performing an operation. Supplied by whatever
/// identity layer wraps the core; never derived here.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Ops,
    Accounting,
    Warehouse,
    Customer,
    Supplier,
    #[serde(rename = "3PL")]
    #[strum(serialize = "3PL")]
    ThirdPartyLogistics,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorStatus {
    Pending,
    Active,
    Inactive,
}

/// Opaque current-actor contract consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
    pub org_id: Option<Uuid>,
    pub status: ActorStatus,
    /// Invite token keying the activation flow for not-yet-active
    /// organizations.
    pub invite_token: Option<String>,
}
