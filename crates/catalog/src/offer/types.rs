//! Offer value objects.

use serde::{Deserialize, Serialize};

/// Publisher-chosen identifier of a marketplace offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl OfferId {
    /// Creates an offer ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OfferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OfferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OfferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Publisher-chosen identifier of a plan within an offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(String);

impl PlanId {
    /// Creates a plan ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Display metadata of an offer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferProperties {
    /// Human-readable offer name.
    pub display_name: String,

    /// Longer description shown on the offer page.
    pub description: String,

    /// Name of the publishing organization.
    pub publisher_name: String,

    /// Optional logo image URL.
    pub logo_url: Option<String>,
}

/// Partial update of offer properties.
///
/// Only fields that are present and non-empty overwrite the corresponding
/// aggregate field; everything else is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferPropertiesPatch {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub publisher_name: Option<String>,
    pub logo_url: Option<String>,
}

impl OfferPropertiesPatch {
    /// Applies the patch, overwriting only present, non-empty fields.
    pub fn merge_into(&self, properties: &mut OfferProperties) {
        if let Some(ref v) = self.display_name
            && !v.is_empty()
        {
            properties.display_name = v.clone();
        }
        if let Some(ref v) = self.description
            && !v.is_empty()
        {
            properties.description = v.clone();
        }
        if let Some(ref v) = self.publisher_name
            && !v.is_empty()
        {
            properties.publisher_name = v.clone();
        }
        if let Some(ref v) = self.logo_url
            && !v.is_empty()
        {
            properties.logo_url = Some(v.clone());
        }
    }
}

/// Hosting mode of a plan, which decides the implicit bootstrap step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanMode {
    /// Fully hosted software; no bootstrap step.
    SaaS,

    /// Subscriptions register with a downstream application.
    PaaS,

    /// Infrastructure plans that may need a jump host provisioned first.
    IaaS,
}

impl PlanMode {
    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanMode::SaaS => "SaaS",
            PlanMode::PaaS => "PaaS",
            PlanMode::IaaS => "IaaS",
        }
    }
}

impl std::fmt::Display for PlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SaaS" => Ok(PlanMode::SaaS),
            "PaaS" => Ok(PlanMode::PaaS),
            "IaaS" => Ok(PlanMode::IaaS),
            other => Err(format!("unknown plan mode: {}", other)),
        }
    }
}

/// Value type of an offer or subscription parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterValueType {
    #[default]
    String,
    Number,
    Boolean,
}

/// A parameter definition declared by an offer or plan.
///
/// The subscriber supplies a value for each non-system parameter when
/// subscribing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferParameter {
    /// Unique parameter name within the offer.
    pub name: String,

    /// Human-readable name shown to the subscriber.
    pub display_name: String,

    /// Description shown to the subscriber.
    pub description: String,

    /// Value type.
    pub value_type: ParameterValueType,

    /// Whether the subscriber must supply a value.
    pub is_required: bool,

    /// Default value used when the subscriber supplies none.
    pub default_value: Option<String>,
}

/// A purchasable plan within an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan identifier within the offer.
    pub plan_id: PlanId,

    /// Human-readable plan name.
    pub display_name: String,

    /// Plan description.
    pub description: String,

    /// Hosting mode; decides the implicit bootstrap step.
    pub mode: PlanMode,

    /// Downstream application registered on subscribe, for PaaS plans.
    pub application_name: Option<String>,

    /// Ordered names of the provisioning steps run on subscribe.
    pub on_subscribe: Vec<String>,

    /// Plan-specific parameter definitions, merged with the offer's.
    pub parameters: Vec<OfferParameter>,
}
