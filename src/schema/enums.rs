//! Closed label sets used by the catalog
//!
//! Each enumeration exists twice: as a Rust sum type for typed access, and as
//! a PostgreSQL `ENUM` type in the catalog schema. Both are generated from the
//! same label list so they cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Descriptor of a PostgreSQL enum type owned by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumType {
    /// Type name inside the catalog schema
    pub name: &'static str,
    pub labels: &'static [&'static str],
}

impl EnumType {
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&label)
    }
}

/// Error returned when a label is not part of an enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    pub enum_name: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {} label", self.value, self.enum_name)
    }
}

impl std::error::Error for UnknownLabel {}

/// Fold free-form input onto label spelling: lowercase, spaces and dashes as underscores.
fn normalize_label(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

macro_rules! catalog_enum {
    (
        $(#[$meta:meta])*
        $name:ident => $pg_name:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const TYPE: EnumType = EnumType {
                name: $pg_name,
                labels: &[$($label),+],
            };

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Accept human spellings such as "On Demand" or "GPU-Cloud".
            pub fn parse_lenient(input: &str) -> Result<Self, UnknownLabel> {
                normalize_label(input).parse()
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    _ => Err(UnknownLabel {
                        enum_name: $pg_name,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

catalog_enum! {
    /// Platform classification
    PlatformType => "platform_types" {
        Hyperscaler => "hyperscaler",
        GpuCloud => "gpu_cloud",
        EdgeCloud => "edge_cloud",
        HybridCloud => "hybrid_cloud",
        PrivateCloud => "private_cloud",
        SpecializedAi => "specialized_ai",
        ContainerPlatform => "container_platform",
        Serverless => "serverless",
        Other => "other",
    }
}

catalog_enum! {
    /// Datacenter tier classification
    DatacenterTier => "datacenter_tier" {
        Tier1 => "tier_1",
        Tier2 => "tier_2",
        Tier3 => "tier_3",
        Tier4 => "tier_4",
        Tier5 => "tier_5",
        Colocation => "colocation",
        Edge => "edge",
        Hybrid => "hybrid",
        Unknown => "unknown",
    }
}

catalog_enum! {
    PricingType => "pricing_type" {
        OnDemand => "on_demand",
        Reserved => "reserved",
        Spot => "spot",
        Preemptible => "preemptible",
        Dedicated => "dedicated",
        Burstable => "burstable",
    }
}

catalog_enum! {
    /// Certification status. Installed as a type but not used by any column yet.
    ComplianceStatus => "compliance_status" {
        Certified => "certified",
        InProgress => "in_progress",
        Planned => "planned",
        NotApplicable => "not_applicable",
        Unknown => "unknown",
    }
}

catalog_enum! {
    BillingIncrement => "billing_increment" {
        PerSecond => "per_second",
        PerMinute => "per_minute",
        PerHour => "per_hour",
        PerDay => "per_day",
        PerMonth => "per_month",
        PerYear => "per_year",
        OneTime => "one_time",
        Custom => "custom",
    }
}

/// Every enum type installed into the catalog schema, in creation order
pub const ENUM_TYPES: &[EnumType] = &[
    PlatformType::TYPE,
    DatacenterTier::TYPE,
    PricingType::TYPE,
    ComplianceStatus::TYPE,
    BillingIncrement::TYPE,
];
