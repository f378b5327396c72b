//! Table definitions for the platform catalog
//!
//! The catalog is described once, as static data. Validation, DDL rendering,
//! schema verification and both stores read these definitions, so a column
//! added here is picked up everywhere.
//!
//! Tables are listed in dependency order: a table only references tables that
//! appear before it in [`Table::ALL`].

use crate::schema::enums::{BillingIncrement, DatacenterTier, EnumType, PlatformType, PricingType};
use std::fmt;

/// The ten catalog tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    NetworkCapabilities,
    SecurityFeatures,
    PlatformInformation,
    GeographicRegions,
    ComplianceCertification,
    ComputeInstance,
    PricingModel,
    SupportTier,
    ProprietarySoftware,
    ProprietaryHardware,
}

impl Table {
    /// All tables, parents before children
    pub const ALL: [Table; 10] = [
        Table::NetworkCapabilities,
        Table::SecurityFeatures,
        Table::PlatformInformation,
        Table::GeographicRegions,
        Table::ComplianceCertification,
        Table::ComputeInstance,
        Table::PricingModel,
        Table::SupportTier,
        Table::ProprietarySoftware,
        Table::ProprietaryHardware,
    ];

    pub fn def(&self) -> &'static TableDef {
        match self {
            Table::NetworkCapabilities => &NETWORK_CAPABILITIES,
            Table::SecurityFeatures => &SECURITY_FEATURES,
            Table::PlatformInformation => &PLATFORM_INFORMATION,
            Table::GeographicRegions => &GEOGRAPHIC_REGIONS,
            Table::ComplianceCertification => &COMPLIANCE_CERTIFICATION,
            Table::ComputeInstance => &COMPUTE_INSTANCE,
            Table::PricingModel => &PRICING_MODEL,
            Table::SupportTier => &SUPPORT_TIER,
            Table::ProprietarySoftware => &PROPRIETARY_SOFTWARE,
            Table::ProprietaryHardware => &PROPRIETARY_HARDWARE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.def().name
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Foreign keys in other tables that point at this one
    pub fn dependents(&self) -> impl Iterator<Item = (Table, &'static ForeignKeyDef)> {
        let target = *self;
        Table::ALL.into_iter().flat_map(move |table| {
            table
                .def()
                .foreign_keys
                .iter()
                .filter(move |fk| fk.references == target)
                .map(move |fk| (table, fk))
        })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Integer,
    /// Arbitrary precision decimal
    Numeric,
    Boolean,
    /// VARCHAR with a maximum character length
    Text(usize),
    /// ISO 3166 alpha-2 code, exactly two characters
    CountryCode,
    Timestamp,
    Enum(EnumType),
    /// Ordered VARCHAR array, each element bounded by the length
    TextArray(usize),
    /// Schema-less key-value document
    Document,
}

impl ColumnType {
    /// PostgreSQL type for this column, qualified with the catalog schema where needed
    pub fn sql_type(&self, schema: &str) -> String {
        match self {
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Numeric => "NUMERIC".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text(len) => format!("VARCHAR({})", len),
            ColumnType::CountryCode => "VARCHAR(2)".to_string(),
            ColumnType::Timestamp => "TIMESTAMPTZ".to_string(),
            ColumnType::Enum(e) => format!("{}.{}", schema, e.name),
            ColumnType::TextArray(len) => format!("VARCHAR({})[]", len),
            ColumnType::Document => "JSONB".to_string(),
        }
    }

    /// `udt_name` reported by `information_schema.columns`
    pub fn udt_name(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "int8",
            ColumnType::Integer => "int4",
            ColumnType::Numeric => "numeric",
            ColumnType::Boolean => "bool",
            ColumnType::Text(_) | ColumnType::CountryCode => "varchar",
            ColumnType::Timestamp => "timestamptz",
            ColumnType::Enum(e) => e.name,
            ColumnType::TextArray(_) => "_varchar",
            ColumnType::Document => "jsonb",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
    /// SQL default expression, also honored by the in-memory store
    pub default: Option<ColumnDefault>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    /// Insertion time
    Now,
}

impl ColumnDef {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: false,
            default: None,
        }
    }

    pub const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: true,
            default: None,
        }
    }

    pub const fn defaulting(self, default: ColumnDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }
}

/// How a foreign key behaves when rows are deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Child points at its parent. Deleting a referenced parent is rejected.
    Parent,
    /// The referencing row owns the referenced record: at most one owner, and
    /// deleting the owner deletes the owned record with it.
    Owned,
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyDef {
    pub column: &'static str,
    pub references: Table,
    pub kind: Reference,
}

#[derive(Debug)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub foreign_keys: &'static [ForeignKeyDef],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn foreign_key(&self, column: &str) -> Option<&'static ForeignKeyDef> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &'static ColumnDef> {
        self.columns.iter().filter(|c| c.required)
    }

    /// Foreign keys whose referenced record lives and dies with this row
    pub fn owned_links(&self) -> impl Iterator<Item = &'static ForeignKeyDef> {
        self.foreign_keys.iter().filter(|fk| fk.kind == Reference::Owned)
    }
}

/// Name of the foreign key constraint for a column, `fk_<table>__<column>`
pub fn fk_constraint_name(table: &str, column: &str) -> String {
    format!("fk_{}__{}", table, column)
}

/// Name of the uniqueness constraint on an owned link, `uq_<table>__<column>`
pub fn unique_constraint_name(table: &str, column: &str) -> String {
    format!("uq_{}__{}", table, column)
}

const fn parent(column: &'static str, references: Table) -> ForeignKeyDef {
    ForeignKeyDef {
        column,
        references,
        kind: Reference::Parent,
    }
}

const fn owned(column: &'static str, references: Table) -> ForeignKeyDef {
    ForeignKeyDef {
        column,
        references,
        kind: Reference::Owned,
    }
}

const PLATFORM_TYPE: ColumnType = ColumnType::Enum(PlatformType::TYPE);
const DATACENTER_TIER: ColumnType = ColumnType::Enum(DatacenterTier::TYPE);
const PRICING_TYPE: ColumnType = ColumnType::Enum(PricingType::TYPE);
const BILLING_INCREMENT: ColumnType = ColumnType::Enum(BillingIncrement::TYPE);

// =============================================================================
// Attribute clusters owned by a platform
// =============================================================================

pub static NETWORK_CAPABILITIES: TableDef = TableDef {
    name: "network_capabilities",
    columns: &[
        ColumnDef::new("bandwidth_gbps", ColumnType::Numeric),
        ColumnDef::new("network_type", ColumnType::Text(1024)),
        ColumnDef::new("interconnect_technology", ColumnType::Text(1024)),
        ColumnDef::new("vpc_support", ColumnType::Boolean),
        ColumnDef::new("load_balancing", ColumnType::Boolean),
        ColumnDef::new("cdn_integration", ColumnType::Boolean),
        ColumnDef::new("private_networking", ColumnType::Boolean),
    ],
    foreign_keys: &[],
};

pub static SECURITY_FEATURES: TableDef = TableDef {
    name: "security_features",
    columns: &[
        ColumnDef::new("encryption_at_rest", ColumnType::Boolean),
        ColumnDef::new("encryption_in_transit", ColumnType::Boolean),
        ColumnDef::new("key_management", ColumnType::Boolean),
        ColumnDef::new("identity_management", ColumnType::Boolean),
        ColumnDef::new("network_security", ColumnType::Boolean),
        ColumnDef::new("vulnerability_scanning", ColumnType::Boolean),
        ColumnDef::new("security_monitoring", ColumnType::Boolean),
        ColumnDef::new("penetration_testing", ColumnType::Boolean),
    ],
    foreign_keys: &[],
};

// =============================================================================
// Aggregate root
// =============================================================================

pub static PLATFORM_INFORMATION: TableDef = TableDef {
    name: "platform_information",
    columns: &[
        ColumnDef::required("platform_name", ColumnType::Text(512)),
        ColumnDef::new("platform_type", PLATFORM_TYPE),
        ColumnDef::new("parent_company", ColumnType::Text(512)),
        ColumnDef::new("founded_date", ColumnType::Timestamp),
        ColumnDef::new("headquarters", ColumnType::Text(512)),
        ColumnDef::new("website_url", ColumnType::Text(1024)),
        ColumnDef::new("documentation_url", ColumnType::Text(1024)),
        ColumnDef::new("primary_datacenter_tier", DATACENTER_TIER),
        ColumnDef::new("total_datacenters", ColumnType::Integer),
        ColumnDef::new("edge_locations", ColumnType::Integer),
        ColumnDef::new("custom_configuration_support", ColumnType::Boolean),
        ColumnDef::new("bare_metal_available", ColumnType::Boolean),
        ColumnDef::new("networking_id", ColumnType::BigInt),
        ColumnDef::new("security_id", ColumnType::BigInt),
        ColumnDef::new("sla_uptime", ColumnType::Numeric),
        ColumnDef::new("specializations", ColumnType::TextArray(1024)),
        ColumnDef::new("target_markets", ColumnType::TextArray(1024)),
        ColumnDef::new("notable_customers", ColumnType::TextArray(1024)),
        ColumnDef::new("partnerships", ColumnType::TextArray(512)),
        ColumnDef::new("last_updated", ColumnType::Timestamp).defaulting(ColumnDefault::Now),
        ColumnDef::new("data_sources", ColumnType::TextArray(1024)),
    ],
    foreign_keys: &[
        owned("networking_id", Table::NetworkCapabilities),
        owned("security_id", Table::SecurityFeatures),
    ],
};

// =============================================================================
// Children of a platform
// =============================================================================

pub static GEOGRAPHIC_REGIONS: TableDef = TableDef {
    name: "geographic_regions",
    columns: &[
        ColumnDef::required("platform_id", ColumnType::BigInt),
        ColumnDef::required("region_name", ColumnType::Text(256)),
        ColumnDef::required("region_code", ColumnType::Text(256)),
        ColumnDef::required("country", ColumnType::CountryCode),
        ColumnDef::new("availability_zones", ColumnType::Integer),
        ColumnDef::new("datacenter_tier", DATACENTER_TIER),
        ColumnDef::new("edge_location", ColumnType::Boolean),
    ],
    foreign_keys: &[parent("platform_id", Table::PlatformInformation)],
};

pub static COMPLIANCE_CERTIFICATION: TableDef = TableDef {
    name: "compliance_certification",
    columns: &[
        ColumnDef::required("platform_id", ColumnType::BigInt),
        ColumnDef::required("certification_name", ColumnType::Text(100)),
        ColumnDef::new("certification_date", ColumnType::Timestamp),
        ColumnDef::new("certifying_body", ColumnType::Text(256)),
        ColumnDef::new("certificate_url", ColumnType::Text(512)),
    ],
    foreign_keys: &[parent("platform_id", Table::PlatformInformation)],
};

pub static COMPUTE_INSTANCE: TableDef = TableDef {
    name: "compute_instance",
    columns: &[
        ColumnDef::required("platform_id", ColumnType::BigInt),
        ColumnDef::new("instance_name", ColumnType::Text(512)),
        ColumnDef::new("instance_family", ColumnType::Text(512)),
        ColumnDef::required("vcpus", ColumnType::Integer),
        ColumnDef::new("memory_gb", ColumnType::Numeric),
        ColumnDef::new("storage_gb", ColumnType::Numeric),
        ColumnDef::new("storage_type", ColumnType::Text(128)),
        ColumnDef::new("gpu_count", ColumnType::Integer),
        ColumnDef::new("gpu_type", ColumnType::Text(512)),
        ColumnDef::new("gpu_memory_gb", ColumnType::Numeric),
        ColumnDef::new("network_performance", ColumnType::Text(512)),
        ColumnDef::new("architecture", ColumnType::Text(128)),
        ColumnDef::new("specialized_hardware", ColumnType::Text(1024)),
    ],
    foreign_keys: &[parent("platform_id", Table::PlatformInformation)],
};

// The parent column has historically been read as a platform key; it is a
// compute instance key.
pub static PRICING_MODEL: TableDef = TableDef {
    name: "pricing_model",
    columns: &[
        ColumnDef::required("compute_instance_id", ColumnType::BigInt),
        ColumnDef::new("pricing_type", PRICING_TYPE),
        ColumnDef::new("price_per_hour", ColumnType::Numeric),
        ColumnDef::new("price_per_month", ColumnType::Numeric),
        ColumnDef::new("minimum_commitment", ColumnType::Text(1024)),
        ColumnDef::new("billing_increment", BILLING_INCREMENT),
    ],
    foreign_keys: &[parent("compute_instance_id", Table::ComputeInstance)],
};

pub static SUPPORT_TIER: TableDef = TableDef {
    name: "support_tier",
    columns: &[
        ColumnDef::required("platform_id", ColumnType::BigInt),
        ColumnDef::new("tier_name", ColumnType::Text(256)),
        ColumnDef::new("average_response_time", ColumnType::Text(512)),
        ColumnDef::new("channels", ColumnType::TextArray(256)),
        ColumnDef::new("hours", ColumnType::Text(512)),
        ColumnDef::new("price", ColumnType::Text(512)),
        ColumnDef::new("premium_features", ColumnType::TextArray(1024)),
    ],
    foreign_keys: &[parent("platform_id", Table::PlatformInformation)],
};

pub static PROPRIETARY_SOFTWARE: TableDef = TableDef {
    name: "proprietary_software",
    columns: &[
        ColumnDef::required("platform_id", ColumnType::BigInt),
        ColumnDef::new("software_name", ColumnType::Text(512)),
        ColumnDef::new("software_type", ColumnType::Text(256)),
        ColumnDef::new("description", ColumnType::Text(1024)),
        ColumnDef::new("version", ColumnType::Text(128)),
        ColumnDef::new("open_source", ColumnType::Boolean),
        ColumnDef::new("license_type", ColumnType::Text(128)),
        ColumnDef::new("documentation_url", ColumnType::Text(1024)),
        ColumnDef::new("github_url", ColumnType::Text(1024)),
        ColumnDef::new("use_cases", ColumnType::TextArray(1024)),
    ],
    foreign_keys: &[parent("platform_id", Table::PlatformInformation)],
};

pub static PROPRIETARY_HARDWARE: TableDef = TableDef {
    name: "proprietary_hardware",
    columns: &[
        ColumnDef::required("platform_id", ColumnType::BigInt),
        ColumnDef::new("hardware_name", ColumnType::Text(512)),
        ColumnDef::new("hardware_type", ColumnType::Text(256)),
        ColumnDef::new("description", ColumnType::Text(1024)),
        ColumnDef::new("specifications", ColumnType::Document),
        ColumnDef::new("performance_metrics", ColumnType::Document),
        ColumnDef::new("availability", ColumnType::Text(512)),
        ColumnDef::new("generation", ColumnType::Text(128)),
        ColumnDef::new("manufacturing_partner", ColumnType::TextArray(512)),
        ColumnDef::new("use_cases", ColumnType::TextArray(1024)),
    ],
    foreign_keys: &[parent("platform_id", Table::PlatformInformation)],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_listed_in_dependency_order() {
        for (idx, table) in Table::ALL.iter().enumerate() {
            for fk in table.def().foreign_keys {
                let parent_idx = Table::ALL.iter().position(|t| *t == fk.references).unwrap();
                assert!(
                    parent_idx < idx,
                    "{} must come after {}",
                    table,
                    fk.references
                );
            }
        }
    }

    #[test]
    fn test_foreign_key_columns_exist() {
        for table in Table::ALL {
            for fk in table.def().foreign_keys {
                let column = table.def().column(fk.column).unwrap();
                assert_eq!(column.column_type, ColumnType::BigInt);
                // Parent links are mandatory, owned links optional
                assert_eq!(column.required, fk.kind == Reference::Parent);
            }
        }
    }

    #[test]
    fn test_pricing_model_references_compute_instance() {
        let fk = PRICING_MODEL.foreign_key("compute_instance_id").unwrap();
        assert_eq!(fk.references, Table::ComputeInstance);
        assert_eq!(fk.kind, Reference::Parent);
    }

    #[test]
    fn test_only_platform_owns_records() {
        let owners: Vec<Table> = Table::ALL
            .into_iter()
            .filter(|t| t.def().owned_links().next().is_some())
            .collect();
        assert_eq!(owners, vec![Table::PlatformInformation]);

        let owned: Vec<Table> = PLATFORM_INFORMATION
            .owned_links()
            .map(|fk| fk.references)
            .collect();
        assert_eq!(owned, vec![Table::NetworkCapabilities, Table::SecurityFeatures]);
    }

    #[test]
    fn test_platform_dependents() {
        let mut children: Vec<&str> = Table::PlatformInformation
            .dependents()
            .map(|(t, _)| t.name())
            .collect();
        children.sort();
        assert_eq!(
            children,
            vec![
                "compliance_certification",
                "compute_instance",
                "geographic_regions",
                "proprietary_hardware",
                "proprietary_software",
                "support_tier",
            ]
        );
        assert_eq!(
            Table::ComputeInstance.dependents().map(|(t, _)| t).collect::<Vec<_>>(),
            vec![Table::PricingModel]
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Table::from_name("support_tier"), Some(Table::SupportTier));
        assert_eq!(Table::from_name("platforms"), None);
    }

    #[test]
    fn test_required_columns() {
        let required: Vec<&str> = PLATFORM_INFORMATION.required_columns().map(|c| c.name).collect();
        assert_eq!(required, vec!["platform_name"]);

        let required: Vec<&str> = GEOGRAPHIC_REGIONS.required_columns().map(|c| c.name).collect();
        assert_eq!(required, vec!["platform_id", "region_name", "region_code", "country"]);
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(ColumnType::Text(512).sql_type("platforms"), "VARCHAR(512)");
        assert_eq!(ColumnType::TextArray(256).sql_type("platforms"), "VARCHAR(256)[]");
        assert_eq!(PLATFORM_TYPE.sql_type("catalog"), "catalog.platform_types");
    }
}
