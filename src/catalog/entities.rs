use crate::schema::{BillingIncrement, DatacenterTier, PlatformType, PricingType, Table};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed row of one catalog table
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;

    /// Surrogate key, `None` until the row is stored
    fn id(&self) -> Option<i64>;
}

macro_rules! entity {
    ($name:ident => $table:expr) => {
        impl Entity for $name {
            const TABLE: Table = $table;

            fn id(&self) -> Option<i64> {
                self.id
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCapabilities {
    pub id: Option<i64>,
    pub bandwidth_gbps: Option<f64>,
    pub network_type: Option<String>,
    pub interconnect_technology: Option<String>,
    pub vpc_support: Option<bool>,
    pub load_balancing: Option<bool>,
    pub cdn_integration: Option<bool>,
    pub private_networking: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityFeatures {
    pub id: Option<i64>,
    pub encryption_at_rest: Option<bool>,
    pub encryption_in_transit: Option<bool>,
    pub key_management: Option<bool>,
    pub identity_management: Option<bool>,
    pub network_security: Option<bool>,
    pub vulnerability_scanning: Option<bool>,
    pub security_monitoring: Option<bool>,
    pub penetration_testing: Option<bool>,
}

/// Aggregate root of the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformInformation {
    pub id: Option<i64>,
    pub platform_name: String,
    pub platform_type: Option<PlatformType>,
    pub parent_company: Option<String>,
    pub founded_date: Option<DateTime<Utc>>,
    pub headquarters: Option<String>,
    pub website_url: Option<String>,
    pub documentation_url: Option<String>,
    pub primary_datacenter_tier: Option<DatacenterTier>,
    pub total_datacenters: Option<i32>,
    pub edge_locations: Option<i32>,
    pub custom_configuration_support: Option<bool>,
    pub bare_metal_available: Option<bool>,
    /// Owned network record, deleted together with the platform
    pub networking_id: Option<i64>,
    /// Owned security record, deleted together with the platform
    pub security_id: Option<i64>,
    pub sla_uptime: Option<f64>,
    pub specializations: Option<Vec<String>>,
    pub target_markets: Option<Vec<String>>,
    pub notable_customers: Option<Vec<String>>,
    pub partnerships: Option<Vec<String>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub data_sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicRegion {
    pub id: Option<i64>,
    pub platform_id: i64,
    pub region_name: String,
    pub region_code: String,
    /// ISO 3166 alpha-2
    pub country: String,
    pub availability_zones: Option<i32>,
    pub datacenter_tier: Option<DatacenterTier>,
    pub edge_location: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCertification {
    pub id: Option<i64>,
    pub platform_id: i64,
    pub certification_name: String,
    pub certification_date: Option<DateTime<Utc>>,
    pub certifying_body: Option<String>,
    pub certificate_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub id: Option<i64>,
    pub platform_id: i64,
    pub instance_name: Option<String>,
    pub instance_family: Option<String>,
    pub vcpus: i32,
    pub memory_gb: Option<f64>,
    pub storage_gb: Option<f64>,
    pub storage_type: Option<String>,
    pub gpu_count: Option<i32>,
    pub gpu_type: Option<String>,
    pub gpu_memory_gb: Option<f64>,
    pub network_performance: Option<String>,
    pub architecture: Option<String>,
    pub specialized_hardware: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingModel {
    pub id: Option<i64>,
    pub compute_instance_id: i64,
    pub pricing_type: Option<PricingType>,
    pub price_per_hour: Option<f64>,
    pub price_per_month: Option<f64>,
    pub minimum_commitment: Option<String>,
    pub billing_increment: Option<BillingIncrement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportTier {
    pub id: Option<i64>,
    pub platform_id: i64,
    pub tier_name: Option<String>,
    pub average_response_time: Option<String>,
    pub channels: Option<Vec<String>>,
    pub hours: Option<String>,
    pub price: Option<String>,
    pub premium_features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProprietarySoftware {
    pub id: Option<i64>,
    pub platform_id: i64,
    pub software_name: Option<String>,
    pub software_type: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub open_source: Option<bool>,
    pub license_type: Option<String>,
    pub documentation_url: Option<String>,
    pub github_url: Option<String>,
    pub use_cases: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProprietaryHardware {
    pub id: Option<i64>,
    pub platform_id: i64,
    pub hardware_name: Option<String>,
    pub hardware_type: Option<String>,
    pub description: Option<String>,
    pub specifications: Option<Map<String, Value>>,
    pub performance_metrics: Option<Map<String, Value>>,
    pub availability: Option<String>,
    pub generation: Option<String>,
    pub manufacturing_partner: Option<Vec<String>>,
    pub use_cases: Option<Vec<String>>,
}

entity!(NetworkCapabilities => Table::NetworkCapabilities);
entity!(SecurityFeatures => Table::SecurityFeatures);
entity!(PlatformInformation => Table::PlatformInformation);
entity!(GeographicRegion => Table::GeographicRegions);
entity!(ComplianceCertification => Table::ComplianceCertification);
entity!(ComputeInstance => Table::ComputeInstance);
entity!(PricingModel => Table::PricingModel);
entity!(SupportTier => Table::SupportTier);
entity!(ProprietarySoftware => Table::ProprietarySoftware);
entity!(ProprietaryHardware => Table::ProprietaryHardware);

/// A compute instance with its pricing options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComputeInstanceProfile {
    pub instance: ComputeInstance,
    pub pricing: Vec<PricingModel>,
}

impl ComputeInstanceProfile {
    pub fn has_gpu(&self) -> bool {
        self.instance.gpu_count.is_some_and(|n| n > 0)
    }

    pub fn offers(&self, pricing_type: PricingType) -> bool {
        self.pricing.iter().any(|p| p.pricing_type == Some(pricing_type))
    }
}

/// A platform with every record that hangs off it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformProfile {
    pub platform: PlatformInformation,
    pub networking: Option<NetworkCapabilities>,
    pub security: Option<SecurityFeatures>,
    pub regions: Vec<GeographicRegion>,
    pub certifications: Vec<ComplianceCertification>,
    pub compute_instances: Vec<ComputeInstanceProfile>,
    pub support_tiers: Vec<SupportTier>,
    pub software: Vec<ProprietarySoftware>,
    pub hardware: Vec<ProprietaryHardware>,
}

impl PlatformProfile {
    /// Any certification named "SOC2" or containing "SOC 2", ignoring case
    pub fn has_soc2_compliance(&self) -> bool {
        self.certifications.iter().any(|cert| {
            let name = cert.certification_name.to_uppercase();
            name == "SOC2" || name.contains("SOC 2")
        })
    }

    /// Distinct pricing types across all instances, in first-seen order
    pub fn available_pricing_types(&self) -> Vec<PricingType> {
        let mut types = Vec::new();
        for pricing_type in self
            .compute_instances
            .iter()
            .flat_map(|i| &i.pricing)
            .filter_map(|p| p.pricing_type)
        {
            if !types.contains(&pricing_type) {
                types.push(pricing_type);
            }
        }
        types
    }

    pub fn gpu_instances_available(&self) -> bool {
        self.compute_instances.iter().any(ComputeInstanceProfile::has_gpu)
    }

    /// Instances with at least one pricing model of this type
    pub fn instances_by_pricing_type(&self, pricing_type: PricingType) -> Vec<&ComputeInstance> {
        self.compute_instances
            .iter()
            .filter(|i| i.offers(pricing_type))
            .map(|i| &i.instance)
            .collect()
    }

    pub fn pricing_models_by_type(&self, pricing_type: PricingType) -> Vec<&PricingModel> {
        self.compute_instances
            .iter()
            .flat_map(|i| &i.pricing)
            .filter(|p| p.pricing_type == Some(pricing_type))
            .collect()
    }

    pub fn regions_by_tier(&self, tier: DatacenterTier) -> Vec<&GeographicRegion> {
        self.regions
            .iter()
            .filter(|r| r.datacenter_tier == Some(tier))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_insert;
    use serde_json::json;

    #[test]
    fn test_entity_tables_match_registry_columns() {
        // Every serialized field other than `id` must be a registry column
        let samples = vec![
            (Table::PlatformInformation, serde_json::to_value(PlatformInformation::default()).unwrap()),
            (Table::GeographicRegions, serde_json::to_value(GeographicRegion::default()).unwrap()),
            (Table::ComputeInstance, serde_json::to_value(ComputeInstance::default()).unwrap()),
            (Table::PricingModel, serde_json::to_value(PricingModel::default()).unwrap()),
            (Table::ProprietaryHardware, serde_json::to_value(ProprietaryHardware::default()).unwrap()),
        ];

        for (table, value) in samples {
            let fields = value.as_object().unwrap();
            for name in fields.keys().filter(|k| *k != "id") {
                assert!(table.def().column(name).is_some(), "{}.{}", table, name);
            }
            assert_eq!(fields.len(), table.def().columns.len() + 1, "{}", table);
        }
    }

    #[test]
    fn test_platform_round_trips_through_record() {
        let platform = PlatformInformation {
            platform_name: "Acme Cloud".to_string(),
            platform_type: Some(PlatformType::GpuCloud),
            specializations: Some(vec!["training".to_string(), "inference".to_string()]),
            ..Default::default()
        };

        let mut value = serde_json::to_value(&platform).unwrap();
        let record = value.as_object_mut().unwrap();
        record.retain(|k, v| k != "id" && !v.is_null());

        let normalized = validate_insert(Table::PlatformInformation, record).unwrap();
        assert_eq!(normalized["platform_type"], json!("gpu_cloud"));

        let back: PlatformInformation = serde_json::from_value(Value::Object(normalized)).unwrap();
        assert_eq!(back, platform);
    }
}
