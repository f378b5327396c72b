use crate::catalog::entities::{
    ComplianceCertification, ComputeInstance, ComputeInstanceProfile, Entity, GeographicRegion,
    NetworkCapabilities, PlatformInformation, PlatformProfile, PricingModel, ProprietaryHardware,
    ProprietarySoftware, SecurityFeatures, SupportTier,
};
use crate::error::{CatalogError, Result};
use crate::schema::{PlatformType, Record, Reference, Table, ID_COLUMN};
use crate::store::{CatalogStore, Query};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Page size used when a listing does not name one
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Typed access to the catalog over any store
pub struct PlatformCatalog<S> {
    store: S,
}

impl<S: CatalogStore> PlatformCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Generic entity access
    // =========================================================================

    pub async fn create<E: Entity>(&self, entity: &E) -> Result<i64> {
        self.store.insert(E::TABLE, to_record(entity)?).await
    }

    pub async fn get<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        self.store.get(E::TABLE, id).await?.map(from_record).transpose()
    }

    /// Apply column changes to an existing row
    pub async fn update<E: Entity>(&self, id: i64, changes: Record) -> Result<()> {
        self.store.update(E::TABLE, id, changes).await
    }

    pub async fn delete<E: Entity>(&self, id: i64) -> Result<bool> {
        self.store.delete(E::TABLE, id).await
    }

    pub async fn list<E: Entity>(&self, query: &Query) -> Result<Vec<E>> {
        self.store
            .find(E::TABLE, query)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// Rows of `E` whose parent key points at `parent_id`
    pub async fn children_of<E: Entity>(&self, parent_id: i64) -> Result<Vec<E>> {
        let fk = E::TABLE
            .def()
            .foreign_keys
            .iter()
            .find(|fk| fk.kind == Reference::Parent)
            .ok_or_else(|| CatalogError::InvalidValue {
                table: E::TABLE.name().to_string(),
                column: ID_COLUMN.to_string(),
                reason: "table has no parent".to_string(),
            })?;

        self.list(&Query::new().eq(fk.column, parent_id)).await
    }

    // =========================================================================
    // Platforms
    // =========================================================================

    pub async fn create_platform(&self, platform: &PlatformInformation) -> Result<i64> {
        self.create(platform).await
    }

    pub async fn get_platform(&self, id: i64) -> Result<Option<PlatformInformation>> {
        self.get(id).await
    }

    /// First platform with exactly this name
    pub async fn get_platform_by_name(&self, name: &str) -> Result<Option<PlatformInformation>> {
        let query = Query::new().eq("platform_name", name).limit(1);
        Ok(self.list(&query).await?.into_iter().next())
    }

    /// Platforms in id order; `limit` defaults to [`DEFAULT_PAGE_SIZE`]
    pub async fn list_platforms(&self, limit: Option<usize>, offset: usize) -> Result<Vec<PlatformInformation>> {
        let query = Query::new()
            .limit(limit.unwrap_or(DEFAULT_PAGE_SIZE))
            .offset(offset);
        self.list(&query).await
    }

    /// Apply changes to a platform and stamp `last_updated`
    pub async fn update_platform(&self, id: i64, mut changes: Record) -> Result<()> {
        changes.insert(
            "last_updated".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        self.update::<PlatformInformation>(id, changes).await
    }

    /// Delete a platform with its network and security records.
    ///
    /// Fails while any region, certification, instance, support tier,
    /// software or hardware record still references it.
    pub async fn delete_platform(&self, id: i64) -> Result<bool> {
        self.delete::<PlatformInformation>(id).await
    }

    pub async fn search_platforms_by_name(&self, term: &str) -> Result<Vec<PlatformInformation>> {
        self.list(&Query::new().contains("platform_name", term)).await
    }

    pub async fn search_platforms_by_company(&self, term: &str) -> Result<Vec<PlatformInformation>> {
        self.list(&Query::new().contains("parent_company", term)).await
    }

    /// Platforms of a type; accepts spellings such as "GPU Cloud"
    pub async fn search_platforms_by_type(&self, platform_type: &str) -> Result<Vec<PlatformInformation>> {
        let platform_type =
            PlatformType::parse_lenient(platform_type).map_err(|e| CatalogError::InvalidEnumValue {
                table: Table::PlatformInformation.name().to_string(),
                column: "platform_type".to_string(),
                enum_name: e.enum_name.to_string(),
                value: e.value,
            })?;

        self.list(&Query::new().eq("platform_type", platform_type.as_str()))
            .await
    }

    /// Platforms offering at least one instance with a GPU
    pub async fn platforms_with_gpu_instances(&self) -> Result<Vec<PlatformInformation>> {
        let instances: Vec<ComputeInstance> = self
            .list(&Query::new().greater_than("gpu_count", 0.0))
            .await?;
        let platform_ids: BTreeSet<i64> = instances.iter().map(|i| i.platform_id).collect();
        debug!("{} GPU instances across {} platforms", instances.len(), platform_ids.len());

        let mut platforms = Vec::with_capacity(platform_ids.len());
        for id in platform_ids {
            if let Some(platform) = self.get_platform(id).await? {
                platforms.push(platform);
            }
        }
        Ok(platforms)
    }

    /// A platform together with its owned records and children
    pub async fn platform_profile(&self, id: i64) -> Result<Option<PlatformProfile>> {
        let Some(platform) = self.get_platform(id).await? else {
            return Ok(None);
        };

        let networking = match platform.networking_id {
            Some(network_id) => self.get::<NetworkCapabilities>(network_id).await?,
            None => None,
        };
        let security = match platform.security_id {
            Some(security_id) => self.get::<SecurityFeatures>(security_id).await?,
            None => None,
        };

        let instances: Vec<ComputeInstance> = self.children_of(id).await?;
        let mut compute_instances = Vec::with_capacity(instances.len());
        for instance in instances {
            let pricing = match instance.id {
                Some(instance_id) => self.children_of::<PricingModel>(instance_id).await?,
                None => Vec::new(),
            };
            compute_instances.push(ComputeInstanceProfile { instance, pricing });
        }

        Ok(Some(PlatformProfile {
            networking,
            security,
            regions: self.children_of(id).await?,
            certifications: self.children_of(id).await?,
            compute_instances,
            support_tiers: self.children_of(id).await?,
            software: self.children_of(id).await?,
            hardware: self.children_of(id).await?,
            platform,
        }))
    }

    // =========================================================================
    // Records owned by or attached to a platform
    // =========================================================================

    pub async fn create_network_capabilities(&self, network: &NetworkCapabilities) -> Result<i64> {
        self.create(network).await
    }

    pub async fn create_security_features(&self, security: &SecurityFeatures) -> Result<i64> {
        self.create(security).await
    }

    pub async fn create_compute_instance(&self, platform_id: i64, mut instance: ComputeInstance) -> Result<i64> {
        instance.platform_id = platform_id;
        self.create(&instance).await
    }

    pub async fn compute_instances_for_platform(&self, platform_id: i64) -> Result<Vec<ComputeInstance>> {
        self.children_of(platform_id).await
    }

    pub async fn create_geographic_region(&self, platform_id: i64, mut region: GeographicRegion) -> Result<i64> {
        region.platform_id = platform_id;
        self.create(&region).await
    }

    pub async fn regions_for_platform(&self, platform_id: i64) -> Result<Vec<GeographicRegion>> {
        self.children_of(platform_id).await
    }

    pub async fn create_certification(
        &self,
        platform_id: i64,
        mut certification: ComplianceCertification,
    ) -> Result<i64> {
        certification.platform_id = platform_id;
        self.create(&certification).await
    }

    pub async fn create_support_tier(&self, platform_id: i64, mut tier: SupportTier) -> Result<i64> {
        tier.platform_id = platform_id;
        self.create(&tier).await
    }

    pub async fn create_software(&self, platform_id: i64, mut software: ProprietarySoftware) -> Result<i64> {
        software.platform_id = platform_id;
        self.create(&software).await
    }

    pub async fn create_hardware(&self, platform_id: i64, mut hardware: ProprietaryHardware) -> Result<i64> {
        hardware.platform_id = platform_id;
        self.create(&hardware).await
    }
}

/// Serialize an entity into insertable columns: no `id`, no nulls.
fn to_record<E: Entity>(entity: &E) -> Result<Record> {
    match serde_json::to_value(entity)? {
        Value::Object(mut record) => {
            record.retain(|column, value| column != ID_COLUMN && !value.is_null());
            Ok(record)
        }
        other => Err(CatalogError::Internal(format!(
            "{} serialized to a non-object: {}",
            E::TABLE,
            other
        ))),
    }
}

fn from_record<E: Entity>(record: Record) -> Result<E> {
    Ok(serde_json::from_value(Value::Object(record))?)
}
