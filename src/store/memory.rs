//! In-process catalog store
//!
//! Holds every table in memory behind one `RwLock` and applies the same rules
//! the PostgreSQL schema enforces. Each call takes the write lock for its
//! whole duration, checks everything first and only then mutates, so a call
//! either commits fully or leaves the store untouched.

use crate::error::{CatalogError, Result};
use crate::schema::{
    foreign_key_values, validate_insert, validate_update, ColumnDefault, Record, Reference, Table,
    ID_COLUMN,
};
use crate::store::{CatalogStore, Query};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Default)]
struct State {
    rows: HashMap<Table, BTreeMap<i64, Record>>,
    last_ids: HashMap<Table, i64>,
}

impl State {
    fn table(&self, table: Table) -> Option<&BTreeMap<i64, Record>> {
        self.rows.get(&table)
    }

    fn exists(&self, table: Table, id: i64) -> bool {
        self.table(table).is_some_and(|rows| rows.contains_key(&id))
    }

    fn next_id(&mut self, table: Table) -> i64 {
        let last = self.last_ids.entry(table).or_insert(0);
        *last += 1;
        *last
    }

    /// Ids of rows in `table` whose `column` holds `id`
    fn referrers(&self, table: Table, column: &str, id: i64) -> Vec<i64> {
        self.table(table)
            .map(|rows| {
                rows.iter()
                    .filter(|(_, row)| row.get(column).and_then(Value::as_i64) == Some(id))
                    .map(|(row_id, _)| *row_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Foreign keys in `values` must resolve; owned records may have one owner.
    fn check_references(&self, table: Table, values: &Record, row_id: Option<i64>) -> Result<()> {
        for (fk, parent_id) in foreign_key_values(table, values) {
            if !self.exists(fk.references, parent_id) {
                return Err(CatalogError::ForeignKeyViolation {
                    table: table.name().to_string(),
                    column: fk.column.to_string(),
                    references: fk.references.name().to_string(),
                    id: parent_id,
                });
            }

            if fk.kind == Reference::Owned {
                let other_owner = self
                    .referrers(table, fk.column, parent_id)
                    .into_iter()
                    .any(|owner| Some(owner) != row_id);
                if other_owner {
                    return Err(CatalogError::OwnershipConflict {
                        table: fk.references.name().to_string(),
                        id: parent_id,
                        owner_table: table.name().to_string(),
                        owner_column: fk.column.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// The row plus the records it owns, i.e. everything one delete removes
    fn delete_set(&self, table: Table, id: i64) -> BTreeSet<(Table, i64)> {
        let mut set = BTreeSet::from([(table, id)]);

        if let Some(row) = self.table(table).and_then(|rows| rows.get(&id)) {
            for fk in table.def().owned_links() {
                if let Some(owned_id) = row.get(fk.column).and_then(Value::as_i64) {
                    set.insert((fk.references, owned_id));
                }
            }
        }

        set
    }
}

/// Catalog store kept entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in `table`
    pub async fn count(&self, table: Table) -> usize {
        self.state.read().await.table(table).map_or(0, BTreeMap::len)
    }
}

impl CatalogStore for MemoryStore {
    async fn insert(&self, table: Table, record: Record) -> Result<i64> {
        let mut row = validate_insert(table, &record)?;

        for column in table.def().columns {
            if column.default == Some(ColumnDefault::Now) && !row.contains_key(column.name) {
                row.insert(column.name.to_string(), Value::String(Utc::now().to_rfc3339()));
            }
        }

        let mut state = self.state.write().await;
        state.check_references(table, &row, None)?;

        let id = state.next_id(table);
        row.insert(ID_COLUMN.to_string(), Value::from(id));
        state.rows.entry(table).or_default().insert(id, row);

        info!("Created {} row with ID: {}", table, id);
        Ok(id)
    }

    async fn update(&self, table: Table, id: i64, changes: Record) -> Result<()> {
        let changes = validate_update(table, &changes)?;

        let mut state = self.state.write().await;
        if !state.exists(table, id) {
            return Err(CatalogError::NotFound {
                table: table.name().to_string(),
                id,
            });
        }

        state.check_references(table, &changes, Some(id))?;

        if let Some(row) = state.rows.get_mut(&table).and_then(|rows| rows.get_mut(&id)) {
            for (column, value) in changes {
                row.insert(column, value);
            }
        }

        info!("Updated {} row with ID: {}", table, id);
        Ok(())
    }

    async fn delete(&self, table: Table, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.exists(table, id) {
            debug!("Delete of missing {} row {} ignored", table, id);
            return Ok(false);
        }

        let doomed = state.delete_set(table, id);

        for &(target, target_id) in &doomed {
            for (dependent, fk) in target.dependents() {
                let blocking = state
                    .referrers(dependent, fk.column, target_id)
                    .into_iter()
                    .find(|referrer| !doomed.contains(&(dependent, *referrer)));

                if blocking.is_some() {
                    warn!(
                        "Delete of {} row {} rejected: referenced by {}.{}",
                        table, id, dependent, fk.column
                    );
                    return Err(CatalogError::DeleteRestricted {
                        table: target.name().to_string(),
                        id: target_id,
                        dependent_table: dependent.name().to_string(),
                        dependent_column: fk.column.to_string(),
                    });
                }
            }
        }

        for (target, target_id) in &doomed {
            if let Some(rows) = state.rows.get_mut(target) {
                rows.remove(target_id);
            }
        }

        info!("Deleted {} row with ID: {} ({} rows removed)", table, id, doomed.len());
        Ok(true)
    }

    async fn get(&self, table: Table, id: i64) -> Result<Option<Record>> {
        let state = self.state.read().await;
        Ok(state.table(table).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn find(&self, table: Table, query: &Query) -> Result<Vec<Record>> {
        let query = query.checked(table)?;
        let state = self.state.read().await;

        let Some(rows) = state.table(table) else {
            return Ok(Vec::new());
        };

        Ok(rows
            .values()
            .filter(|row| query.matches(row))
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BillingIncrement, DatacenterTier, PlatformType, PricingType};
    use serde_json::json;
    use std::sync::Arc;

    fn row(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    async fn platform(store: &MemoryStore, name: &str) -> i64 {
        store
            .insert(Table::PlatformInformation, row(json!({ "platform_name": name })))
            .await
            .unwrap()
    }

    /// A minimal valid row for each child table of a platform
    fn child_row(table: Table, platform_id: i64) -> Record {
        let value = match table {
            Table::GeographicRegions => json!({
                "platform_id": platform_id,
                "region_name": "US East",
                "region_code": "us-east-1",
                "country": "US",
            }),
            Table::ComplianceCertification => json!({
                "platform_id": platform_id,
                "certification_name": "SOC 2",
            }),
            Table::ComputeInstance => json!({ "platform_id": platform_id, "vcpus": 4 }),
            _ => json!({ "platform_id": platform_id }),
        };
        row(value)
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = platform(&store, "Acme Cloud").await;
        let b = platform(&store, "Beta Cloud").await;
        assert!(b > a);

        let fetched = store.get(Table::PlatformInformation, a).await.unwrap().unwrap();
        assert_eq!(fetched["id"], json!(a));
        assert_eq!(fetched["platform_name"], json!("Acme Cloud"));
        // Defaults to insertion time
        assert!(fetched["last_updated"].is_string());
    }

    #[tokio::test]
    async fn test_unresolved_foreign_key_creates_nothing() {
        let store = MemoryStore::new();

        for (table, _) in Table::PlatformInformation.dependents() {
            let err = store.insert(table, child_row(table, 999)).await.unwrap_err();
            assert!(
                matches!(err, CatalogError::ForeignKeyViolation { id: 999, .. }),
                "{}: {}",
                table,
                err
            );
            assert_eq!(store.count(table).await, 0);
        }

        let err = store
            .insert(Table::PricingModel, row(json!({ "compute_instance_id": 5 })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "referential_integrity_violation");

        let err = store
            .insert(
                Table::PlatformInformation,
                row(json!({ "platform_name": "Acme", "networking_id": 1 })),
            )
            .await
            .unwrap_err();
        assert!(err.is_referential_violation());
        assert_eq!(store.count(Table::PlatformInformation).await, 0);
    }

    #[tokio::test]
    async fn test_every_enum_label_is_insertable() {
        let store = MemoryStore::new();
        let platform_id = platform(&store, "Acme").await;

        for label in PlatformType::ALL {
            store
                .insert(
                    Table::PlatformInformation,
                    row(json!({ "platform_name": "P", "platform_type": label.as_str() })),
                )
                .await
                .unwrap();
        }
        for tier in DatacenterTier::ALL {
            store
                .insert(
                    Table::PlatformInformation,
                    row(json!({ "platform_name": "P", "primary_datacenter_tier": tier })),
                )
                .await
                .unwrap();
            let mut region = child_row(Table::GeographicRegions, platform_id);
            region.insert("datacenter_tier".to_string(), json!(tier));
            store.insert(Table::GeographicRegions, region).await.unwrap();
        }

        let instance_id = store
            .insert(Table::ComputeInstance, child_row(Table::ComputeInstance, platform_id))
            .await
            .unwrap();
        for pricing_type in PricingType::ALL {
            store
                .insert(
                    Table::PricingModel,
                    row(json!({ "compute_instance_id": instance_id, "pricing_type": pricing_type })),
                )
                .await
                .unwrap();
        }
        for increment in BillingIncrement::ALL {
            store
                .insert(
                    Table::PricingModel,
                    row(json!({ "compute_instance_id": instance_id, "billing_increment": increment })),
                )
                .await
                .unwrap();
        }

        assert_eq!(
            store.count(Table::PricingModel).await,
            PricingType::ALL.len() + BillingIncrement::ALL.len()
        );
    }

    #[tokio::test]
    async fn test_invalid_enum_labels_rejected() {
        let store = MemoryStore::new();
        let platform_id = platform(&store, "Acme").await;
        let instance_id = store
            .insert(Table::ComputeInstance, child_row(Table::ComputeInstance, platform_id))
            .await
            .unwrap();

        let mut region = child_row(Table::GeographicRegions, platform_id);
        region.insert("datacenter_tier".to_string(), json!("tier_6"));

        let cases = vec![
            (Table::PlatformInformation, row(json!({ "platform_name": "P", "platform_type": "Hyperscaler" }))),
            (Table::PlatformInformation, row(json!({ "platform_name": "P", "primary_datacenter_tier": "tier_0" }))),
            (Table::GeographicRegions, region),
            (Table::PricingModel, row(json!({ "compute_instance_id": instance_id, "pricing_type": "free" }))),
            (Table::PricingModel, row(json!({ "compute_instance_id": instance_id, "billing_increment": "per_week" }))),
        ];

        for (table, record) in cases {
            let before = store.count(table).await;
            let err = store.insert(table, record).await.unwrap_err();
            assert_eq!(err.code(), "invalid_enum_value");
            assert_eq!(store.count(table).await, before);
        }
    }

    #[tokio::test]
    async fn test_delete_platform_cascades_to_owned_records() {
        let store = MemoryStore::new();
        let network_id = store
            .insert(Table::NetworkCapabilities, row(json!({ "bandwidth_gbps": 100, "vpc_support": true })))
            .await
            .unwrap();
        let security_id = store
            .insert(Table::SecurityFeatures, row(json!({ "encryption_at_rest": true })))
            .await
            .unwrap();
        let platform_id = store
            .insert(
                Table::PlatformInformation,
                row(json!({
                    "platform_name": "Acme",
                    "networking_id": network_id,
                    "security_id": security_id,
                })),
            )
            .await
            .unwrap();

        assert!(store.delete(Table::PlatformInformation, platform_id).await.unwrap());

        assert!(store.get(Table::PlatformInformation, platform_id).await.unwrap().is_none());
        assert!(store.get(Table::NetworkCapabilities, network_id).await.unwrap().is_none());
        assert!(store.get(Table::SecurityFeatures, security_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_platform_with_children_rejected() {
        for (child_table, _) in Table::PlatformInformation.dependents() {
            let store = MemoryStore::new();
            let network_id = store.insert(Table::NetworkCapabilities, Record::new()).await.unwrap();
            let platform_id = store
                .insert(
                    Table::PlatformInformation,
                    row(json!({ "platform_name": "Acme", "networking_id": network_id })),
                )
                .await
                .unwrap();
            let child_id = store.insert(child_table, child_row(child_table, platform_id)).await.unwrap();

            let err = store.delete(Table::PlatformInformation, platform_id).await.unwrap_err();
            match err {
                CatalogError::DeleteRestricted { dependent_table, .. } => {
                    assert_eq!(dependent_table, child_table.name());
                }
                other => panic!("unexpected error: {}", other),
            }

            // Nothing moved, owned record included
            assert!(store.get(Table::PlatformInformation, platform_id).await.unwrap().is_some());
            assert!(store.get(Table::NetworkCapabilities, network_id).await.unwrap().is_some());
            assert!(store.get(child_table, child_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_owned_record_cannot_be_deleted_or_shared() {
        let store = MemoryStore::new();
        let network_id = store.insert(Table::NetworkCapabilities, Record::new()).await.unwrap();
        platform(&store, "Unrelated").await;
        let owner = store
            .insert(
                Table::PlatformInformation,
                row(json!({ "platform_name": "Acme", "networking_id": network_id })),
            )
            .await
            .unwrap();

        let err = store.delete(Table::NetworkCapabilities, network_id).await.unwrap_err();
        assert!(matches!(err, CatalogError::DeleteRestricted { .. }));

        let err = store
            .insert(
                Table::PlatformInformation,
                row(json!({ "platform_name": "Copycat", "networking_id": network_id })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ownership_conflict");

        // Re-asserting the same link on the owner is fine
        store
            .update(Table::PlatformInformation, owner, row(json!({ "networking_id": network_id })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_many_pricing_rows_per_instance() {
        let store = MemoryStore::new();
        let platform_id = platform(&store, "Acme").await;
        let instance_id = store
            .insert(Table::ComputeInstance, child_row(Table::ComputeInstance, platform_id))
            .await
            .unwrap();

        for (pricing_type, price) in [("on_demand", 0.10), ("reserved", 0.06)] {
            store
                .insert(
                    Table::PricingModel,
                    row(json!({
                        "compute_instance_id": instance_id,
                        "pricing_type": pricing_type,
                        "price_per_hour": price,
                    })),
                )
                .await
                .unwrap();
        }

        let rows = store
            .find(Table::PricingModel, &Query::new().eq("compute_instance_id", instance_id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["pricing_type"], json!("on_demand"));
        assert_eq!(rows[1]["pricing_type"], json!("reserved"));
    }

    #[tokio::test]
    async fn test_arrays_keep_insertion_order() {
        let store = MemoryStore::new();
        let specializations = json!(["training", "inference", "training", "batch"]);
        let id = store
            .insert(
                Table::PlatformInformation,
                row(json!({ "platform_name": "Acme", "specializations": specializations })),
            )
            .await
            .unwrap();

        let fetched = store.get(Table::PlatformInformation, id).await.unwrap().unwrap();
        assert_eq!(fetched["specializations"], specializations);
    }

    #[tokio::test]
    async fn test_update_changes_named_columns_only() {
        let store = MemoryStore::new();
        let platform_id = platform(&store, "Acme").await;
        let instance_id = store
            .insert(
                Table::ComputeInstance,
                row(json!({ "platform_id": platform_id, "vcpus": 4, "gpu_type": "H100" })),
            )
            .await
            .unwrap();

        store
            .update(Table::ComputeInstance, instance_id, row(json!({ "vcpus": 8 })))
            .await
            .unwrap();

        let fetched = store.get(Table::ComputeInstance, instance_id).await.unwrap().unwrap();
        assert_eq!(fetched["vcpus"], json!(8));
        assert_eq!(fetched["gpu_type"], json!("H100"));

        let err = store
            .update(Table::ComputeInstance, instance_id, row(json!({ "platform_id": 77 })))
            .await
            .unwrap_err();
        assert!(err.is_referential_violation());

        let err = store
            .update(Table::ComputeInstance, 404, row(json!({ "vcpus": 2 })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_delete_missing_row_reports_false() {
        let store = MemoryStore::new();
        assert!(!store.delete(Table::SupportTier, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_acme_scenario() {
        let store = MemoryStore::new();

        let k = store
            .insert(
                Table::PlatformInformation,
                row(json!({ "platform_name": "Acme Cloud", "platform_type": "hyperscaler" })),
            )
            .await
            .unwrap();
        let c = store
            .insert(Table::ComputeInstance, row(json!({ "platform_id": k, "vcpus": 4 })))
            .await
            .unwrap();
        let p = store
            .insert(
                Table::PricingModel,
                row(json!({ "compute_instance_id": c, "pricing_type": "on_demand", "price_per_hour": 0.10 })),
            )
            .await
            .unwrap();

        let err = store.delete(Table::PlatformInformation, k).await.unwrap_err();
        assert!(err.is_referential_violation());

        let err = store.delete(Table::ComputeInstance, c).await.unwrap_err();
        assert!(err.is_referential_violation());

        assert!(store.delete(Table::PricingModel, p).await.unwrap());
        assert!(store.delete(Table::ComputeInstance, c).await.unwrap());
        assert!(store.delete(Table::PlatformInformation, k).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_paging() {
        let store = MemoryStore::new();
        for i in 0..5 {
            platform(&store, &format!("Platform {}", i)).await;
        }

        let page = store
            .find(Table::PlatformInformation, &Query::new().offset(1).limit(2))
            .await
            .unwrap();
        let names: Vec<&str> = page.iter().map(|r| r["platform_name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Platform 1", "Platform 2"]);

        assert!(store.find(Table::SupportTier, &Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sibling_inserts() {
        let store = Arc::new(MemoryStore::new());
        let platform_id = platform(&store, "Acme").await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(Table::GeographicRegions, child_row(Table::GeographicRegions, platform_id))
                    .await
            }));
        }

        let mut ids = BTreeSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_racing_child_insert_never_orphans() {
        for _ in 0..20 {
            let store = Arc::new(MemoryStore::new());
            let platform_id = platform(&store, "Acme").await;

            let inserter = {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(Table::SupportTier, child_row(Table::SupportTier, platform_id))
                        .await
                })
            };
            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { store.delete(Table::PlatformInformation, platform_id).await })
            };

            let inserted = inserter.await.unwrap();
            let deleted = deleter.await.unwrap();

            match (inserted, deleted) {
                // Child first: the delete must have been rejected
                (Ok(_), Err(err)) => assert!(err.is_referential_violation()),
                // Delete first: the child insert must have failed
                (Err(err), Ok(true)) => assert!(err.is_referential_violation()),
                other => panic!("orphan or lost write: {:?}", other),
            }

            let platform_alive = store.get(Table::PlatformInformation, platform_id).await.unwrap().is_some();
            let children = store.count(Table::SupportTier).await;
            assert!(platform_alive || children == 0);
        }
    }
}
