//! Typed catalog access
//!
//! [`PlatformCatalog`] wraps a [`crate::store::CatalogStore`] and exposes the
//! catalog as Rust structs, one per table, plus the lookups the platform
//! registry needs: by name, by type, by parent company and by GPU offering.

mod entities;
mod service;

pub use entities::{
    ComplianceCertification, ComputeInstance, ComputeInstanceProfile, Entity, GeographicRegion,
    NetworkCapabilities, PlatformInformation, PlatformProfile, PricingModel, ProprietaryHardware,
    ProprietarySoftware, SecurityFeatures, SupportTier,
};
pub use service::{PlatformCatalog, DEFAULT_PAGE_SIZE};
