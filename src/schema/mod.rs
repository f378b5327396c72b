mod ddl;
mod enums;
mod installer;
mod tables;
mod validate;
mod verifier;

pub use ddl::{compute_checksum, is_valid_identifier, CatalogDdl};
pub use enums::{
    BillingIncrement, ComplianceStatus, DatacenterTier, EnumType, PlatformType, PricingType,
    UnknownLabel, ENUM_TYPES,
};
pub use installer::{InstallOutcome, SchemaInstaller};
pub use tables::{
    fk_constraint_name, unique_constraint_name, ColumnDef, ColumnDefault, ColumnType, ForeignKeyDef,
    Reference, Table, TableDef,
};
pub use validate::{
    foreign_key_values, normalize_value, validate_insert, validate_update, Record, ID_COLUMN,
};
pub use verifier::{
    compare as compare_schema, LabelMismatch, LiveColumn, LiveSchema, SchemaVerifier, TableMismatch,
    TableVerification, TypeVerification, VerificationResult,
};
