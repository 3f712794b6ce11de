pub mod fields;
pub mod normalize;
pub mod record;
pub mod upload;

pub use fields::{FIELD_MAPPING, FieldKey, FieldMap, NOT_FOUND, REGISTRY_FIELDS, RegistryField};
pub use normalize::{FieldValue, ScrapedInspection, parse_date, parse_datetime};
pub use record::{InspectionRecord, InspectorRef, NewInspection, RegistryStatus};
pub use upload::{ALLOWED_EXTENSIONS, UploadError, check_upload};
