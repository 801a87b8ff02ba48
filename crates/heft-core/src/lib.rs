pub mod category;
pub mod error;
pub mod prediction;
pub mod reconcile;
pub mod record;
pub mod schema;

pub use category::ObesityCategory;
pub use error::{PredictError, Result, Stage};
pub use prediction::PredictionResult;
pub use reconcile::reconcile;
pub use record::{FullRecord, ObesityInput, RawInput};
pub use schema::{Attribute, AttributeSource, FeatureSchema, ValueKind};
