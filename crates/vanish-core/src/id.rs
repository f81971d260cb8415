use uuid::Uuid;

/// Produces fresh identifiers for new secrets. Uniqueness is best-effort;
/// the save path still checks the repository.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs rendered without hyphens (URL friendly).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
