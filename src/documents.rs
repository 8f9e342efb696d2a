//! Document storage boundary (excluded collaborator).
//!
//! The portal lists and uploads user documents through an external object
//! store. Only the contract lives here: keys are `{user_id}/{file_name}` and
//! public URLs are issued by the store. No hosted implementation ships with
//! this crate.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub name: String,
    pub public_url: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, user_id: &Uuid) -> anyhow::Result<Vec<StoredDocument>>;

    async fn upload(&self, user_id: &Uuid, file_name: &str, bytes: Vec<u8>)
        -> anyhow::Result<()>;

    fn public_url(&self, user_id: &Uuid, file_name: &str) -> String;
}

/// Object key for a user document.
pub fn document_key(user_id: &Uuid, file_name: &str) -> String {
    format!("{user_id}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_user_scoped() {
        let user = Uuid::nil();
        assert_eq!(
            document_key(&user, "contrato.pdf"),
            "00000000-0000-0000-0000-000000000000/contrato.pdf"
        );
    }
}
