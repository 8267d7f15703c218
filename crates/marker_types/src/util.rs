use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Time-ordered unique identifier used for run and task ids.
pub fn create_uuid7() -> String {
    Uuid::now_v7().to_string()
}

/// Derive a stable eval id from the eval configuration.
///
/// The id is a pure function of the eval name, the set of scorer eval ids
/// (order-insensitive) and the dataset id, so re-running the same
/// configuration yields the same eval id while each execution still gets a
/// fresh run id.
pub fn derive_eval_id(name: &str, scorer_eval_ids: &[String], dataset_id: &str) -> String {
    let mut sorted = scorer_eval_ids.to_vec();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    for eval_id in &sorted {
        hasher.update(b"\x1f");
        hasher.update(eval_id.as_bytes());
    }
    hasher.update(b"\x1f");
    hasher.update(dataset_id.as_bytes());

    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", name, &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_eval_id_deterministic() {
        let a = derive_eval_id(
            "my_eval",
            &["exact.v1".to_string(), "diff.v3".to_string()],
            "ds1",
        );
        let b = derive_eval_id(
            "my_eval",
            &["diff.v3".to_string(), "exact.v1".to_string()],
            "ds1",
        );
        assert_eq!(a, b);
        assert!(a.starts_with("my_eval-"));
    }

    #[test]
    fn test_derive_eval_id_varies_with_inputs() {
        let base = derive_eval_id("my_eval", &["exact.v1".to_string()], "ds1");
        assert_ne!(
            base,
            derive_eval_id("my_eval", &["exact.v2".to_string()], "ds1")
        );
        assert_ne!(
            base,
            derive_eval_id("my_eval", &["exact.v1".to_string()], "ds2")
        );
        assert_ne!(
            base,
            derive_eval_id("other_eval", &["exact.v1".to_string()], "ds1")
        );
    }

    #[test]
    fn test_create_uuid7_unique() {
        assert_ne!(create_uuid7(), create_uuid7());
    }
}
