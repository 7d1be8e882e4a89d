use sha2::{Digest, Sha256};

use crate::types::{ImportMembers, Target};

/// 64-bit deterministic digest identifying a (target, module, members) triple.
pub type CacheKey = u64;

/// Hashes one import into its cache key.
///
/// Named member lists are sorted before hashing, so the key is insensitive
/// to the order members appear in source. The namespace/default tags are
/// hashed behind an extra NUL so they can never collide with a member list.
pub fn hash_import(target: Target, name: &str, members: &ImportMembers) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(target.tag().as_bytes());
    hasher.update([0]);

    match members {
        ImportMembers::NamedList(names) => {
            let mut sorted = names.clone();
            sorted.sort();
            for member in sorted {
                hasher.update(member.as_bytes());
                hasher.update([0]);
            }
        }
        tagged => {
            hasher.update([0]);
            if let Some(tag) = tagged.tag() {
                hasher.update(tag.as_bytes());
            }
        }
    }

    let digest = hasher.finalize();
    let mut key_bytes = [0u8; 8];
    key_bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(key_bytes)
}
