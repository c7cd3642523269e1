//! Deterministic identifiers.
//!
//! Records that must exist at most once per logical key get ids derived from
//! that key, so concurrent writers collide on the primary key instead of
//! creating duplicates.

use uuid::Uuid;

/// Namespace for direct conversation ids (UUID v5).
const DIRECT_CONVERSATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1e_2b7c_4d3a_5e90_8a1b_c2d3_e4f5_0617);

/// Sort two user ids ascending.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Match id for an unordered pair: `{lower}_{higher}`.
pub fn match_id(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = ordered_pair(a, b);
    format!("{lo}_{hi}")
}

pub fn reaction_id(message_id: Uuid, user_id: Uuid, emoji: &str) -> String {
    format!("{message_id}_{user_id}_{emoji}")
}

pub fn receipt_id(message_id: Uuid, user_id: Uuid) -> String {
    format!("{message_id}_{user_id}")
}

/// Stable conversation id for the direct conversation between two users.
pub fn direct_conversation_id(a: Uuid, b: Uuid) -> Uuid {
    Uuid::new_v5(&DIRECT_CONVERSATION_NAMESPACE, match_id(a, b).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_id_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(match_id(a, b), match_id(b, a));
        let (lo, hi) = ordered_pair(a, b);
        assert!(lo <= hi);
        assert_eq!(match_id(a, b), format!("{lo}_{hi}"));
    }

    #[test]
    fn direct_conversation_id_is_stable() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_conversation_id(a, b), direct_conversation_id(b, a));
        assert_ne!(direct_conversation_id(a, b), direct_conversation_id(a, Uuid::new_v4()));
    }

    #[test]
    fn reaction_and_receipt_keys() {
        let m = Uuid::nil();
        let u = Uuid::from_u128(u128::MAX);
        assert_eq!(
            reaction_id(m, u, "👍"),
            format!("{m}_{u}_👍")
        );
        assert_eq!(receipt_id(m, u), format!("{m}_{u}"));
    }
}
