//! Property-Based Tests for key material and token equality
//!
//! 1. SEED INTEGRITY: an encoded seed always decodes to the same key pair
//! 2. ROLE SEPARATION: a key's role survives encoding
//! 3. CANONICAL EQUALITY: re-signing identical claims never looks like a change

use proptest::prelude::*;
use trustchain_core::claims::{AccountData, AccountLimits, Permissions, CLAIMS_VERSION};
use trustchain_core::nkey::{decode_public_key, decode_seed, is_valid_public_key};
use trustchain_core::token;
use trustchain_core::{Claims, KeyPair, KeyPrefix, NatsClaims};

fn prefix_strategy() -> impl Strategy<Value = KeyPrefix> {
    prop_oneof![
        Just(KeyPrefix::Operator),
        Just(KeyPrefix::Account),
        Just(KeyPrefix::User),
    ]
}

fn account_claims(name: &str, subject: &str, signing_keys: Vec<String>) -> Claims {
    Claims::new(
        name,
        subject,
        NatsClaims::Account(AccountData {
            imports: vec![],
            exports: vec![],
            limits: AccountLimits::default(),
            signing_keys,
            default_permissions: Permissions::default(),
            version: CLAIMS_VERSION,
        }),
    )
}

// =============================================================================
// SEED INTEGRITY
// =============================================================================

proptest! {
    /// Any raw seed survives the text encoding unchanged
    #[test]
    fn prop_seed_roundtrip(prefix in prefix_strategy(), raw in any::<[u8; 32]>()) {
        let kp = KeyPair::from_raw_seed(prefix, &raw);

        let encoded = kp.seed();
        let (decoded_prefix, decoded_raw) = decode_seed(&encoded).expect("seed should decode");
        prop_assert_eq!(decoded_prefix, prefix);
        prop_assert_eq!(decoded_raw, raw);

        let restored = KeyPair::from_seed(&encoded).expect("seed should load");
        prop_assert_eq!(restored.public_key(), kp.public_key());
    }

    /// Public keys carry their role and nothing else validates them
    #[test]
    fn prop_public_key_role(prefix in prefix_strategy(), raw in any::<[u8; 32]>()) {
        let kp = KeyPair::from_raw_seed(prefix, &raw);
        let public_key = kp.public_key();

        prop_assert!(public_key.starts_with(prefix.letter()));
        prop_assert!(is_valid_public_key(&public_key, prefix));

        let (decoded_prefix, _) = decode_public_key(&public_key).expect("public key should decode");
        prop_assert_eq!(decoded_prefix, prefix);
    }

    /// Flipping a data character of a seed never yields the original key
    #[test]
    fn prop_corrupted_seed_rejected(raw in any::<[u8; 32]>(), position in 0usize..64) {
        let kp = KeyPair::from_raw_seed(KeyPrefix::Account, &raw);
        let encoded = kp.seed();

        let mut chars: Vec<char> = encoded.chars().collect();
        // the final character carries padding bits
        let index = position % (chars.len() - 1);
        chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();

        match KeyPair::from_seed(&corrupted) {
            Ok(restored) => prop_assert_ne!(restored.public_key(), kp.public_key()),
            Err(_) => {}
        }
    }
}

// =============================================================================
// CANONICAL EQUALITY
// =============================================================================

proptest! {
    /// Signing the same claims at different times yields canonically equal claims
    #[test]
    fn prop_reissue_is_not_a_change(
        name in "[a-z]{3,12}",
        first_iat in 1_600_000_000i64..1_700_000_000,
        delta in 1i64..1_000_000,
    ) {
        let issuer = KeyPair::create(KeyPrefix::Operator);
        let subject = KeyPair::create(KeyPrefix::Account);
        let claims = account_claims(&name, &subject.public_key(), vec![]);

        let (first, first_token) = token::encode_at(&claims, &issuer, first_iat).expect("encode");
        let (second, _) = token::encode_at(&claims, &issuer, first_iat + delta).expect("encode");

        prop_assert!(first.canonical_eq(&second));

        let stored = token::decode(&first_token).expect("decode");
        prop_assert!(stored.canonical_eq(&second));
    }

    /// Any content change is visible through canonical equality
    #[test]
    fn prop_content_change_detected(
        name in "[a-z]{3,12}",
        other in "[a-z]{3,12}",
    ) {
        prop_assume!(name != other);

        let issuer = KeyPair::create(KeyPrefix::Operator);
        let subject = KeyPair::create(KeyPrefix::Account);

        let (stored, _) = token::encode(&account_claims(&name, &subject.public_key(), vec![]), &issuer)
            .expect("encode");
        let (fresh, _) = token::encode(&account_claims(&other, &subject.public_key(), vec![]), &issuer)
            .expect("encode");

        prop_assert!(!stored.canonical_eq(&fresh));
    }
}
