use proptest::prelude::*;

use scrip_types::{Address, Amount, AssetName, ObjectId};

fn user_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}\\.[a-z]{2,5}"
}

fn code_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9-]{0,7}"
}

proptest! {
    /// Address roundtrip: parse(display(a)) == a.
    #[test]
    fn address_roundtrip(user in user_strategy(), host in host_strategy()) {
        let raw = format!("{user}@{host}");
        let address = Address::parse(&raw).unwrap();
        prop_assert_eq!(address.user(), user.as_str());
        prop_assert_eq!(address.host(), host.as_str());
        prop_assert_eq!(Address::parse(&address.to_string()).unwrap(), address);
    }

    /// Asset name roundtrip, including the scale bounds.
    #[test]
    fn asset_name_roundtrip(
        user in user_strategy(),
        host in host_strategy(),
        code in code_strategy(),
        scale in 0u8..=24,
    ) {
        let raw = format!("{user}@{host}:{code}.{scale}");
        let asset = AssetName::parse(&raw).unwrap();
        prop_assert_eq!(asset.code(), code.as_str());
        prop_assert_eq!(asset.scale(), scale);
        prop_assert_eq!(AssetName::parse(&asset.to_string()).unwrap(), asset);
    }

    /// Scales beyond 24 never parse.
    #[test]
    fn asset_scale_out_of_bounds_rejected(
        user in user_strategy(),
        host in host_strategy(),
        code in code_strategy(),
        scale in 25u8..,
    ) {
        let raw = format!("{user}@{host}:{code}.{scale}");
        prop_assert!(AssetName::parse(&raw).is_err());
    }

    /// Object id roundtrip: parse(display(id)) == id.
    #[test]
    fn object_id_roundtrip(
        user in user_strategy(),
        host in host_strategy(),
        token in "[a-z]{4,12}_[0-9a-f]{8,16}",
    ) {
        let raw = format!("{user}@{host}[{token}]");
        let id = ObjectId::parse(&raw).unwrap();
        prop_assert_eq!(id.token(), token.as_str());
        prop_assert_eq!(ObjectId::parse(&id.to_string()).unwrap(), id);
    }

    /// Checked amount arithmetic never wraps.
    #[test]
    fn amount_checked_arithmetic(a in any::<u128>(), b in any::<u128>()) {
        let (a, b) = (Amount::new(a), Amount::new(b));
        match a.checked_add(b) {
            Some(sum) => prop_assert_eq!(sum.checked_sub(b), Some(a)),
            None => prop_assert!(a.raw().checked_add(b.raw()).is_none()),
        }
    }
}
