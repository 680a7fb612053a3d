//! Property tests for query-shape validation.

use proptest::prelude::*;
use rrdp_common::{Error, Ordering, QuerySpec};

fn ordering() -> impl Strategy<Value = Ordering> {
    prop_oneof![Just(Ordering::Ascending), Just(Ordering::Descending)]
}

proptest! {
    #[test]
    fn ranged_queries_accept_any_paging(
        begin in 0u64..1_000_000,
        page in 0u32..100,
        size in 0u32..1000,
        order in ordering(),
    ) {
        let spec = QuerySpec::for_entity("temp")
            .with_begin(begin)
            .with_page(page, size)
            .with_ordering(order);
        prop_assert!(spec.validate().is_ok());
    }

    #[test]
    fn latest_queries_accept_only_default_paging(
        page in 0u32..4,
        size in 0u32..4,
        order in ordering(),
    ) {
        let spec = QuerySpec::for_entity("temp")
            .with_page(page, size)
            .with_ordering(order);
        let expect_ok = page == 0 && size == 1 && order == Ordering::Descending;
        match spec.validate() {
            Ok(name) => {
                prop_assert!(expect_ok);
                prop_assert_eq!(name, "temp");
            }
            Err(Error::UnsupportedQuery(_)) => prop_assert!(!expect_ok),
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}
