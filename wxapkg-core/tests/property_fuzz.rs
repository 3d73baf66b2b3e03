use proptest::prelude::*;
use wxapkg_core::{decrypt, parse_container};

proptest! {
    #[test]
    fn decrypt_does_not_panic_on_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        identifier in "wx[0-9a-f]{16}"
    ) {
        let _ = std::panic::catch_unwind(|| decrypt(&identifier, &data));
    }

    #[test]
    fn container_parse_does_not_panic_on_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..4096)
    ) {
        let _ = std::panic::catch_unwind(|| parse_container(data));
    }

    #[test]
    fn tokenizer_does_not_panic_on_arbitrary_strings(s in ".*") {
        let _ = std::panic::catch_unwind(|| wxapkg_core::tokenizer::tokenize(&s));
    }
}
