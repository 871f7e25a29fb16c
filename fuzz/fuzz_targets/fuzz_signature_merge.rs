#![no_main]

use apiset_merge::generics::{merge_class_signatures, merge_method_signatures};
use libfuzzer_sys::fuzz_target;

mod utils;

// Input is two signatures separated by a newline. Whatever merges must print back to a
// parseable signature.
fuzz_target!(|data: &[u8]| {
    let Some(text) = utils::truncate_utf8(data) else {
        return;
    };
    let Some((left, right)) = text.split_once('\n') else {
        return;
    };
    // Identical inputs are passed through unparsed.
    if left == right {
        return;
    }

    if let Ok(Some(merged)) = merge_method_signatures(Some(left), Some(right), true) {
        apiset_classfile::parse_method_signature(&merged)
            .expect("merged method signature must parse");
    }
    if let Ok(Some(merged)) = merge_class_signatures(Some(left), Some(right)) {
        apiset_classfile::parse_class_signature(&merged)
            .expect("merged class signature must parse");
    }
});
