#![no_main]

use libfuzzer_sys::fuzz_target;

use kproxy_cache::{config::parse_rules, policy::compile::compile_rules};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(rules) = parse_rules(text) {
        let _ = compile_rules(&rules);
    }
});
