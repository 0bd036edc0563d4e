#![no_main]

use std::sync::{Arc, LazyLock};

use libfuzzer_sys::fuzz_target;

use kproxy_cache::{
    config::ValidatedRules,
    policy::{AdmissionEngine, compile::compile_rules, matcher::Target},
};

static ENGINE: LazyLock<AdmissionEngine> = LazyLock::new(|| {
    let rules = compile_rules(&ValidatedRules::builtin()).expect("builtin rules compile");
    AdmissionEngine::new(Arc::new(rules))
});

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let payload = &data[2..];
    let host_split = (data[0] as usize) % (payload.len() + 1);
    let (host_bytes, rest) = payload.split_at(host_split);
    let path_split = (data[1] as usize) % (rest.len() + 1);
    let (path_bytes, type_bytes) = rest.split_at(path_split);

    let host = String::from_utf8_lossy(host_bytes);
    let path = String::from_utf8_lossy(path_bytes);
    let content_type = String::from_utf8_lossy(type_bytes);

    let target = Target::new(host.as_ref(), path.as_ref());
    let verdict = ENGINE.evaluate_target(&target, content_type.as_ref());
    let _ = ENGINE.resolve(verdict, content_type.as_ref());

    let url = format!("http://{host}{path}");
    if let Ok(uri) = url.parse::<http::Uri>() {
        let _ = ENGINE.should_cache(&uri, content_type.as_ref());
    }
    let _ = ENGINE.evaluate_url(&url, content_type.as_ref());
});
