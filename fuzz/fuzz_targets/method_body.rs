#![no_main]

use dexscope::{DecoderConfig, MethodBody, NoContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig::strict();
    let Ok(body) = MethodBody::with_config(data, 0, &NoContext, config) else {
        return;
    };

    for instruction in &body.instructions() {
        if instruction.is_err() {
            break;
        }
    }

    if let Ok(tries) = body.try_blocks() {
        for block in tries.iter().flatten() {
            let _ = block.handlers();
        }
    }

    for item in body.debug_items() {
        if item.is_err() {
            break;
        }
    }
});
