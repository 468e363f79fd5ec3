#![no_main]
use libfuzzer_sys::fuzz_target;

use xwire::{MetaEncoding, MetaStringDecoder};

fuzz_target!(|data: &[u8]| {
    let decoder = MetaStringDecoder::new('.', '_');
    for encoding in [
        MetaEncoding::Extended,
        MetaEncoding::LowerSpecial,
        MetaEncoding::LowerUpperDigitSpecial,
        MetaEncoding::FirstToLowerSpecial,
        MetaEncoding::AllToLowerSpecial,
    ] {
        let _ = decoder.decode(data, encoding);
    }
});
