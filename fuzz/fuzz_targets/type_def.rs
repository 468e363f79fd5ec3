#![no_main]
use libfuzzer_sys::fuzz_target;

use xwire::buffer::Buffer;
use xwire::{MetaStringDecoder, TypeMeta};

fuzz_target!(|data: &[u8]| {
    let ns_decoder = MetaStringDecoder::new('.', '_');
    let tn_decoder = MetaStringDecoder::new('$', '_');
    let mut b = Buffer::from_vec(data.to_vec());
    let _ = TypeMeta::from_bytes(&mut b, &ns_decoder, &tn_decoder);
});
