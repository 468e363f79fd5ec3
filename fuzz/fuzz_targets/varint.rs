#![no_main]
use libfuzzer_sys::fuzz_target;

use xwire::buffer::Buffer;

fuzz_target!(|data: &[u8]| {
    let mut b = Buffer::from_vec(data.to_vec());
    let _ = b.read_var_uint32();
    let _ = b.read_var_uint64();
    let _ = b.read_var_uint36_small();
    let _ = b.read_var_int32();
    let _ = b.read_var_int64();
    let _ = b.read_tagged_int64();
    let _ = b.read_tagged_uint64();
});
