#![no_main]
use libfuzzer_sys::fuzz_target;

use xwire::buffer::Buffer;
use xwire::config::Config;
use xwire::decoder::ReadContext;
use xwire::resolver::TypeResolverBuilder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes through the full message decoder: must error, never
    // panic. Primitive roots cover header, ref flags and type-id dispatch.
    let resolver = TypeResolverBuilder::new().build().unwrap();
    let mut ctx = ReadContext::new(
        resolver.clone(),
        Config::new(),
        Buffer::from_vec(data.to_vec()),
    );
    let _ = ctx.deserialize::<i64>();

    let mut ctx = ReadContext::new(resolver.clone(), Config::new(), Buffer::from_vec(data.to_vec()));
    let _ = ctx.deserialize::<String>();

    let mut ctx = ReadContext::new(resolver, Config::new(), Buffer::from_vec(data.to_vec()));
    let _ = ctx.deserialize::<Vec<i32>>();
});
