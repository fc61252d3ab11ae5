#![no_main]

use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use mutatis::Session;
use workload_traces_fuzzing::Case;

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    let _ = env_logger::try_init();

    // With probability of about 1/8, just use the default mutator.
    if seed.count_ones() % 8 == 0 {
        return fuzzer_mutate(data, size, max_size);
    }

    // Decode the case from the data, or use the default case if that fails.
    let mut case = Case::from_bytes(&data[..size]).unwrap_or_default();

    let mut session = Session::new().seed(seed.into()).shrink(max_size < size);

    if session.mutate(&mut case).is_ok() {
        // Re-encode the mutated case back into `data`, dropping scripted
        // choices from the end until it fits.
        loop {
            if let Some(new_size) = case.encode_into(data) {
                return new_size;
            }
            if !case.pop() {
                break;
            }
        }
    }

    // If we failed to mutate the case for whatever reason, fall back to the
    // fuzzer's default mutation strategies.
    fuzzer_mutate(data, size, max_size)
});

fuzz_target!(|data: &[u8]| {
    let _ = env_logger::try_init();
    if let Some(case) = Case::from_bytes(data) {
        if let Err(e) = case.run() {
            panic!("error: {e}");
        }
    }
});
