// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

use kvidxkit_backend_heed::HeedBackend;
use kvidxkit_core::Backend;
use kvidxkit_testing::conformance::run_conformance;
use kvidxkit_testing::tempdir::with_temp_path;

#[test]
fn heed_backend_passes_conformance_suite() {
    with_temp_path("conformance-env", |path| {
        let mut counter = 0u32;
        run_conformance(|| {
            counter += 1;
            let scoped = path.with_file_name(format!("conformance-env-{counter}"));
            Box::new(HeedBackend::open(scoped).unwrap()) as Box<dyn Backend>
        });
    });
}
