// tests/claim_exclusivity.rs

use std::collections::BTreeSet;
use std::time::Duration;

use depbuild::engine::{BuildScheduler, SessionOptions};
use depbuild::types::Verdict;
use depbuild_test_utils::builders::ManifestBuilder;
use depbuild_test_utils::fake_builder::{FAKE_BUILDER, FakeBuilds};
use proptest::prelude::*;

/// Dependency lists for `m_0..m_n`; `m_i` only depends on lower indices and
/// the last module depends on every other one, so it is a valid target for
/// the whole graph.
fn dag_strategy(max_modules: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2..=max_modules).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n).prop_map(
            move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        if i == n - 1 {
                            (0..i).collect()
                        } else if i == 0 {
                            Vec::new()
                        } else {
                            let set: BTreeSet<usize> = potential.into_iter().map(|d| d % i).collect();
                            set.into_iter().collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn every_node_is_built_once_by_one_worker(
        deps in dag_strategy(10),
        workers in 1usize..8,
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let fakes = FakeBuilds::new();
        fakes.set_delay(Duration::from_millis(1));

        let mut builder = ManifestBuilder::new();
        for (i, d) in deps.iter().enumerate() {
            let names: Vec<String> = d.iter().map(|j| format!("m_{j}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            builder = builder.module(&format!("m_{i}"), FAKE_BUILDER, &refs);
        }
        let target = format!("m_{}", deps.len() - 1);
        let graph = builder.graph(&target, &fakes.registry());

        let options = SessionOptions {
            workers,
            tick: Duration::from_millis(5),
            extra_args: String::new(),
        };
        let report = rt
            .block_on(async {
                tokio::time::timeout(Duration::from_secs(10), BuildScheduler::new(options).schedule(graph)).await
            })
            .unwrap()
            .unwrap();

        prop_assert_eq!(report.verdict, Verdict::Success);
        prop_assert_eq!(fakes.overlaps(), 0);
        prop_assert!(fakes.max_running() <= workers);

        let order = fakes.order();
        for (i, d) in deps.iter().enumerate() {
            let module = format!("m_{i}");
            prop_assert_eq!(fakes.builds(&module), 1);
            let pos = order.iter().position(|m| *m == module).unwrap();
            for j in d {
                let dep = format!("m_{j}");
                let dep_pos = order.iter().position(|m| *m == dep).unwrap();
                prop_assert!(dep_pos < pos, "{} started before {}", module, dep);
            }
        }
    }
}
