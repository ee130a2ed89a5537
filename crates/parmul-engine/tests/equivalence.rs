use std::convert::Infallible;

use engine::{
    sequential, Backend, ClampPolicy, Coordinator, Granularity, MatrixRef, Persist, Populate,
    RunConfigBuilder,
};

/// Interleaved LCG fill, one value for A then one for B per cell.
struct Lcg(u32);

impl Populate for Lcg {
    fn populate(&mut self, _size: usize, a: &mut [f64], b: &mut [f64]) {
        for (x, y) in a.iter_mut().zip(b.iter_mut()) {
            self.0 = self.0.wrapping_mul(1103515245).wrapping_add(12345);
            *x = ((self.0 >> 16) % 1000) as f64 / 7.0;
            self.0 = self.0.wrapping_mul(1103515245).wrapping_add(12345);
            *y = ((self.0 >> 16) % 1000) as f64 / 3.0;
        }
    }
}

#[derive(Default)]
struct Capture(Vec<f64>);

impl Persist for Capture {
    type Error = Infallible;

    fn persist(&mut self, c: MatrixRef<'_>) -> Result<(), Infallible> {
        self.0 = c.as_slice().to_vec();
        Ok(())
    }
}

fn baseline(size: usize, seed: u32) -> Vec<f64> {
    let mut sink = Capture::default();
    sequential::run(size, &mut Lcg(seed), &mut sink).unwrap();
    sink.0
}

fn parallel(size: usize, seed: u32, g: Granularity, backend: Backend, workers: usize) -> Vec<f64> {
    let config = RunConfigBuilder::default()
        .size(size)
        .workers(workers)
        .granularity(g)
        .backend(backend)
        .clamp(ClampPolicy::Never)
        .build()
        .unwrap();
    let mut sink = Capture::default();
    let report = Coordinator::new(config)
        .unwrap()
        .run(&mut Lcg(seed), &mut sink)
        .unwrap();
    assert_eq!(report.workers, workers);
    sink.0
}

#[test]
fn strategies_are_bit_identical_to_sequential() {
    let size = 16;
    let want = baseline(size, 7);
    for backend in [Backend::Process, Backend::Thread] {
        for g in [
            Granularity::Element,
            Granularity::Row,
            Granularity::Block { block_size: 4 },
            Granularity::Block { block_size: 16 },
        ] {
            for workers in [1, 2, 5] {
                let got = parallel(size, 7, g, backend, workers);
                assert!(
                    got.iter().zip(&want).all(|(x, y)| x.to_bits() == y.to_bits()),
                    "{backend:?} {g} workers={workers}"
                );
            }
        }
    }
}

#[test]
fn over_provisioned_pool_completes() {
    let size = 3;
    let want = baseline(size, 99);
    // Row granularity has 3 units; 10 workers leaves 7 with nothing to claim.
    assert_eq!(parallel(size, 99, Granularity::Row, Backend::Process, 10), want);
    assert_eq!(parallel(size, 99, Granularity::Row, Backend::Thread, 10), want);
}

#[test]
fn zero_size_run_is_a_no_op() {
    for g in [
        Granularity::Element,
        Granularity::Row,
        Granularity::Block { block_size: 2 },
    ] {
        assert!(parallel(0, 1, g, Backend::Process, 3).is_empty());
    }
    assert!(baseline(0, 1).is_empty());
}

#[test]
fn report_serializes() {
    let config = RunConfigBuilder::default()
        .size(4)
        .workers(2)
        .granularity(Granularity::Block { block_size: 2 })
        .cores(8)
        .build()
        .unwrap();
    let report = Coordinator::new(config)
        .unwrap()
        .run(&mut Lcg(3), &mut Capture::default())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "parallel");
    assert_eq!(json["granularity"], "block");
    assert_eq!(json["block_size"], 2);
    assert_eq!(json["backend"], "process");
    assert_eq!(json["units"], 4);
    assert_eq!(json["cores"], 8);
}
