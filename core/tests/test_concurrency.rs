/// Shared-layer evaluation from many threads, and trainer-style mutation
/// between forward calls.

use std::sync::Arc;

use resfields_core::{LayerConfig, ResFieldLinear, TemporalMode, Tensor, TimeQuery};
use resfields_core::tensor::SimpleRng;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn input(batch: usize, seed: u64) -> Tensor {
    let mut rng = SimpleRng::new(seed);
    let mut data = vec![0.0f32; batch * 4 * 8];
    rng.fill_uniform(&mut data, 1.0);
    Tensor::from_vec(data, &[batch, 4, 8]).unwrap()
}

#[test]
fn test_concurrent_forward_matches_serial() {
    init_tracing();
    let cfg = LayerConfig::test_config().with_mode(TemporalMode::Interpolation);
    let layer = Arc::new(ResFieldLinear::new(cfg, 17).unwrap());

    let times: Vec<Vec<f32>> = (0..8)
        .map(|i| (0..3).map(|j| ((i * 3 + j) as f32 / 12.0) - 1.0).collect())
        .collect();
    let serial: Vec<Tensor> = times
        .iter()
        .enumerate()
        .map(|(i, t)| layer.forward(&input(3, i as u64 + 1), TimeQuery::time(t)).unwrap())
        .collect();

    let parallel: Vec<Tensor> = std::thread::scope(|s| {
        let handles: Vec<_> = times
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let layer = Arc::clone(&layer);
                s.spawn(move || layer.forward(&input(3, i as u64 + 1), TimeQuery::time(t)).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(serial, parallel);
}

#[test]
fn test_parameter_update_between_calls_is_seen() {
    init_tracing();
    let mut layer = ResFieldLinear::new(LayerConfig::test_config(), 5).unwrap();
    let x = input(2, 9);
    let before = layer.forward(&x, TimeQuery::frame(&[1, 3])).unwrap();

    // external optimizer step on the per-frame codes
    for v in layer.params_mut().factor_u.iter_mut() {
        *v += 0.5;
    }
    let after = layer.forward(&x, TimeQuery::frame(&[1, 3])).unwrap();
    assert_ne!(before, after, "forward must recompute the weight table from current params");

    // forward itself never mutates
    let again = layer.forward(&x, TimeQuery::frame(&[1, 3])).unwrap();
    assert_eq!(after, again);
}
