use sirenia::{EngineParams, PhysicsEngine};

fn params() -> EngineParams {
    EngineParams {
        gravity: 0.0,
        ..EngineParams::default()
    }
}

fn engine(params: EngineParams, positions: &[f32], masses: &[f32]) -> PhysicsEngine {
    let mut engine = PhysicsEngine::new(params);
    engine.init_nodes(positions, masses, &[]).unwrap();
    engine.init_edges(&[], &[]).unwrap();
    engine
}

fn positions(engine: &PhysicsEngine) -> Vec<f32> {
    let mut out = vec![0.0; 2 * engine.node_count()];
    engine.write_positions(&mut out).unwrap();
    out
}

#[test]
fn massless_nodes_without_edges_stay_put() {
    let start = [0.0, 0.0, 5.0, 5.0];
    let mut engine = engine(params(), &start, &[0.0, 0.0]);
    engine.run(10, 1.0, 0.9);
    assert_eq!(positions(&engine), start.to_vec());
}

#[test]
fn massless_node_is_still_pulled_by_its_edge() {
    let mut engine = engine(params(), &[0.0, 0.0, 100.0, 0.0], &[1.0, 0.0]);
    engine.init_edges(&[0, 1], &[1.0]).unwrap();
    engine.run(1, 1.0, 1.0);
    let out = positions(&engine);
    assert!(out[2] < 100.0);
}

#[test]
fn fixed_nodes_keep_their_position() {
    let start = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    let mut engine = engine(EngineParams::default(), &start, &[1.0, 1.0, 1.0]);
    engine.init_edges(&[0, 1, 1, 2], &[]).unwrap();
    engine.set_fixed(&[1, 0, 0]).unwrap();
    engine.run(20, 1.0, 0.95);

    let out = positions(&engine);
    assert_eq!(&out[..2], &[0.0, 0.0]);
    assert_eq!(engine.speed(0).unwrap().norm(), 0.0);
    assert_ne!(&out[2..4], &[1.0, 0.0]);
}

#[test]
fn coincident_nodes_separate_under_overlap_prevention() {
    let mut engine = PhysicsEngine::new(EngineParams {
        prevent_node_overlap: true,
        ..params()
    });
    engine.init_nodes(&[3.0, 3.0, 3.0, 3.0], &[1.0, 1.0], &[5.0, 5.0]).unwrap();
    engine.init_edges(&[], &[]).unwrap();
    engine.update();

    let out = positions(&engine);
    assert!(out.iter().all(|v| v.is_finite()));
    assert!(out[0] < out[2]);
    assert_eq!(out[1], out[3]);
}
